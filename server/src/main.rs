use anyhow::Result;
use axum::Router;
use booksearch_core::config::DEFAULT_LIMIT;
use booksearch_core::Settings;
use clap::Parser;
use server::{build_app, parse_weights};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Record collection path
    #[arg(long, env = "BOOKSEARCH_RECORDS", default_value_os_t = Settings::default().records_path)]
    records: PathBuf,
    /// Index directory path
    #[arg(long, env = "BOOKSEARCH_INDEX", default_value_os_t = Settings::default().index_dir)]
    index: PathBuf,
    /// Results per query when the request has no `k`
    #[arg(long, env = "BOOKSEARCH_LIMIT", default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Field weight, e.g. `--weight title=2`; repeatable
    #[arg(long = "weight")]
    weights: Vec<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let settings = Settings {
        records_path: args.records,
        index_dir: args.index,
        default_limit: args.limit,
        field_weights: parse_weights(&args.weights)?,
        ..Settings::default()
    };
    let app: Router = build_app(settings)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
