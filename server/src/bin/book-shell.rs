use anyhow::Result;
use booksearch_core::config::DEFAULT_LIMIT;
use booksearch_core::Settings;
use clap::Parser;
use server::{open_searcher, parse_weights, shell};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Interactive keyword search over a built index.
#[derive(Parser)]
struct Args {
    #[arg(long, env = "BOOKSEARCH_RECORDS", default_value_os_t = Settings::default().records_path)]
    records: PathBuf,
    #[arg(long, env = "BOOKSEARCH_INDEX", default_value_os_t = Settings::default().index_dir)]
    index: PathBuf,
    #[arg(long, env = "BOOKSEARCH_LIMIT", default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    #[arg(long = "weight")]
    weights: Vec<String>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Args::parse();
    let settings = Settings {
        records_path: args.records,
        index_dir: args.index,
        default_limit: args.limit,
        field_weights: parse_weights(&args.weights)?,
        ..Settings::default()
    };
    let searcher = open_searcher(&settings)?;
    tracing::info!(docs = searcher.reader().num_docs(), books = searcher.documents().len(), "ready");
    let stdin = std::io::stdin();
    shell::run(&searcher, settings.limit(None), stdin.lock(), std::io::stdout().lock())?;
    Ok(())
}
