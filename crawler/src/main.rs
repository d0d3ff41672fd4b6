mod extract;

use anyhow::{anyhow, Context, Result};
use booksearch_core::config::MAX_PAGES;
use booksearch_core::records::{load_collection, save_collection};
use booksearch_core::{Book, Settings};
use clap::{Parser, Subcommand};
use extract::Selectors;
use reqwest::{Client, Url};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing_subscriber::{fmt, EnvFilter};

/// Listing id for each top-level category of the store.
pub const CATEGORIES: &[(&str, u32)] = &[
    ("人文社科", 34),
    ("文学艺术", 33),
    ("少儿童书", 35),
    ("教育考试", 36),
    ("经济金融", 37),
    ("生活休闲", 38),
    ("科学技术", 39),
    ("计算机类", 40),
    ("外文原版", 586),
];

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Scrape book item pages into a record collection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the pages listed in a seeds file
    Crawl {
        /// File with item page URLs, one per line (`#` starts a comment)
        #[arg(long)]
        seeds: PathBuf,
        /// Record collection to write
        #[arg(long, env = "BOOKSEARCH_RECORDS", default_value_os_t = Settings::default().records_path)]
        output: PathBuf,
        /// Maximum number of pages to fetch
        #[arg(long, env = "BOOKSEARCH_MAX_PAGES", default_value_t = MAX_PAGES)]
        max_pages: usize,
        /// Merge into an existing collection instead of replacing it
        #[arg(long)]
        append: bool,
        /// Concurrent requests
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Request timeout seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
        #[arg(long, default_value = "booksearch-crawler/0.1")]
        user_agent: String,
    },
    /// Print the category name to listing id table
    Categories,
}

fn load_seeds(path: &Path, max_pages: usize) -> Result<Vec<Url>> {
    let file = File::open(path).with_context(|| format!("opening seeds {}", path.display()))?;
    let mut seeds = Vec::new();
    let mut seen = HashSet::new();
    for line in BufReader::new(file).lines() {
        let s = line?.trim().to_string();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        match Url::parse(&s).or_else(|_| Url::parse(&format!("https://{s}"))) {
            Ok(u) if seen.insert(u.to_string()) => seeds.push(u),
            Ok(_) => {}
            Err(e) => tracing::warn!(seed = %s, error = %e, "skipping invalid seed"),
        }
        if seeds.len() == max_pages {
            break;
        }
    }
    Ok(seeds)
}

async fn fetch(client: &Client, url: Url) -> Result<String> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.text().await?)
}

type Fetched = (usize, Url, Result<Book>);

/// Stores one finished fetch. A failed fetch or a task that died is logged
/// and leaves its slot empty.
fn record_page(pages: &mut [Option<Book>], joined: Result<Fetched, JoinError>) {
    let (i, url, result) = match joined {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(error = %e, "crawl task failed, skipping page");
            return;
        }
    };
    match result {
        Ok(book) => {
            if book.isbn.is_none() {
                tracing::warn!(%url, "page has no isbn; it will not be indexed");
            }
            tracing::info!(%url, title = book.title.as_deref().unwrap_or("-"), "scraped");
            pages[i] = Some(book);
        }
        Err(e) => tracing::warn!(%url, error = %e, "fetch failed, skipping"),
    }
}

/// Fetches and parses every seed; failed pages are logged and left out.
/// Output keeps seed order.
async fn crawl(client: Client, seeds: Vec<Url>, concurrency: usize) -> Result<Vec<Book>> {
    let selectors = Arc::new(Selectors::new()?);
    let mut pages: Vec<Option<Book>> = vec![None; seeds.len()];
    let mut queue = seeds.into_iter().enumerate();
    let mut inflight = JoinSet::new();

    loop {
        while inflight.len() < concurrency.max(1) {
            let Some((i, url)) = queue.next() else { break };
            let client = client.clone();
            let selectors = Arc::clone(&selectors);
            inflight.spawn(async move {
                let result = fetch(&client, url.clone()).await.map(|html| extract::parse_book(&html, &selectors));
                (i, url, result)
            });
        }
        let Some(joined) = inflight.join_next().await else { break };
        record_page(&mut pages, joined);
    }
    Ok(pages.into_iter().flatten().collect())
}

/// Appends `fresh` to `existing`, skipping isbns the collection already has.
fn merge(mut existing: Vec<Book>, fresh: Vec<Book>) -> Vec<Book> {
    let mut known: HashSet<String> = existing.iter().filter_map(|b| b.isbn.clone()).collect();
    for book in fresh {
        if let Some(isbn) = &book.isbn {
            if !known.insert(isbn.clone()) {
                tracing::debug!(%isbn, "already collected");
                continue;
            }
        }
        existing.push(book);
    }
    existing
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    match Cli::parse().command {
        Command::Categories => {
            for (name, id) in CATEGORIES {
                println!("{name}\t{id}");
            }
        }
        Command::Crawl { seeds, output, max_pages, append, concurrency, timeout_secs, user_agent } => {
            let seeds = load_seeds(&seeds, max_pages)?;
            if seeds.is_empty() {
                return Err(anyhow!("no valid seeds"));
            }
            tracing::info!(seeds = seeds.len(), concurrency, output = %output.display(), "crawling");

            let client = Client::builder()
                .user_agent(user_agent)
                .redirect(reqwest::redirect::Policy::limited(5))
                .timeout(Duration::from_secs(timeout_secs))
                .build()?;
            let books = crawl(client, seeds, concurrency).await?;
            let scraped = books.len();

            let books = if append && output.exists() { merge(load_collection(&output)?, books) } else { books };
            save_collection(&output, &books)?;
            tracing::info!(scraped, total = books.len(), output = %output.display(), "done");
        }
    }
    Ok(())
}
