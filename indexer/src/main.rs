use anyhow::{Context, Result};
use booksearch_core::records::load_collection;
use booksearch_core::{AnalyzerConfig, Book, IndexReader, IndexWriter, SegmenterKind, Settings};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the book search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a record collection (a JSON array file or a directory of them)
    Build {
        /// Record collection path
        #[arg(long, env = "BOOKSEARCH_RECORDS", default_value_os_t = Settings::default().records_path)]
        input: PathBuf,
        /// Index directory; appended to if it already exists
        #[arg(long, env = "BOOKSEARCH_INDEX", default_value_os_t = Settings::default().index_dir)]
        index: PathBuf,
        /// Discard any existing index first
        #[arg(long, default_value_t = false)]
        fresh: bool,
        /// Commit after this many indexed books
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        commit_every: u64,
        /// Segmentation of Chinese text: bigram or unigram
        #[arg(long, default_value = "bigram")]
        segmenter: SegmenterKind,
        /// Disable English stemming
        #[arg(long, default_value_t = false)]
        no_stem: bool,
    },
    /// Print index metadata as JSON
    Stats {
        #[arg(long, env = "BOOKSEARCH_INDEX", default_value_os_t = Settings::default().index_dir)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, index, fresh, commit_every, segmenter, no_stem } => {
            let config = AnalyzerConfig { segmenter, stem: !no_stem };
            build_index(&input, &index, fresh, commit_every, config)
        }
        Commands::Stats { index } => {
            let reader = IndexReader::open(&index).with_context(|| format!("opening index {}", index.display()))?;
            println!("{}", serde_json::to_string_pretty(reader.meta())?);
            Ok(())
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BuildSummary {
    indexed: usize,
    skipped: usize,
    num_docs: u32,
}

fn build_index(input: &Path, output: &Path, fresh: bool, commit_every: u64, config: AnalyzerConfig) -> Result<()> {
    let start = Instant::now();
    let books = load_collection(input).with_context(|| format!("loading records from {}", input.display()))?;
    if books.is_empty() {
        tracing::warn!(input = %input.display(), "no books loaded, nothing to index");
        return Ok(());
    }
    tracing::info!(books = books.len(), "loaded record collection");

    let mut writer = if fresh { IndexWriter::create(output, config) } else { IndexWriter::open(output, config) }
        .with_context(|| format!("opening index {} for writing", output.display()))?;

    let pb = ProgressBar::new(books.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{prefix:<10} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")?
            .progress_chars("━━╸"),
    );
    pb.set_prefix("Indexing");

    let summary = index_books(&mut writer, &books, commit_every, |completed| {
        pb.set_position(completed as u64);
    })?;
    pb.finish_with_message(format!("{} indexed, {} skipped", summary.indexed, summary.skipped));

    tracing::info!(
        indexed = summary.indexed,
        skipped = summary.skipped,
        num_docs = summary.num_docs,
        elapsed_s = start.elapsed().as_secs_f64(),
        output = %output.display(),
        "index build complete"
    );
    Ok(())
}

/// Feed books in order, committing every `commit_every` indexed books.
/// `progress` receives the monotonic count of processed books.
fn index_books(
    writer: &mut IndexWriter,
    books: &[Book],
    commit_every: u64,
    mut progress: impl FnMut(usize),
) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();
    for (i, book) in books.iter().enumerate() {
        match writer.add_book(book) {
            Some(_) => summary.indexed += 1,
            None => summary.skipped += 1,
        }
        if u64::from(writer.pending_docs()) >= commit_every {
            writer.commit().context("committing index batch")?;
            tracing::info!(processed = i + 1, total = books.len(), indexed = summary.indexed, "progress");
        }
        progress(i + 1);
    }
    writer.commit().context("committing final index batch")?;
    summary.num_docs = writer.meta().num_docs;
    Ok(summary)
}
