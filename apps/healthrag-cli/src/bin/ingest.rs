//! Load crawled article files and rebuild the vector collection.
use clap::Parser;
use std::path::PathBuf;

use healthrag_cli::{bootstrap, telemetry};
use healthrag_core::articles::{list_article_files, load_all};
use healthrag_core::config::expand_path;

#[derive(Parser)]
#[command(name = "healthrag-ingest")]
#[command(about = "Chunk, embed and index article files")]
struct Cli {
    /// Directory holding the article files (defaults to ingest.data_dir)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Article files relative to the data directory (defaults to ingest.files)
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init("info");
    let cli = Cli::parse();
    let settings = bootstrap::load_settings()?;

    let data_dir = cli.data_dir.unwrap_or_else(|| expand_path(&settings.ingest.data_dir));
    let files = if cli.files.is_empty() { settings.ingest.files.clone() } else { cli.files };
    let paths = list_article_files(&data_dir, &files);
    let articles = load_all(&paths)?;
    if articles.is_empty() {
        anyhow::bail!("no articles found under {}", data_dir.display());
    }

    let ingestor = bootstrap::build_ingestor(&settings).await?.with_progress(!cli.no_progress);
    let report = ingestor.ingest(&articles).await?;
    println!(
        "Indexed {} chunks from {} articles into '{}' ({} batches skipped, {} documents stored)",
        report.indexed, report.articles, settings.index.collection, report.failed_batches, report.stored
    );
    Ok(())
}
