use anyhow::Result;
use clap::Parser;
use query::{RankingParams, SearchEngine, SearchRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// One-shot query against a committed index.
#[derive(Parser, Debug)]
#[command(name = "search-query", about = "Run a search against a built index")]
struct Cli {
    /// Directory holding index.bin and meta.json
    #[arg(long, default_value = "index")]
    index_dir: PathBuf,

    /// Query log consulted for personalization and suggestions
    #[arg(long, default_value = "query_logs.json")]
    log_path: PathBuf,

    /// The query string
    query: String,

    /// 1-based result page
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Require all terms adjacent, in order
    #[arg(long)]
    phrase: bool,

    /// Exclude page results, keep file results only
    #[arg(long)]
    files_only: bool,

    /// Personalize results for this user
    #[arg(long)]
    user: Option<String>,

    /// BM25 length normalization
    #[arg(long)]
    b: Option<f64>,

    /// BM25 term-frequency saturation
    #[arg(long)]
    k1: Option<f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let engine = SearchEngine::open(&cli.index_dir, &cli.log_path);

    let mut ranking = RankingParams::default();
    if let Some(b) = cli.b {
        ranking.b = b;
    }
    if let Some(k1) = cli.k1 {
        ranking.k1 = k1;
    }

    let request = SearchRequest {
        query: cli.query,
        page: cli.page,
        files_only: cli.files_only,
        ranking,
        is_phrase: cli.phrase,
        user: cli.user,
    };
    let response = engine.search(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
