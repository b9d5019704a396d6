use anyhow::Result;
use clap::{Parser, Subcommand};
use indexer::{build_index, BuildOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the inverted index from a harvested-document manifest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from <data-dir>/metadata.json plus its pages/ and files/ buckets
    Build {
        /// Directory holding metadata.json, pages/ and files/
        #[arg(long)]
        data_dir: PathBuf,
        /// Output index directory
        #[arg(long)]
        index_dir: PathBuf,
        /// Index at most this many manifest entries
        #[arg(long)]
        max_entries: Option<usize>,
        /// Commit batch size (default: estimated from available memory)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Stopword file, one term per line
        #[arg(long)]
        stoplist: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { data_dir, index_dir, max_entries, batch_size, stoplist } => {
            let opts = BuildOptions { max_entries, batch_size, stoplist };
            let report = build_index(&data_dir, &index_dir, &opts)?;
            println!("Index building completed ({} documents, {} stubs)", report.docs_indexed, report.stubs);
            println!("Time statistics:");
            println!("- Manifest loading: {:.2}s", report.load_secs);
            println!("- Document processing: {:.2}s", report.process_secs);
            println!("- Index commits: {:.2}s", report.commit_secs);
            println!("- Total time: {:.2}s", report.total_secs);
            println!("- Batch size used: {}", report.batch_size);
            Ok(())
        }
    }
}
