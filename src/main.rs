use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saved_media::batch::BatchRunner;
use saved_media::config::AppConfig;
use saved_media::fetch::{Fetch, HttpFetcher};
use saved_media::links::{self, LinkReport};
use saved_media::source::{JsonFileSource, PostSource};

#[derive(Parser)]
#[command(name = "saved-media")]
#[command(about = "Download media linked from saved posts")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every post in a saved-posts export
    Batch {
        /// JSON array of saved posts
        #[arg(long)]
        posts: PathBuf,

        /// Stop after this many downloads (overrides config)
        #[arg(long)]
        limit: Option<usize>,

        /// Keep downloaded posts in the export
        #[arg(long)]
        no_unsave: bool,

        /// Show the name and strategy per post without downloading
        #[arg(long)]
        dry_run: bool,
    },

    /// Download files from a link list
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },
}

#[derive(Subcommand)]
enum LinksAction {
    /// One URL per line, saved as <base>_<nnnn>.mp4
    Simple {
        file: PathBuf,

        base: String,

        /// First file number
        #[arg(long, default_value = "1")]
        start: u32,

        #[arg(long, default_value = ".")]
        target_dir: PathBuf,
    },

    /// CSV with person,description,ext,url columns
    Csv {
        file: PathBuf,

        #[arg(long, default_value = ".")]
        target_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        AppConfig::default()
    };

    // Initialize tracing
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting saved-media v{}", env!("CARGO_PKG_VERSION"));
    if !cli.config.exists() {
        tracing::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    let fetch: Arc<dyn Fetch> = Arc::new(
        HttpFetcher::new(config.http.clone().into()).context("Failed to create HTTP client")?,
    );

    match cli.command {
        Commands::Batch {
            posts,
            limit,
            no_unsave,
            dry_run,
        } => {
            let mut source = JsonFileSource::new(posts);
            let limit = limit.or(config.limit());
            let runner = BatchRunner::new(&config, fetch)
                .with_unsave(config.unsave.enabled && !no_unsave, config.unsave.pause());

            if dry_run {
                let posts = source.saved_posts().await?;
                for planned in runner.plan(&posts) {
                    let strategy = planned
                        .strategy
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unsupported".to_string());
                    println!("{:<12} {}  <- {}", strategy, planned.base_name, planned.post.url);
                }
                return Ok(());
            }

            let report = runner.run(&mut source, &config.save_dir, limit).await?;

            println!("\n=== Batch Results ===");
            println!("Processed: {}", report.processed);
            println!("Saved:     {}", report.saved_count());
            println!("Unsaved:   {}", report.unsaved);
            let failures = report.summary_lines();
            if !failures.is_empty() {
                println!("\nNot saved:");
                for line in &failures {
                    println!("  - {}", line);
                }
            }
        }
        Commands::Links { action } => {
            let report = match action {
                LinksAction::Simple {
                    file,
                    base,
                    start,
                    target_dir,
                } => links::download_list(fetch.as_ref(), &file, &base, start, &target_dir).await?,
                LinksAction::Csv { file, target_dir } => {
                    links::download_csv(fetch.as_ref(), &file, &config.links, &target_dir).await?
                }
            };
            print_link_report(&report);
        }
    }

    Ok(())
}

fn print_link_report(report: &LinkReport) {
    println!("\n=== Link Results ===");
    println!("Saved:  {}", report.saved.len());
    println!("Failed: {}", report.failed.len());
    for (url, message) in &report.failed {
        println!("  - {}: {}", url, message);
    }
}
