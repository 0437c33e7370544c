use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tourney_storage::{MemoryTournamentStore, PgTournamentStore, TournamentStore};
use tourney_sync::{connect_store, ScrapeConfig, ScrapePipeline};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,tourney=debug,sqlx=warn";

#[derive(Debug, Parser)]
#[command(name = "tourney-cli")]
#[command(about = "Tournament page extractor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape one tournament page and print the record as JSON.
    Scrape {
        url: String,
        /// Upsert the record into the configured store.
        #[arg(long)]
        save: bool,
    },
    Serve,
    Migrate,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);
    info!(?command, "starting tourney-cli");

    match command {
        Commands::Scrape { url, save } => {
            let config = ScrapeConfig::from_env();
            let store: Arc<dyn TournamentStore> = if save {
                connect_store(&config).await?
            } else {
                Arc::new(MemoryTournamentStore::new())
            };
            let pipeline = ScrapePipeline::new(&config, store)?;
            let record = pipeline.scrape(&url).await.context("scrape failed")?;
            if save {
                let stored = pipeline.save(&record).await.context("storing record")?;
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Commands::Serve => tourney_web::serve_from_env().await?,
        Commands::Migrate => {
            let Some(url) = ScrapeConfig::from_env().database_url else {
                bail!("DATABASE_URL must be set to run migrations");
            };
            let store = PgTournamentStore::connect(&url).await?;
            store.migrate().await?;
            info!("migrations applied");
            println!("migrations applied");
        }
    }

    Ok(())
}
