//! CLI for running a job search without the HTTP server
//!
//! Prints JSON to stdout so output can be piped into jq. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server_core::config::Config;
use server_core::kernel::{run_job_search, JobSearchRequest, LooseValue, ServerDeps};
use server_core::server::routes::JobSearchResponse;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "scrape_cli")]
#[command(about = "Search Korean job boards from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured boards in priority order
    Boards,

    /// Run one search and print the result
    Search {
        query: String,

        /// Keep listings in this region (repeatable)
        #[arg(long = "region")]
        regions: Vec<String>,

        /// Highest required experience in years
        #[arg(long)]
        max_experience: Option<u32>,

        /// Highest required education (e.g. bachelor, 대졸)
        #[arg(long)]
        max_education: Option<String>,

        #[arg(long)]
        max_pages: Option<u32>,

        /// Only query this board (repeatable)
        #[arg(long = "source")]
        sources: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,aggregator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let deps = ServerDeps::from_config(&config).context("Failed to build dependencies")?;

    match cli.command {
        Commands::Boards => {
            let boards = deps.registry.summaries();
            println!("{}", serde_json::to_string_pretty(&boards)?);
        }
        Commands::Search {
            query,
            regions,
            max_experience,
            max_education,
            max_pages,
            sources,
        } => {
            let request = JobSearchRequest {
                query,
                regions,
                max_experience: max_experience.map(LooseValue::Number),
                max_education: max_education.map(LooseValue::Text),
                max_pages,
                sources: (!sources.is_empty()).then_some(sources),
            };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling remaining sources");
                    on_interrupt.cancel();
                }
            });

            let response = match run_job_search(&deps, &request, &cancel).await {
                Ok(result) => JobSearchResponse::from(result),
                Err(e) => JobSearchResponse::error(e.to_string()),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);

            if let Some(error) = response.error {
                anyhow::bail!(error);
            }
        }
    }

    Ok(())
}
