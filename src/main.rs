use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hypothesis_lab::config::{Config, EvidenceQueryStrategy};
use hypothesis_lab::report::{save_run, RunMetrics};
use hypothesis_lab::utils::init_logger;
use hypothesis_lab::{create_router, AppState, Supervisor};

#[derive(Parser)]
#[command(name = "hypothesis-lab")]
#[command(about = "Iterative hypothesis refinement with LLM agents and external evidence", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one refinement loop and print its metrics
    Run {
        /// Research topic
        #[arg(short, long)]
        topic: String,

        /// Hard cap on iterations (defaults to RUN_MAX_ITERATIONS)
        #[arg(short = 'n', long)]
        max_iterations: Option<u32>,

        /// Minimum aggregate improvement; enables the plateau stop
        #[arg(long)]
        threshold: Option<f64>,

        /// Evidence query strategy: topic-only or hypothesis-derived
        #[arg(short, long)]
        strategy: Option<EvidenceQueryStrategy>,

        /// Write the full run result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full run result as JSON instead of the table
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    let supervisor = Supervisor::from_config(&config)?;

    match cli.command {
        Commands::Run {
            topic,
            max_iterations,
            threshold,
            strategy,
            output,
            json,
        } => {
            let mut run_config = config.run.clone();
            if let Some(n) = max_iterations {
                run_config = run_config.with_max_iterations(n);
            }
            if threshold.is_some() {
                run_config = run_config.with_threshold(threshold);
            }
            if let Some(strategy) = strategy {
                run_config = run_config.with_strategy(strategy);
            }

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received; stopping after the current iteration");
                    ctrl_c.cancel();
                }
            });

            let result = supervisor
                .run_with_cancellation(&topic, &run_config, cancel)
                .await?;

            if let Some(path) = output {
                save_run(&path, &result)?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", RunMetrics::from_state(&result.state).render_table());
                println!("stop reason: {}", result.stop_reason);
                if let Some(hypothesis) = result.final_hypothesis() {
                    println!("final hypothesis: {}", hypothesis.text());
                }
                if let Some(summary) = &result.summary {
                    println!("\n{}", summary);
                }
                if let Some(failure) = &result.failure {
                    println!("failure ({}): {}", failure.kind, failure.message);
                }
            }
        }

        Commands::Serve => {
            let state = AppState {
                config: config.clone(),
                supervisor: Arc::new(supervisor),
            };
            let app = create_router(state);

            let host: std::net::IpAddr = config
                .server
                .host
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid HOST {}: {}", config.server.host, e))?;
            let addr = SocketAddr::from((host, config.server.port));
            info!("Server listening on {}", addr);

            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .await
                .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
        }
    }

    Ok(())
}
