use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use transfer_orchestrator::application::batch::BatchDispatcher;
use transfer_orchestrator::bootstrap::build_service;
use transfer_orchestrator::config::{AppConfig, Settings};
use transfer_orchestrator::interfaces::csv::outcome_writer::OutcomeWriter;
use transfer_orchestrator::interfaces::csv::transfer_reader::TransferReader;
use transfer_orchestrator::interfaces::http::{self, AppState};
use transfer_orchestrator::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the transfer API over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "TRANSFER_LISTEN", default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        /// Seconds between idempotency cleanup sweeps
        #[arg(long, env = "TRANSFER_SWEEP_INTERVAL_SECS", default_value_t = 3_600)]
        sweep_interval_secs: u64,
    },
    /// Submit a CSV file of transfers as one batch and print the outcomes as CSV
    Submit {
        /// Input CSV file with `from, to, amount` columns
        input: PathBuf,

        /// Idempotency key of the batch
        #[arg(long)]
        batch_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from(cli.settings);
    init_logging(&config);

    let service = build_service(&config).into_diagnostic()?;

    match cli.command {
        Command::Serve {
            listen,
            sweep_interval_secs,
        } => {
            let sweeper = service
                .sweeper
                .spawn(Duration::from_secs(sweep_interval_secs.max(1)));

            let listener = TcpListener::bind(listen).await.into_diagnostic()?;
            info!(%listen, "transfer API listening");
            let served = http::serve(listener, AppState::new(service.orchestrator)).await;

            sweeper.abort();
            served.into_diagnostic()?;
        }
        Command::Submit { input, batch_key } => {
            let file = File::open(input).into_diagnostic()?;
            let requests = TransferReader::new(file)
                .requests()
                .collect::<Result<Vec<_>, _>>()
                .into_diagnostic()?;

            let results = BatchDispatcher::new(service.orchestrator)
                .execute_batch(requests, &batch_key)
                .await
                .into_diagnostic()?;

            let stdout = io::stdout();
            let mut writer = OutcomeWriter::new(stdout.lock());
            writer.write_results(&results).into_diagnostic()?;
        }
    }

    Ok(())
}
