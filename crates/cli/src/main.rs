use clap::{Parser, Subcommand};

mod commands;
mod loader;

use commands::{BacktestArgs, CorrelateArgs, EventStudyArgs, ReportArgs};

#[derive(Parser)]
#[command(name = "yieldsense")]
#[command(about = "Sentiment versus Treasury market analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correlate sentiment with market changes across lags
    Correlate(CorrelateArgs),
    /// Measure market response around sentiment events
    EventStudy(EventStudyArgs),
    /// Generate sentiment signals and replay them against prices
    Backtest(BacktestArgs),
    /// Run correlation, event study and backtest together
    Report(ReportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Correlate(args) => {
            commands::run_correlate(args).await?;
        }
        Commands::EventStudy(args) => {
            commands::run_event_study(args).await?;
        }
        Commands::Backtest(args) => {
            commands::run_backtest(args).await?;
        }
        Commands::Report(args) => {
            commands::run_report(args).await?;
        }
    }

    Ok(())
}
