//! Arguments and input loading shared by every analysis command.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use yieldsense_core::{AnalysisConfig, ConfigLoader, MarketSeries, SentimentObservation};

use crate::loader;

/// Input files and output options.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Sentiment observations CSV
    #[arg(long)]
    pub sentiment: PathBuf,

    /// Market observations CSV
    #[arg(long)]
    pub market: PathBuf,

    /// Instrument to analyse when the market file holds several
    #[arg(long)]
    pub instrument: Option<String>,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: PathBuf,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Output format for command reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parses an output format from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!(
                "Unknown format: '{}'. Valid formats: text, json",
                s
            )),
        }
    }
}

/// Everything an analysis command needs.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub config: AnalysisConfig,
    pub sentiment: Vec<SentimentObservation>,
    pub market: MarketSeries,
    pub format: OutputFormat,
}

impl Inputs {
    /// Parses the format first so a typo fails before any file is read.
    pub fn load(args: &InputArgs) -> Result<Self> {
        let format = OutputFormat::parse(&args.format)?;
        let config = ConfigLoader::load_from(&args.config)?;
        let sentiment = loader::load_sentiment(&args.sentiment)?;
        let market = loader::load_market(&args.market, args.instrument.as_deref())?;

        tracing::info!(
            sentiment = sentiment.len(),
            market = market.len(),
            "Inputs loaded"
        );

        Ok(Self {
            config,
            sentiment,
            market,
            format,
        })
    }
}

/// Prints a report as pretty JSON on stdout.
pub fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
