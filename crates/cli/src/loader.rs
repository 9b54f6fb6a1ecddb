//! CSV input for sentiment and market observations.
//!
//! Sentiment columns: `timestamp,score,label,confidence,is_high_impact`.
//! Market columns: `timestamp,instrument,value` plus optional
//! `change_1h,change_4h,change_24h`. Timestamps are RFC 3339.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use yieldsense_core::{
    derive_changes, validate_observations, MarketObservation, MarketSeries, SentimentObservation,
};

/// Reads and validates sentiment observations.
///
/// # Errors
/// Fails on malformed rows or observations outside their domain.
pub fn read_sentiment<R: Read>(reader: R) -> Result<Vec<SentimentObservation>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut observations = Vec::new();
    for (row, record) in csv.deserialize().enumerate() {
        let obs: SentimentObservation =
            record.with_context(|| format!("sentiment row {}", row + 1))?;
        observations.push(obs);
    }
    validate_observations(&observations)?;
    Ok(observations)
}

/// Reads market observations, deriving any change column the file omits.
///
/// # Errors
/// Fails on malformed rows.
pub fn read_market<R: Read>(reader: R) -> Result<Vec<MarketObservation>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut observations = Vec::new();
    for (row, record) in csv.deserialize().enumerate() {
        let obs: MarketObservation = record.with_context(|| format!("market row {}", row + 1))?;
        observations.push(obs);
    }

    let derived = derive_changes(&observations);
    for (obs, filled) in observations.iter_mut().zip(derived) {
        obs.change_1h = obs.change_1h.or(filled.change_1h);
        obs.change_4h = obs.change_4h.or(filled.change_4h);
        obs.change_24h = obs.change_24h.or(filled.change_24h);
    }
    Ok(observations)
}

/// Loads a sentiment CSV file.
///
/// # Errors
/// Fails if the file cannot be opened or parsed.
pub fn load_sentiment(path: &Path) -> Result<Vec<SentimentObservation>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open sentiment file {}", path.display()))?;
    read_sentiment(file).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Loads a market CSV file into a series.
///
/// With no `instrument` the file must hold exactly one instrument.
///
/// # Errors
/// Fails if the file cannot be parsed or the series cannot be built.
pub fn load_market(path: &Path, instrument: Option<&str>) -> Result<MarketSeries> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open market file {}", path.display()))?;
    let observations =
        read_market(file).with_context(|| format!("Failed to parse {}", path.display()))?;

    let series = match instrument {
        Some(instrument) => MarketSeries::for_instrument(instrument, &observations)?,
        None => MarketSeries::from_observations(&observations)?,
    };
    tracing::info!(
        instrument = series.instrument(),
        points = series.len(),
        start = %series.start(),
        end = %series.end(),
        "Loaded market series"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yieldsense_core::{ChangeHorizon, SentimentLabel};

    const SENTIMENT: &str = "\
timestamp,score,label,confidence,is_high_impact
2025-03-19T18:00:00Z,0.6,bullish,0.9,true
2025-03-19T19:00:00Z,-0.4,risk-off,0.7,false
";

    const MARKET: &str = "\
timestamp,instrument,value
2025-03-19T18:00:00Z,US10Y,4.20
2025-03-19T19:00:00Z,US10Y,4.25
2025-03-19T20:00:00Z,US10Y,4.22
";

    #[test]
    fn sentiment_rows_parse_with_aliases() {
        let obs = read_sentiment(SENTIMENT.as_bytes()).unwrap();
        assert_eq!(obs.len(), 2);
        assert!(obs[0].is_high_impact);
        assert_eq!(obs[1].label, SentimentLabel::Bearish);
    }

    #[test]
    fn sentiment_out_of_range_is_rejected() {
        let data = "timestamp,score,label,confidence,is_high_impact\n\
                    2025-03-19T18:00:00Z,1.4,bullish,0.9,false\n";
        assert!(read_sentiment(data.as_bytes()).is_err());
    }

    #[test]
    fn malformed_timestamp_names_row() {
        let data = "timestamp,score,label,confidence,is_high_impact\n\
                    yesterday,0.1,neutral,0.5,false\n";
        let err = read_sentiment(data.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("sentiment row 1"));
    }

    #[test]
    fn missing_change_columns_are_derived() {
        let obs = read_market(MARKET.as_bytes()).unwrap();
        assert_eq!(obs.len(), 3);
        assert!(obs[0].change(ChangeHorizon::OneHour).is_none());
        let change = obs[1].change(ChangeHorizon::OneHour).unwrap();
        assert!((change - 0.05).abs() < 1e-9);
        assert!(obs[2].change(ChangeHorizon::OneDay).is_none());
    }

    #[test]
    fn provided_changes_are_kept() {
        let data = "timestamp,instrument,value,change_1h,change_4h,change_24h\n\
                    2025-03-19T18:00:00Z,TLT,92.0,0.3,,\n\
                    2025-03-19T19:00:00Z,TLT,92.5,,,\n";
        let obs = read_market(data.as_bytes()).unwrap();
        assert_eq!(obs[0].change_1h, Some(0.3));
        assert!((obs[1].change_1h.unwrap() - 0.5).abs() < 1e-9);
    }
}
