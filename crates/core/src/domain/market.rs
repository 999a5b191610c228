use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::report::Action;
use crate::domain::request::AnalysisKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketItem {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    /// Percent change over 24h, signed.
    pub change: f64,
    /// Pre-formatted, e.g. `52.3M`.
    pub volume: String,
}

/// One row of the analysis history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    pub title: String,
    pub date: NaiveDate,
    pub recommendation: Action,
    pub confidence: f64,
}

pub fn seed_market_items() -> Vec<MarketItem> {
    let item = |symbol: &str, name: &str, price: f64, change: f64, volume: &str| MarketItem {
        symbol: symbol.to_string(),
        name: name.to_string(),
        price,
        change,
        volume: volume.to_string(),
    };

    vec![
        item("AAPL", "Apple Inc.", 178.72, 1.45, "52.3M"),
        item("MSFT", "Microsoft Corp.", 332.42, 0.87, "23.1M"),
        item("GOOGL", "Alphabet Inc.", 137.14, -0.32, "18.7M"),
        item("AMZN", "Amazon.com Inc.", 131.69, 2.13, "35.2M"),
        item("TSLA", "Tesla Inc.", 242.68, -1.78, "41.9M"),
        item("BTC-USD", "Bitcoin USD", 28456.32, 3.21, "24.5B"),
        item("ETH-USD", "Ethereum USD", 1642.18, 2.54, "12.1B"),
    ]
}

pub fn seed_recent_analyses() -> Vec<AnalysisRecord> {
    let record = |id: &str,
                  kind: AnalysisKind,
                  title: &str,
                  (y, m, d): (i32, u32, u32),
                  recommendation: Action,
                  confidence: f64| AnalysisRecord {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        recommendation,
        confidence,
    };

    vec![
        record("1", AnalysisKind::Ticker, "AAPL Analysis", (2023, 10, 15), Action::Buy, 0.82),
        record(
            "2",
            AnalysisKind::Chart,
            "BTC-USD Chart Analysis",
            (2023, 10, 14),
            Action::Hold,
            0.65,
        ),
        record(
            "3",
            AnalysisKind::Question,
            "Is Tesla stock a buy right now?",
            (2023, 10, 12),
            Action::Sell,
            0.71,
        ),
        record("4", AnalysisKind::Ticker, "MSFT Analysis", (2023, 10, 10), Action::Buy, 0.78),
        record(
            "5",
            AnalysisKind::Chart,
            "ETH-USD Chart Analysis",
            (2023, 10, 8),
            Action::Buy,
            0.69,
        ),
    ]
}
