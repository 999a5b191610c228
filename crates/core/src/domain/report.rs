use serde::{Deserialize, Serialize};

use crate::domain::request::AnalysisRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        }
    }
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Neutral => "neutral",
        }
    }
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    pub value: String,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub trend: Trend,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSentiment {
    pub name: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub overall: Sentiment,
    /// In `[0, 1]`.
    pub score: f64,
    pub sources: Vec<SourceSentiment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: Action,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub timeframe: String,
    pub target_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: Option<String>,
    pub summary: String,
    pub technical_analysis: TechnicalAnalysis,
    pub sentiment_analysis: SentimentAnalysis,
    pub recommendation: Recommendation,
    pub annotated_chart_url: Option<String>,
}

const SAMPLE_TICKER: &str = "AAPL";

const SAMPLE_SUMMARY: &str = "Apple (AAPL) shows a bullish trend in the medium term, with strong support at $170 and resistance at $190. Recent earnings exceeded expectations, driving positive sentiment. Technical indicators suggest a potential breakout above the current resistance level. The RSI is at 62, indicating room for further upside before reaching overbought conditions. The 50-day moving average has crossed above the 200-day moving average, forming a golden cross pattern that typically signals a bullish trend continuation.";

const SAMPLE_CHART_URL: &str = "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?ixlib=rb-1.2.1&auto=format&fit=crop&w=1200&h=800&q=80";

/// The canned report served by the simulated analysis backend. Only the
/// ticker follows the request.
pub fn sample_report(request: &AnalysisRequest) -> AnalysisReport {
    let indicator = |name: &str, value: &str, signal| Indicator {
        name: name.to_string(),
        value: value.to_string(),
        signal,
    };
    let source = |name: &str, sentiment| SourceSentiment {
        name: name.to_string(),
        sentiment,
    };

    AnalysisReport {
        ticker: Some(request.ticker().unwrap_or(SAMPLE_TICKER).to_string()),
        summary: SAMPLE_SUMMARY.to_string(),
        technical_analysis: TechnicalAnalysis {
            trend: Trend::Bullish,
            support_levels: vec![170.0, 165.0, 158.0],
            resistance_levels: vec![190.0, 195.0, 205.0],
            indicators: vec![
                indicator("RSI", "62", Signal::Neutral),
                indicator("MACD", "Positive", Signal::Buy),
                indicator("Moving Averages", "Golden Cross", Signal::Buy),
                indicator("Bollinger Bands", "Upper Band Test", Signal::Neutral),
            ],
        },
        sentiment_analysis: SentimentAnalysis {
            overall: Sentiment::Positive,
            score: 0.78,
            sources: vec![
                source("News Articles", Sentiment::Positive),
                source("Social Media", Sentiment::Positive),
                source("Analyst Ratings", Sentiment::Neutral),
            ],
        },
        recommendation: Recommendation {
            action: Action::Buy,
            confidence: 0.82,
            timeframe: "3-6 months".to_string(),
            target_price: Some(205.0),
        },
        annotated_chart_url: Some(SAMPLE_CHART_URL.to_string()),
    }
}
