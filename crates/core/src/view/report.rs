use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::report::{Action, AnalysisReport, Sentiment, Signal, Trend};
use crate::domain::request::AnalysisRequest;
use crate::page::Feedback;
use crate::view::format::{capitalize, level, short_date, whole_percent};
use crate::view::Tone;

const FALLBACK_TICKER: &str = "AAPL";

pub fn confidence_tone(confidence: f64) -> Tone {
    if confidence > 0.7 {
        Tone::Success
    } else if confidence > 0.4 {
        Tone::Warning
    } else {
        Tone::Danger
    }
}

pub fn sentiment_score_tone(score: f64) -> Tone {
    if score > 0.6 {
        Tone::Success
    } else if score > 0.4 {
        Tone::Warning
    } else {
        Tone::Danger
    }
}

pub fn trend_tone(trend: Trend) -> Tone {
    match trend {
        Trend::Bullish => Tone::Success,
        Trend::Bearish => Tone::Danger,
        Trend::Neutral => Tone::Secondary,
    }
}

pub fn signal_tone(signal: Signal) -> Tone {
    match signal {
        Signal::Buy => Tone::Success,
        Signal::Sell => Tone::Danger,
        Signal::Neutral => Tone::Secondary,
    }
}

pub fn sentiment_tone(sentiment: Sentiment) -> Tone {
    match sentiment {
        Sentiment::Positive => Tone::Success,
        Sentiment::Negative => Tone::Danger,
        Sentiment::Neutral => Tone::Secondary,
    }
}

pub fn action_tone(action: Action) -> Tone {
    match action {
        Action::Buy => Tone::Success,
        Action::Sell => Tone::Danger,
        Action::Hold => Tone::Warning,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorView {
    pub name: String,
    pub value: String,
    pub signal: &'static str,
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceView {
    pub name: String,
    pub label: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    pub action: String,
    pub tone: Tone,
    pub timeframe: String,
    pub target_price: Option<String>,
    pub confidence_pct: i64,
    pub confidence_label: String,
    pub confidence_tone: Tone,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentView {
    pub overall: String,
    pub tone: Tone,
    pub score_pct: i64,
    pub score_label: String,
    pub score_tone: Tone,
    pub sources: Vec<SourceView>,
}

/// Everything the result page shows, already formatted.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView {
    pub heading: String,
    pub subtitle: String,
    pub summary: String,
    pub annotated_chart_url: Option<String>,
    pub trend: String,
    pub trend_tone: Tone,
    pub support_levels: Vec<String>,
    pub resistance_levels: Vec<String>,
    pub indicators: Vec<IndicatorView>,
    pub recommendation: RecommendationView,
    pub sentiment: SentimentView,
    pub feedback: Option<Feedback>,
}

impl ReportView {
    pub fn build(
        request: &AnalysisRequest,
        report: &AnalysisReport,
        generated_on: NaiveDate,
        feedback: Option<Feedback>,
    ) -> Self {
        let heading = match request {
            AnalysisRequest::Ticker { ticker, .. } => {
                let shown = report
                    .ticker
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(if ticker.is_empty() { FALLBACK_TICKER } else { ticker.as_str() });
                format!("{shown} Analysis")
            }
            AnalysisRequest::Chart { .. } => "Chart Analysis".to_string(),
            AnalysisRequest::Question { .. } => "Question Analysis".to_string(),
        };

        let timeframe = request.timeframe().map_or("Custom", |t| t.as_str());
        let subtitle = format!(
            "Generated on {} \u{2022} {timeframe} timeframe",
            short_date(generated_on)
        );

        let ta = &report.technical_analysis;
        let indicators = ta
            .indicators
            .iter()
            .map(|ind| IndicatorView {
                name: ind.name.clone(),
                value: ind.value.clone(),
                signal: ind.signal.as_str(),
                tone: signal_tone(ind.signal),
            })
            .collect();

        let rec = &report.recommendation;
        let confidence_pct = whole_percent(rec.confidence);
        let recommendation = RecommendationView {
            action: capitalize(rec.action.as_str()),
            tone: action_tone(rec.action),
            timeframe: format!("{} timeframe", rec.timeframe),
            target_price: rec.target_price.map(level),
            confidence_pct,
            confidence_label: format!("{confidence_pct}% confidence"),
            confidence_tone: confidence_tone(rec.confidence),
        };

        let sa = &report.sentiment_analysis;
        let score_pct = whole_percent(sa.score);
        let sentiment = SentimentView {
            overall: capitalize(sa.overall.as_str()),
            tone: sentiment_tone(sa.overall),
            score_pct,
            score_label: format!("{score_pct}% positive"),
            score_tone: sentiment_score_tone(sa.score),
            sources: sa
                .sources
                .iter()
                .map(|src| SourceView {
                    name: src.name.clone(),
                    label: capitalize(src.sentiment.as_str()),
                    tone: sentiment_tone(src.sentiment),
                })
                .collect(),
        };

        Self {
            heading,
            subtitle,
            summary: report.summary.clone(),
            annotated_chart_url: report.annotated_chart_url.clone(),
            trend: capitalize(ta.trend.as_str()),
            trend_tone: trend_tone(ta.trend),
            support_levels: ta.support_levels.iter().copied().map(level).collect(),
            resistance_levels: ta.resistance_levels.iter().copied().map(level).collect(),
            indicators,
            recommendation,
            sentiment,
            feedback,
        }
    }
}
