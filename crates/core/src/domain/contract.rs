use crate::domain::report::{
    Action, AnalysisReport, Indicator, Recommendation, Sentiment, SentimentAnalysis, Signal,
    SourceSentiment, TechnicalAnalysis, Trend,
};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Report shape emitted by an analysis model, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAnalysisReport {
    #[serde(default)]
    pub ticker: Option<String>,
    pub summary: String,
    pub technical_analysis: LlmTechnicalAnalysis,
    pub sentiment_analysis: LlmSentimentAnalysis,
    pub recommendation: LlmRecommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmTechnicalAnalysis {
    pub trend: Trend,
    #[serde(default)]
    pub support_levels: Vec<f64>,
    #[serde(default)]
    pub resistance_levels: Vec<f64>,
    #[serde(default)]
    pub indicators: Vec<LlmIndicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmIndicator {
    pub name: String,
    pub value: String,
    pub signal: Signal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSentimentAnalysis {
    pub overall: Sentiment,
    pub score: f64,
    #[serde(default)]
    pub sources: Vec<LlmSourceSentiment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSourceSentiment {
    pub name: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRecommendation {
    pub action: Action,
    pub confidence: f64,
    pub timeframe: String,
    #[serde(default)]
    pub target_price: Option<f64>,
}

impl LlmAnalysisReport {
    /// Checks ranges and trims text. `expected_ticker` is the ticker of the
    /// originating request, if any; the model's ticker must agree with it.
    pub fn validate_and_into_report(
        self,
        expected_ticker: Option<&str>,
    ) -> anyhow::Result<AnalysisReport> {
        let summary = self.summary.trim().to_string();
        ensure!(!summary.is_empty(), "summary must be non-empty");

        let ticker = self
            .ticker
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let (Some(expected), Some(got)) = (expected_ticker, ticker.as_deref()) {
            ensure!(
                expected.eq_ignore_ascii_case(got),
                "ticker mismatch: expected {expected}, got {got}"
            );
        }
        let ticker = ticker.or_else(|| expected_ticker.map(str::to_string));

        let technical_analysis = self.technical_analysis.validate()?;
        let sentiment_analysis = self.sentiment_analysis.validate()?;
        let recommendation = self.recommendation.validate()?;

        Ok(AnalysisReport {
            ticker,
            summary,
            technical_analysis,
            sentiment_analysis,
            recommendation,
            annotated_chart_url: None,
        })
    }
}

impl LlmTechnicalAnalysis {
    fn validate(self) -> anyhow::Result<TechnicalAnalysis> {
        for level in self.support_levels.iter().chain(&self.resistance_levels) {
            ensure!(
                level.is_finite() && *level > 0.0,
                "price levels must be positive (got {level})"
            );
        }

        let mut indicators = Vec::with_capacity(self.indicators.len());
        for ind in self.indicators {
            let name = ind.name.trim().to_string();
            ensure!(!name.is_empty(), "indicator name must be non-empty");
            indicators.push(Indicator {
                name,
                value: ind.value.trim().to_string(),
                signal: ind.signal,
            });
        }

        Ok(TechnicalAnalysis {
            trend: self.trend,
            support_levels: self.support_levels,
            resistance_levels: self.resistance_levels,
            indicators,
        })
    }
}

impl LlmSentimentAnalysis {
    fn validate(self) -> anyhow::Result<SentimentAnalysis> {
        ensure!(
            (0.0..=1.0).contains(&self.score),
            "sentiment score must be between 0 and 1 (got {})",
            self.score
        );

        let mut sources = Vec::with_capacity(self.sources.len());
        for src in self.sources {
            let name = src.name.trim().to_string();
            ensure!(!name.is_empty(), "sentiment source name must be non-empty");
            sources.push(SourceSentiment {
                name,
                sentiment: src.sentiment,
            });
        }

        Ok(SentimentAnalysis {
            overall: self.overall,
            score: self.score,
            sources,
        })
    }
}

impl LlmRecommendation {
    fn validate(self) -> anyhow::Result<Recommendation> {
        ensure!(
            (0.0..=1.0).contains(&self.confidence),
            "confidence must be between 0 and 1 (got {})",
            self.confidence
        );

        let timeframe = self.timeframe.trim().to_string();
        ensure!(!timeframe.is_empty(), "recommendation timeframe must be non-empty");

        if let Some(target) = self.target_price {
            ensure!(
                target.is_finite() && target > 0.0,
                "target price must be positive (got {target})"
            );
        }

        Ok(Recommendation {
            action: self.action,
            confidence: self.confidence,
            timeframe,
            target_price: self.target_price,
        })
    }
}
