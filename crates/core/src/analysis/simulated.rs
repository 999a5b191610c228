use crate::analysis::{AnalysisError, AnalysisService, Provider};
use crate::domain::report::{sample_report, AnalysisReport};
use crate::domain::request::AnalysisRequest;
use std::time::Duration;

/// Answers every request with the sample report after a fixed delay.
#[derive(Debug, Clone)]
pub struct SimulatedAnalysisService {
    latency: Duration,
}

impl SimulatedAnalysisService {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait::async_trait]
impl AnalysisService for SimulatedAnalysisService {
    fn provider(&self) -> Provider {
        Provider::Simulated
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        tracing::debug!(
            kind = %request.kind(),
            latency_ms = self.latency.as_millis() as u64,
            "simulated analysis"
        );
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(sample_report(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::Timeframe;

    #[tokio::test]
    async fn returns_sample_report_for_request_ticker() {
        let svc = SimulatedAnalysisService::new(Duration::ZERO);
        let req = AnalysisRequest::Ticker {
            ticker: "NVDA".to_string(),
            timeframe: Timeframe::Monthly,
        };
        let report = svc.analyze(&req).await.unwrap();
        assert_eq!(report.ticker.as_deref(), Some("NVDA"));
        assert_eq!(svc.provider(), Provider::Simulated);
    }
}
