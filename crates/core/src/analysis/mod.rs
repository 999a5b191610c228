//! Analysis backends.
//!
//! A backend turns a validated [`AnalysisRequest`] into an [`AnalysisReport`]
//! or a typed [`AnalysisError`]. Local validation happens before a backend is
//! ever called; see [`crate::form`].

use crate::domain::report::AnalysisReport;
use crate::domain::request::AnalysisRequest;

pub mod anthropic;
pub mod error;
pub mod json;
pub mod simulated;

pub use error::{AnalysisError, AnalysisErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Simulated,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Simulated => "simulated",
            Provider::Anthropic => "anthropic",
        }
    }
}

#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    fn provider(&self) -> Provider;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError>;
}

/// Builds the backend selected by `ANALYSIS_BACKEND`.
pub fn from_settings(
    settings: &crate::config::Settings,
) -> anyhow::Result<std::sync::Arc<dyn AnalysisService>> {
    use crate::config::AnalysisBackend;

    Ok(match settings.analysis_backend()? {
        AnalysisBackend::Simulated => std::sync::Arc::new(
            simulated::SimulatedAnalysisService::new(settings.analysis_latency()?),
        ),
        AnalysisBackend::Anthropic => std::sync::Arc::new(
            anthropic::AnthropicAnalysisService::from_settings(settings)?,
        ),
    })
}
