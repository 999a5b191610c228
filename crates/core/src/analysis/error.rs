use crate::analysis::Provider;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    /// Backend is misconfigured (missing key, bad header value).
    Config,
    /// Request never produced an HTTP response.
    Transport,
    /// Non-success HTTP status.
    Status(u16),
    /// Response arrived but did not satisfy the report contract.
    InvalidOutput,
}

#[derive(Debug, Clone)]
pub struct AnalysisError {
    pub provider: Provider,
    pub kind: AnalysisErrorKind,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl AnalysisError {
    pub fn new(provider: Provider, kind: AnalysisErrorKind, detail: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            detail: detail.into(),
            raw_output: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    /// Message suitable for the form's error banner.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            AnalysisErrorKind::Config | AnalysisErrorKind::Transport => {
                "The analysis service is unavailable. Please try again later."
            }
            AnalysisErrorKind::Status(429) => {
                "The analysis service is busy. Please try again in a moment."
            }
            AnalysisErrorKind::Status(_) | AnalysisErrorKind::InvalidOutput => {
                "The analysis could not be completed. Please try again."
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.kind {
            AnalysisErrorKind::Config => "config".to_string(),
            AnalysisErrorKind::Transport => "transport".to_string(),
            AnalysisErrorKind::Status(code) => format!("http status={code}"),
            AnalysisErrorKind::InvalidOutput => "parse".to_string(),
        };
        write!(
            f,
            "analysis error (provider={}, stage={stage}): {}",
            self.provider.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for AnalysisError {}
