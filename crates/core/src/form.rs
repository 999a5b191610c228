//! Request construction for the analysis form.
//!
//! The form holds one input per mode plus a single error message. A
//! submission is validated locally first; quota and missing-field failures
//! never reach the analysis service. On success the text inputs and the
//! selected chart are cleared, while the mode and timeframe are kept.

use std::fmt;

use crate::analysis::{AnalysisError, AnalysisService};
use crate::domain::report::AnalysisReport;
use crate::domain::request::{AnalysisKind, AnalysisRequest, ChartImage, Timeframe, UploadError};
use crate::subscription::Subscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    QuotaExhausted,
    MissingTicker,
    MissingChart,
    MissingQuestion,
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FormError::QuotaExhausted => {
                "You have reached your analysis limit. Please upgrade your plan."
            }
            FormError::MissingTicker => "Please enter a ticker symbol",
            FormError::MissingChart => "Please upload a chart image",
            FormError::MissingQuestion => "Please enter a question",
        })
    }
}

impl std::error::Error for FormError {}

#[derive(Debug)]
pub enum SubmitError {
    Invalid(FormError),
    /// A submission from this form is already awaiting the service.
    InFlight,
    Service(AnalysisError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Invalid(e) => e.fmt(f),
            SubmitError::InFlight => f.write_str("An analysis is already in progress"),
            SubmitError::Service(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Invalid(e) => Some(e),
            SubmitError::InFlight => None,
            SubmitError::Service(e) => Some(e),
        }
    }
}

impl From<FormError> for SubmitError {
    fn from(e: FormError) -> Self {
        SubmitError::Invalid(e)
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub request: AnalysisRequest,
    pub report: AnalysisReport,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisForm {
    mode: AnalysisKind,
    ticker: String,
    timeframe: Timeframe,
    question: String,
    chart_image: Option<ChartImage>,
    error: Option<String>,
    is_loading: bool,
}

impl AnalysisForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AnalysisKind {
        self.mode
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn chart_image(&self) -> Option<&ChartImage> {
        self.chart_image.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn set_mode(&mut self, mode: AnalysisKind) {
        self.mode = mode;
    }

    pub fn set_ticker(&mut self, ticker: impl Into<String>) {
        self.ticker = ticker.into();
    }

    pub fn set_timeframe(&mut self, timeframe: Timeframe) {
        self.timeframe = timeframe;
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = question.into();
    }

    /// File-picker drop. Dropping more than one file rejects the whole drop;
    /// otherwise the file must be a PNG or JPEG and replaces the selection.
    pub fn drop_files(&mut self, mut files: Vec<(String, Vec<u8>)>) -> Result<(), UploadError> {
        if files.len() > 1 {
            return Err(UploadError::TooManyFiles(files.len()));
        }
        let Some((name, bytes)) = files.pop() else {
            return Ok(());
        };
        self.chart_image = Some(ChartImage::new(name, bytes)?);
        Ok(())
    }

    pub fn remove_chart(&mut self) {
        self.chart_image = None;
    }

    /// Checks the quota first, then the field the current mode requires.
    pub fn validate(&self, subscription: &Subscription) -> Result<AnalysisRequest, FormError> {
        if !subscription.has_quota() {
            return Err(FormError::QuotaExhausted);
        }

        match self.mode {
            AnalysisKind::Ticker => {
                let ticker = self.ticker.trim();
                if ticker.is_empty() {
                    return Err(FormError::MissingTicker);
                }
                Ok(AnalysisRequest::Ticker {
                    ticker: ticker.to_string(),
                    timeframe: self.timeframe,
                })
            }
            AnalysisKind::Chart => match &self.chart_image {
                Some(image) => Ok(AnalysisRequest::Chart {
                    chart_image: image.clone(),
                }),
                None => Err(FormError::MissingChart),
            },
            AnalysisKind::Question => {
                let question = self.question.trim();
                if question.is_empty() {
                    return Err(FormError::MissingQuestion);
                }
                Ok(AnalysisRequest::Question {
                    question: question.to_string(),
                })
            }
        }
    }

    /// First half of a submission: validates and marks the form loading.
    pub fn begin(&mut self, subscription: &Subscription) -> Result<AnalysisRequest, SubmitError> {
        if self.is_loading {
            return Err(SubmitError::InFlight);
        }
        self.error = None;

        match self.validate(subscription) {
            Ok(request) => {
                self.is_loading = true;
                Ok(request)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Second half of a submission: applies the service outcome.
    pub fn finish(
        &mut self,
        request: AnalysisRequest,
        outcome: Result<AnalysisReport, AnalysisError>,
    ) -> Result<Submission, SubmitError> {
        self.is_loading = false;
        match outcome {
            Ok(report) => {
                self.ticker.clear();
                self.question.clear();
                self.chart_image = None;
                Ok(Submission { request, report })
            }
            Err(err) => {
                self.error = Some(err.user_message().to_string());
                Err(SubmitError::Service(err))
            }
        }
    }

    pub async fn submit(
        &mut self,
        subscription: &Subscription,
        service: &dyn AnalysisService,
    ) -> Result<Submission, SubmitError> {
        let request = self.begin(subscription)?;
        let outcome = service.analyze(&request).await;
        if let Err(err) = &outcome {
            tracing::warn!(kind = %request.kind(), error = %err, "analysis request failed");
        }
        self.finish(request, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisErrorKind, Provider};
    use crate::domain::report::sample_report;
    use crate::subscription::Tier;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl AnalysisService for CountingService {
        fn provider(&self) -> Provider {
            Provider::Simulated
        }

        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<AnalysisReport, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AnalysisError::new(
                    Provider::Simulated,
                    AnalysisErrorKind::Status(503),
                    "status=503",
                ));
            }
            Ok(sample_report(request))
        }
    }

    fn quota(n: i64) -> Subscription {
        let mut sub = Subscription::for_tier(Tier::Basic);
        sub.remaining_analysis = n;
        sub
    }

    #[tokio::test]
    async fn ticker_submission_builds_ticker_request() {
        let svc = CountingService::default();
        let mut form = AnalysisForm::new();
        form.set_ticker("AAPL");
        form.set_timeframe(Timeframe::Daily);

        let sub = form.submit(&quota(5), &svc).await.unwrap();
        assert_eq!(
            serde_json::to_value(&sub.request).unwrap(),
            json!({"type": "ticker", "ticker": "AAPL", "timeframe": "daily"})
        );
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
        assert!(form.error().is_none());
        assert!(!form.is_loading());
    }

    #[tokio::test]
    async fn chart_mode_without_file_is_rejected() {
        let svc = CountingService::default();
        let mut form = AnalysisForm::new();
        form.set_mode(AnalysisKind::Chart);

        let err = form.submit(&quota(5), &svc).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(FormError::MissingChart)));
        assert_eq!(form.error(), Some("Please upload a chart image"));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_quota_rejects_valid_question() {
        let svc = CountingService::default();
        let mut form = AnalysisForm::new();
        form.set_mode(AnalysisKind::Question);
        form.set_question("Buy TSLA?");

        let err = form.submit(&quota(0), &svc).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(FormError::QuotaExhausted)));
        assert_eq!(
            form.error(),
            Some("You have reached your analysis limit. Please upgrade your plan.")
        );
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
        // Inputs survive a rejected submission.
        assert_eq!(form.question(), "Buy TSLA?");
    }

    #[tokio::test]
    async fn every_mode_requires_its_field() {
        let svc = CountingService::default();
        let cases = [
            (AnalysisKind::Ticker, FormError::MissingTicker),
            (AnalysisKind::Chart, FormError::MissingChart),
            (AnalysisKind::Question, FormError::MissingQuestion),
        ];
        for (mode, expected) in cases {
            let mut form = AnalysisForm::new();
            form.set_mode(mode);
            // Whitespace counts as empty; other modes' fields are irrelevant.
            form.set_ticker(if mode == AnalysisKind::Ticker { "   " } else { "AAPL" });
            form.set_question(if mode == AnalysisKind::Question { "\n" } else { "why?" });
            if mode != AnalysisKind::Chart {
                form.drop_files(vec![("c.png".to_string(), vec![1])]).unwrap();
            }
            let err = form.submit(&quota(3), &svc).await.unwrap_err();
            assert!(matches!(err, SubmitError::Invalid(e) if e == expected));
        }
        assert_eq!(svc.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn success_clears_inputs_but_keeps_mode_and_timeframe() {
        let svc = CountingService::default();
        let mut form = AnalysisForm::new();
        form.set_ticker("BTC-USD");
        form.set_question("left over");
        form.set_timeframe(Timeframe::Weekly);
        form.drop_files(vec![("chart.jpeg".to_string(), vec![9, 9])]).unwrap();

        let sub = form.submit(&quota(1), &svc).await.unwrap();
        assert_eq!(sub.request.kind(), AnalysisKind::Ticker);
        assert_eq!(form.ticker(), "");
        assert_eq!(form.question(), "");
        assert!(form.chart_image().is_none());
        assert_eq!(form.mode(), AnalysisKind::Ticker);
        assert_eq!(form.timeframe(), Timeframe::Weekly);
    }

    #[tokio::test]
    async fn chart_submission_carries_only_the_image() {
        let svc = CountingService::default();
        let mut form = AnalysisForm::new();
        form.set_mode(AnalysisKind::Chart);
        form.set_ticker("ignored");
        form.drop_files(vec![("eth.png".to_string(), vec![1, 2])]).unwrap();

        let sub = form.submit(&quota(2), &svc).await.unwrap();
        let v = serde_json::to_value(&sub.request).unwrap();
        assert_eq!(v["type"], "chart");
        assert!(v.get("ticker").is_none());
        assert!(v.get("timeframe").is_none());
        assert_eq!(v["chart_image"]["file_name"], "eth.png");
    }

    #[tokio::test]
    async fn service_failure_surfaces_message_and_keeps_inputs() {
        let svc = CountingService {
            fail: true,
            ..Default::default()
        };
        let mut form = AnalysisForm::new();
        form.set_ticker("AAPL");

        let err = form.submit(&quota(5), &svc).await.unwrap_err();
        assert!(matches!(err, SubmitError::Service(_)));
        assert_eq!(
            form.error(),
            Some("The analysis could not be completed. Please try again.")
        );
        assert_eq!(form.ticker(), "AAPL");
        assert!(!form.is_loading());
    }

    #[test]
    fn begin_is_gated_while_loading() {
        let mut form = AnalysisForm::new();
        form.set_ticker("AAPL");
        let req = form.begin(&quota(5)).unwrap();
        assert!(form.is_loading());
        assert!(matches!(form.begin(&quota(5)), Err(SubmitError::InFlight)));
        form.finish(req.clone(), Ok(sample_report(&req))).unwrap();
        assert!(!form.is_loading());
    }

    #[test]
    fn new_submission_clears_previous_error() {
        let mut form = AnalysisForm::new();
        assert!(form.begin(&quota(5)).is_err());
        assert_eq!(form.error(), Some("Please enter a ticker symbol"));
        form.set_ticker("MSFT");
        form.begin(&quota(5)).unwrap();
        assert!(form.error().is_none());
    }

    #[test]
    fn drop_rejects_multiple_or_unsupported_files() {
        let mut form = AnalysisForm::new();
        form.drop_files(vec![("a.png".to_string(), vec![1])]).unwrap();

        let err = form
            .drop_files(vec![
                ("b.png".to_string(), vec![1]),
                ("c.png".to_string(), vec![1]),
            ])
            .unwrap_err();
        assert_eq!(err, UploadError::TooManyFiles(2));
        assert!(form
            .drop_files(vec![("notes.pdf".to_string(), vec![1])])
            .is_err());
        // Previous selection survives rejected drops.
        assert_eq!(form.chart_image().unwrap().file_name, "a.png");

        form.remove_chart();
        assert!(form.chart_image().is_none());
    }
}
