use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use marketlens_core::analysis::{self, AnalysisError, AnalysisErrorKind, AnalysisService};
use marketlens_core::config::Settings;
use marketlens_core::domain::market::{seed_recent_analyses, AnalysisRecord};
use marketlens_core::domain::report::AnalysisReport;
use marketlens_core::domain::request::{AnalysisRequest, UploadError};
use marketlens_core::form::{AnalysisForm, SubmitError};
use marketlens_core::market::{self, MarketDataProvider, MarketOverview};
use marketlens_core::page::AnalysisPage;
use marketlens_core::subscription::{Subscription, User};
use marketlens_core::view::dashboard::DashboardView;

use crate::session::SessionStore;

/// Shared handler state. Every lock here is short-lived; nothing awaits a
/// backend while holding one. Backend calls run on their own task so a
/// dropped request still clears its loading flag.
#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<dyn AnalysisService>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub subscription: Arc<Mutex<Subscription>>,
    pub market: Arc<Mutex<MarketOverview>>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub recent: Arc<Vec<AnalysisRecord>>,
    pub user: User,
}

#[derive(Debug)]
pub enum SubmitFailure {
    Upload(UploadError),
    Submit(SubmitError),
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFailure::Upload(e) => e.fmt(f),
            SubmitFailure::Submit(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for SubmitFailure {}

impl AppState {
    pub fn new(
        analysis: Arc<dyn AnalysisService>,
        market_data: Arc<dyn MarketDataProvider>,
        subscription: Subscription,
        user: User,
    ) -> Self {
        Self {
            analysis,
            market_data,
            subscription: Arc::new(Mutex::new(subscription)),
            market: Arc::new(Mutex::new(MarketOverview::default())),
            sessions: Arc::new(Mutex::new(SessionStore::default())),
            recent: Arc::new(seed_recent_analyses()),
            user,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let analysis = analysis::from_settings(settings)?;
        let market_data = market::provider::from_settings(settings)?;
        tracing::info!(
            analysis = analysis.provider().as_str(),
            market_data = market_data.provider_name(),
            "backends configured"
        );
        Ok(Self::new(
            analysis,
            market_data,
            settings.subscription()?,
            settings.user(),
        ))
    }

    pub async fn dashboard(&self) -> DashboardView {
        let subscription = self.subscription.lock().await.clone();
        let market = self.market.lock().await;
        DashboardView::build(&self.user, &subscription, &market, &self.recent)
    }

    /// Returns `false` when a refresh was already running.
    pub async fn refresh_market(&self) -> bool {
        if !self.market.lock().await.begin_refresh() {
            tracing::debug!("market refresh already in flight");
            return false;
        }
        let state = self.clone();
        let task = tokio::spawn(async move {
            let outcome = state.market_data.fetch_market().await;
            state.market.lock().await.finish_refresh(outcome);
        });
        if let Err(err) = task.await {
            self.market
                .lock()
                .await
                .finish_refresh(Err(anyhow::anyhow!("market refresh task failed: {err}")));
        }
        true
    }

    /// Runs `f` against the session's page, creating it on first use.
    pub async fn with_page<T>(&self, session: Uuid, f: impl FnOnce(&mut AnalysisPage) -> T) -> T {
        let mut sessions = self.sessions.lock().await;
        f(sessions.page(session))
    }

    /// Applies the submitted inputs to the session's form and runs the
    /// analysis. One analysis is taken from the subscription when the
    /// request is accepted and given back if the service fails. On success
    /// the page switches to the result.
    pub async fn submit(
        &self,
        session: Uuid,
        edit: impl FnOnce(&mut AnalysisForm) -> Result<(), UploadError>,
    ) -> Result<(), SubmitFailure> {
        let request = {
            let mut subscription = self.subscription.lock().await;
            let request = self
                .with_page(session, |page| {
                    if page.form.is_loading() {
                        return Err(SubmitFailure::Submit(SubmitError::InFlight));
                    }
                    edit(&mut page.form).map_err(SubmitFailure::Upload)?;
                    page.form.begin(&subscription).map_err(SubmitFailure::Submit)
                })
                .await?;
            subscription.record_analysis();
            request
        };

        let state = self.clone();
        let pending = request.clone();
        let task = tokio::spawn(async move {
            let outcome = state.analysis.analyze(&pending).await;
            state.complete(session, pending, outcome).await
        });
        match task.await {
            Ok(result) => result.map_err(SubmitFailure::Submit),
            Err(err) => {
                let failed = AnalysisError::new(
                    self.analysis.provider(),
                    AnalysisErrorKind::Transport,
                    format!("analysis task failed: {err}"),
                );
                self.complete(session, request, Err(failed))
                    .await
                    .map_err(SubmitFailure::Submit)
            }
        }
    }

    async fn complete(
        &self,
        session: Uuid,
        request: AnalysisRequest,
        outcome: Result<AnalysisReport, AnalysisError>,
    ) -> Result<(), SubmitError> {
        let kind = request.kind();
        let title = request.title();
        if let Err(err) = &outcome {
            sentry::capture_error(err);
            tracing::warn!(%kind, error = %err, "analysis request failed");
        }

        let today = chrono::Local::now().date_naive();
        let finished = {
            let mut sessions = self.sessions.lock().await;
            match sessions.existing(session) {
                Some(page) => page.form.finish(request, outcome).map(|submission| {
                    page.show_result(submission, today);
                }),
                None => outcome.map(|_| ()).map_err(SubmitError::Service),
            }
        };

        match &finished {
            Ok(()) => tracing::info!(%kind, %title, %session, "analysis completed"),
            Err(_) => self.subscription.lock().await.refund_analysis(),
        }
        finished
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use marketlens_core::analysis::simulated::SimulatedAnalysisService;
    use marketlens_core::form::FormError;
    use marketlens_core::market::StaticMarketData;
    use marketlens_core::subscription::Tier;
    use std::time::Duration;

    pub(crate) fn test_state(remaining: i64) -> AppState {
        slow_state(remaining, Duration::ZERO)
    }

    fn slow_state(remaining: i64, latency: Duration) -> AppState {
        with_service(remaining, Arc::new(SimulatedAnalysisService::new(latency)), latency)
    }

    fn with_service(
        remaining: i64,
        analysis: Arc<dyn AnalysisService>,
        market_latency: Duration,
    ) -> AppState {
        let mut subscription = Subscription::for_tier(Tier::Basic);
        subscription.remaining_analysis = remaining;
        AppState::new(
            analysis,
            Arc::new(StaticMarketData::new(market_latency)),
            subscription,
            User::new("demo"),
        )
    }

    struct Unavailable;

    #[axum::async_trait]
    impl AnalysisService for Unavailable {
        fn provider(&self) -> analysis::Provider {
            analysis::Provider::Simulated
        }

        async fn analyze(
            &self,
            _request: &AnalysisRequest,
        ) -> Result<AnalysisReport, AnalysisError> {
            Err(AnalysisError::new(
                analysis::Provider::Simulated,
                AnalysisErrorKind::Status(503),
                "status=503",
            ))
        }
    }

    fn ticker(symbol: &'static str) -> impl FnOnce(&mut AnalysisForm) -> Result<(), UploadError> {
        move |form| {
            form.set_ticker(symbol);
            Ok(())
        }
    }

    #[tokio::test]
    async fn submit_records_usage_and_shows_result() {
        let state = test_state(2);
        let session = Uuid::new_v4();

        state
            .submit(session, |form| {
                form.set_ticker("NVDA");
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(state.subscription.lock().await.remaining_analysis, 1);
        let showing = state.with_page(session, |p| p.is_showing_results()).await;
        assert!(showing);
    }

    #[tokio::test]
    async fn rejected_upload_does_not_touch_quota() {
        let state = test_state(2);
        let session = Uuid::new_v4();

        let err = state
            .submit(session, |form| {
                form.drop_files(vec![("notes.txt".to_string(), vec![1])])
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitFailure::Upload(UploadError::UnsupportedFormat(_))));
        assert_eq!(state.subscription.lock().await.remaining_analysis, 2);
    }

    #[tokio::test]
    async fn refresh_is_skipped_while_loading() {
        let state = test_state(1);
        state.market.lock().await.begin_refresh();
        assert!(!state.refresh_market().await);

        state.market.lock().await.finish_refresh(Ok(vec![]));
        assert!(state.refresh_market().await);
        assert_eq!(state.market.lock().await.items().len(), 7);
    }

    #[tokio::test]
    async fn dropped_submit_still_finishes_the_analysis() {
        let state = slow_state(3, Duration::from_millis(200));
        let session = Uuid::new_v4();

        let dropped =
            tokio::time::timeout(Duration::from_millis(20), state.submit(session, ticker("AAPL")))
                .await;
        assert!(dropped.is_err());
        assert_eq!(state.subscription.lock().await.remaining_analysis, 2);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let (loading, showing) = state
            .with_page(session, |p| (p.form.is_loading(), p.is_showing_results()))
            .await;
        assert!(!loading);
        assert!(showing);

        state.submit(session, ticker("MSFT")).await.unwrap();
        assert_eq!(state.subscription.lock().await.remaining_analysis, 1);
    }

    #[tokio::test]
    async fn dropped_refresh_releases_the_gate() {
        let state = slow_state(1, Duration::from_millis(200));

        let dropped =
            tokio::time::timeout(Duration::from_millis(20), state.refresh_market()).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!state.market.lock().await.is_loading());
        assert!(state.refresh_market().await);
    }

    #[tokio::test]
    async fn last_analysis_goes_to_one_of_two_concurrent_submits() {
        let state = slow_state(1, Duration::from_millis(50));

        let (a, b) = tokio::join!(
            state.submit(Uuid::new_v4(), ticker("AAPL")),
            state.submit(Uuid::new_v4(), ticker("TSLA")),
        );

        let failures: Vec<_> = [a, b].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0],
            SubmitFailure::Submit(SubmitError::Invalid(FormError::QuotaExhausted))
        ));
        assert_eq!(state.subscription.lock().await.remaining_analysis, 0);
    }

    #[tokio::test]
    async fn failed_analysis_refunds_the_quota() {
        let state = with_service(1, Arc::new(Unavailable), Duration::ZERO);
        let session = Uuid::new_v4();

        let err = state.submit(session, ticker("AAPL")).await.unwrap_err();
        assert!(matches!(err, SubmitFailure::Submit(SubmitError::Service(_))));
        assert_eq!(state.subscription.lock().await.remaining_analysis, 1);

        let (loading, error) = state
            .with_page(session, |p| (p.form.is_loading(), p.form.error().map(str::to_string)))
            .await;
        assert!(!loading);
        assert_eq!(
            error.as_deref(),
            Some("The analysis could not be completed. Please try again.")
        );
    }
}
