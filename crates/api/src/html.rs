//! Server-rendered pages.

use askama::Template;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use marketlens_core::domain::request::{AnalysisKind, Timeframe};
use marketlens_core::form::{AnalysisForm, SubmitError};
use marketlens_core::page::{AnalysisPage, Feedback};
use marketlens_core::view::dashboard::DashboardView;
use marketlens_core::view::report::ReportView;

use crate::session::Session;
use crate::state::{AppState, SubmitFailure};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    view: DashboardView,
}

#[derive(Template)]
#[template(path = "analysis_form.html")]
struct AnalysisFormTemplate {
    user: String,
    mode: &'static str,
    modes: Vec<ModeTab>,
    ticker: String,
    timeframes: Vec<TimeframeOption>,
    question: String,
    chart_name: Option<String>,
    error: Option<String>,
    remaining: i64,
}

#[derive(Template)]
#[template(path = "analysis_result.html")]
struct AnalysisResultTemplate {
    user: String,
    view: ReportView,
    notice: Option<String>,
}

struct ModeTab {
    value: &'static str,
    label: &'static str,
    active: bool,
}

struct TimeframeOption {
    value: &'static str,
    label: &'static str,
    selected: bool,
}

fn mode_label(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Ticker => "Ticker Analysis",
        AnalysisKind::Chart => "Chart Upload",
        AnalysisKind::Question => "Ask Question",
    }
}

impl AnalysisFormTemplate {
    fn build(user: &str, form: &AnalysisForm, error: Option<String>, remaining: i64) -> Self {
        Self {
            user: user.to_string(),
            mode: form.mode().as_str(),
            modes: AnalysisKind::ALL
                .iter()
                .map(|&kind| ModeTab {
                    value: kind.as_str(),
                    label: mode_label(kind),
                    active: kind == form.mode(),
                })
                .collect(),
            ticker: form.ticker().to_string(),
            timeframes: Timeframe::ALL
                .iter()
                .map(|&tf| TimeframeOption {
                    value: tf.as_str(),
                    label: tf.label(),
                    selected: tf == form.timeframe(),
                })
                .collect(),
            question: form.question().to_string(),
            chart_name: form.chart_image().map(|c| c.file_name.clone()),
            error: error.or_else(|| form.error().map(str::to_string)),
            remaining,
        }
    }
}

fn render(template: impl Template, status: StatusCode) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Template error: {e}")),
            )
                .into_response()
        }
    }
}

/// GET / - dashboard.
pub async fn dashboard(State(state): State<AppState>, session: Session) -> Response {
    let view = state.dashboard().await;
    session.attach(render(DashboardTemplate { view }, StatusCode::OK))
}

/// POST /market/refresh
pub async fn refresh_market(State(state): State<AppState>) -> Redirect {
    state.refresh_market().await;
    Redirect::to("/")
}

#[derive(Debug, Deserialize)]
pub struct ModeQuery {
    pub mode: Option<String>,
}

/// GET /analysis - the form, or the last result for this session.
pub async fn analysis_page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ModeQuery>,
) -> Response {
    let remaining = state.subscription.lock().await.remaining_analysis;
    let user = state.user.display_name.clone();
    let mode = query.mode.as_deref().and_then(|m| m.parse::<AnalysisKind>().ok());

    let response = state
        .with_page(session.id, |page| {
            if let Some(result) = page.result() {
                let view = result.view();
                let notice = page.take_notice();
                return render(
                    AnalysisResultTemplate { user, view, notice },
                    StatusCode::OK,
                );
            }
            if let Some(mode) = mode {
                page.form.set_mode(mode);
            }
            render(
                AnalysisFormTemplate::build(&user, &page.form, None, remaining),
                StatusCode::OK,
            )
        })
        .await;
    session.attach(response)
}

#[derive(Debug, Default)]
struct SubmittedFields {
    mode: Option<AnalysisKind>,
    ticker: Option<String>,
    timeframe: Option<Timeframe>,
    question: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl SubmittedFields {
    async fn read(mut multipart: Multipart) -> anyhow::Result<Self> {
        let mut fields = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "chart" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was picked.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    fields.files.push((file_name, bytes.to_vec()));
                }
                "mode" => fields.mode = Some(field.text().await?.parse()?),
                "timeframe" => fields.timeframe = Some(field.text().await?.parse()?),
                "ticker" => fields.ticker = Some(field.text().await?),
                "question" => fields.question = Some(field.text().await?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(fields)
    }

    fn apply(
        self,
        form: &mut AnalysisForm,
    ) -> Result<(), marketlens_core::domain::request::UploadError> {
        if let Some(mode) = self.mode {
            form.set_mode(mode);
        }
        if let Some(ticker) = self.ticker {
            form.set_ticker(ticker);
        }
        if let Some(timeframe) = self.timeframe {
            form.set_timeframe(timeframe);
        }
        if let Some(question) = self.question {
            form.set_question(question);
        }
        if self.files.is_empty() {
            return Ok(());
        }
        form.drop_files(self.files)
    }
}

fn failure_status(failure: &SubmitFailure) -> StatusCode {
    match failure {
        SubmitFailure::Upload(_) | SubmitFailure::Submit(SubmitError::Invalid(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SubmitFailure::Submit(SubmitError::InFlight) => StatusCode::CONFLICT,
        SubmitFailure::Submit(SubmitError::Service(_)) => StatusCode::BAD_GATEWAY,
    }
}

/// POST /analysis - multipart form submit.
pub async fn submit_analysis(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Response {
    let fields = match SubmittedFields::read(multipart).await {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "malformed analysis form");
            return session.attach((StatusCode::BAD_REQUEST, "malformed form").into_response());
        }
    };

    match state.submit(session.id, |form| fields.apply(form)).await {
        Ok(()) => session.attach(Redirect::to("/analysis").into_response()),
        Err(failure) => {
            let status = failure_status(&failure);
            let remaining = state.subscription.lock().await.remaining_analysis;
            let user = state.user.display_name.clone();
            let upload_error = match &failure {
                SubmitFailure::Upload(e) => Some(e.to_string()),
                SubmitFailure::Submit(_) => None,
            };
            let response = state
                .with_page(session.id, |page| {
                    render(
                        AnalysisFormTemplate::build(&user, &page.form, upload_error, remaining),
                        status,
                    )
                })
                .await;
            session.attach(response)
        }
    }
}

async fn page_action(
    state: &AppState,
    session: Session,
    action: impl FnOnce(&mut AnalysisPage),
) -> Response {
    state.with_page(session.id, action).await;
    session.attach(Redirect::to("/analysis").into_response())
}

/// POST /analysis/new
pub async fn new_analysis(State(state): State<AppState>, session: Session) -> Response {
    page_action(&state, session, AnalysisPage::new_analysis).await
}

/// POST /analysis/chart/remove
pub async fn remove_chart(State(state): State<AppState>, session: Session) -> Response {
    page_action(&state, session, |page| page.form.remove_chart()).await
}

#[derive(Debug, Deserialize)]
pub struct FeedbackForm {
    pub choice: Feedback,
}

/// POST /analysis/feedback
pub async fn feedback(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<FeedbackForm>,
) -> Response {
    page_action(&state, session, |page| {
        page.feedback(form.choice);
    })
    .await
}

/// POST /analysis/download
pub async fn download(State(state): State<AppState>, session: Session) -> Response {
    page_action(&state, session, |page| {
        page.download();
    })
    .await
}

/// POST /analysis/share
pub async fn share(State(state): State<AppState>, session: Session) -> Response {
    page_action(&state, session, |page| {
        page.share();
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router;
    use crate::session::COOKIE_NAME;
    use crate::state::tests::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "XmarketlensX";

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"chart\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn post_form(session: Uuid, body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analysis")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, format!("{COOKIE_NAME}={session}"))
            .body(body)
            .unwrap()
    }

    fn get(uri: &str, session: Uuid) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, format!("{COOKIE_NAME}={session}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn dashboard_renders_and_sets_cookie() {
        let app = router(test_state(38));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_some());
        let html = body_text(response).await;
        assert!(html.contains("Remaining Analyses"));
        assert!(html.contains("$28,456.32"));
        assert!(html.contains("10/15/2023"));
    }

    #[tokio::test]
    async fn ticker_submit_redirects_to_result() {
        let state = test_state(5);
        let session = Uuid::new_v4();

        let response = router(state.clone())
            .oneshot(post_form(
                session,
                multipart_body(
                    &[("mode", "ticker"), ("ticker", "AAPL"), ("timeframe", "weekly")],
                    None,
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/analysis");
        assert_eq!(state.subscription.lock().await.remaining_analysis, 4);

        let response = router(state).oneshot(get("/analysis", session)).await.unwrap();
        let html = body_text(response).await;
        assert!(html.contains("AAPL Analysis"));
        assert!(html.contains("weekly timeframe"));
        assert!(html.contains("82% confidence"));
    }

    #[tokio::test]
    async fn chart_mode_without_file_rerenders_form() {
        let response = router(test_state(5))
            .oneshot(post_form(
                Uuid::new_v4(),
                multipart_body(&[("mode", "chart")], None),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("Please upload a chart image"));
    }

    #[tokio::test]
    async fn unsupported_upload_is_reported() {
        let response = router(test_state(5))
            .oneshot(post_form(
                Uuid::new_v4(),
                multipart_body(&[("mode", "chart")], Some(("notes.pdf", b"%PDF"))),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("notes.pdf"));
    }

    #[tokio::test]
    async fn chart_upload_is_analyzed() {
        let state = test_state(5);
        let session = Uuid::new_v4();
        let response = router(state.clone())
            .oneshot(post_form(
                session,
                multipart_body(&[("mode", "chart")], Some(("btc.PNG", &[137, 80, 78, 71]))),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = body_text(router(state).oneshot(get("/analysis", session)).await.unwrap()).await;
        assert!(html.contains("Chart Analysis"));
        assert!(html.contains("Custom timeframe"));
    }

    #[tokio::test]
    async fn exhausted_quota_blocks_question() {
        let state = test_state(0);
        let response = router(state.clone())
            .oneshot(post_form(
                Uuid::new_v4(),
                multipart_body(&[("mode", "question"), ("question", "Buy TSLA?")], None),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("You have reached your analysis limit. Please upgrade your plan."));
        assert!(html.contains("Buy TSLA?"));
        assert_eq!(state.subscription.lock().await.remaining_analysis, 0);
    }

    #[tokio::test]
    async fn mode_query_switches_tab() {
        let html = body_text(
            router(test_state(5))
                .oneshot(get("/analysis?mode=question", Uuid::new_v4()))
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("name=\"question\""));
        assert!(!html.contains("name=\"ticker\""));
    }

    #[tokio::test]
    async fn feedback_notice_is_shown_once() {
        let state = test_state(5);
        let session = Uuid::new_v4();
        state
            .submit(session, |form| {
                form.set_ticker("MSFT");
                Ok(())
            })
            .await
            .unwrap();

        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analysis/feedback")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::COOKIE, format!("{COOKIE_NAME}={session}"))
                    .body(Body::from("choice=positive"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let first = body_text(
            router(state.clone())
                .oneshot(get("/analysis", session))
                .await
                .unwrap(),
        )
        .await;
        assert!(first.contains("Thank you for your positive feedback!"));
        let second = body_text(router(state).oneshot(get("/analysis", session)).await.unwrap())
            .await;
        assert!(!second.contains("Thank you for your positive feedback!"));
    }

    #[tokio::test]
    async fn new_analysis_returns_to_form() {
        let state = test_state(5);
        let session = Uuid::new_v4();
        state
            .submit(session, |form| {
                form.set_ticker("MSFT");
                Ok(())
            })
            .await
            .unwrap();

        router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analysis/new")
                    .header(header::COOKIE, format!("{COOKIE_NAME}={session}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let html = body_text(router(state).oneshot(get("/analysis", session)).await.unwrap()).await;
        assert!(html.contains("Generate Analysis"));
    }
}
