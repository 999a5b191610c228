//! JSON API mirroring the HTML pages.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use marketlens_core::domain::market::AnalysisRecord;
use marketlens_core::domain::report::AnalysisReport;
use marketlens_core::domain::request::{AnalysisKind, AnalysisRequest, Timeframe, UploadError};
use marketlens_core::form::{AnalysisForm, SubmitError};
use marketlens_core::market::types::MarketOverviewResponse;
use marketlens_core::view::dashboard::DashboardView;
use marketlens_core::view::report::ReportView;

use crate::session::Session;
use crate::state::{AppState, SubmitFailure};

pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.dashboard().await)
}

/// Same shape the HTTP market-data provider consumes.
pub async fn market(State(state): State<AppState>) -> Json<MarketOverviewResponse> {
    let market = state.market.lock().await;
    Json(MarketOverviewResponse {
        as_of: Some(chrono::Utc::now()),
        items: market.items().to_vec(),
    })
}

pub async fn recent_analyses(State(state): State<AppState>) -> Json<Vec<AnalysisRecord>> {
    Json(state.recent.as_ref().clone())
}

#[derive(Debug, Deserialize)]
pub struct ChartUpload {
    pub file_name: String,
    /// Standard base64, no data-URL prefix.
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisBody {
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub question: String,
    pub chart_image: Option<ChartUpload>,
}

impl ChartUpload {
    fn decode(self) -> Result<(String, Vec<u8>), base64::DecodeError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(self.data.trim())?;
        Ok((self.file_name, bytes))
    }
}

impl AnalysisBody {
    /// Each call replaces the whole form, chart included.
    fn apply(
        self,
        chart: Option<(String, Vec<u8>)>,
        form: &mut AnalysisForm,
    ) -> Result<(), UploadError> {
        form.set_mode(self.kind);
        form.set_ticker(self.ticker);
        form.set_timeframe(self.timeframe);
        form.set_question(self.question);
        form.remove_chart();
        match chart {
            Some(file) => form.drop_files(vec![file]),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub request: AnalysisRequest,
    pub report: AnalysisReport,
    pub view: ReportView,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// POST /api/analysis
pub async fn submit_analysis(
    State(state): State<AppState>,
    session: Session,
    Json(mut body): Json<AnalysisBody>,
) -> Response {
    let chart = match body.chart_image.take().map(ChartUpload::decode).transpose() {
        Ok(chart) => chart,
        Err(e) => {
            return session.attach(error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("chart_image.data is not valid base64: {e}"),
            ))
        }
    };

    let response = match state.submit(session.id, |form| body.apply(chart, form)).await {
        Ok(()) => {
            let completed = state
                .with_page(session.id, |page| page.result().cloned())
                .await;
            match completed {
                Some(done) => Json(AnalysisResponse {
                    view: done.view(),
                    request: done.request,
                    report: done.report,
                })
                .into_response(),
                None => error_response(
                    StatusCode::CONFLICT,
                    "The result was replaced by another request".to_string(),
                ),
            }
        }
        Err(SubmitFailure::Upload(e)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(SubmitFailure::Submit(SubmitError::Invalid(e))) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(SubmitFailure::Submit(SubmitError::InFlight)) => {
            error_response(StatusCode::CONFLICT, SubmitError::InFlight.to_string())
        }
        Err(SubmitFailure::Submit(SubmitError::Service(e))) => {
            error_response(StatusCode::BAD_GATEWAY, e.user_message().to_string())
        }
    };
    session.attach(response)
}
