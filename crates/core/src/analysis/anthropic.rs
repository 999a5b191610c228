use crate::analysis::json;
use crate::analysis::{AnalysisError, AnalysisErrorKind, AnalysisService, Provider};
use crate::config::Settings;
use crate::domain::contract::LlmAnalysisReport;
use crate::domain::report::AnalysisReport;
use crate::domain::request::AnalysisRequest;
use anyhow::Context;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const REPAIR_ATTEMPTS: u32 = 2;

const TOOL_NAME_EMIT_REPORT: &str = "emit_report";

#[derive(Debug, Clone)]
pub struct AnthropicAnalysisService {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicAnalysisService {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    fn err(kind: AnalysisErrorKind, detail: impl Into<String>) -> AnalysisError {
        AnalysisError::new(Provider::Anthropic, kind, detail)
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> Result<CreateMessageResponse, AnalysisError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            Self::err(AnalysisErrorKind::Config, format!("invalid api key header: {e}"))
        })?;
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| Self::err(AnalysisErrorKind::Transport, format!("request failed: {e}")))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            Self::err(
                AnalysisErrorKind::Transport,
                format!("failed to read response body: {e}"),
            )
        })?;
        if !status.is_success() {
            return Err(
                Self::err(AnalysisErrorKind::Status(status.as_u16()), format!("status={status}"))
                    .with_raw_output(text),
            );
        }

        serde_json::from_str::<CreateMessageResponse>(&text).map_err(|e| {
            Self::err(
                AnalysisErrorKind::InvalidOutput,
                format!("failed to decode response into CreateMessageResponse: {e}"),
            )
            .with_raw_output(text)
        })
    }

    fn tools() -> Vec<Tool> {
        let sentiment = serde_json::json!({"type": "string", "enum": ["positive", "negative", "neutral"]});
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["ticker", "summary", "technical_analysis", "sentiment_analysis", "recommendation"],
            "properties": {
                "ticker": {"type": ["string", "null"]},
                "summary": {"type": "string"},
                "technical_analysis": {
                    "type": "object",
                    "required": ["trend", "support_levels", "resistance_levels", "indicators"],
                    "properties": {
                        "trend": {"type": "string", "enum": ["bullish", "bearish", "neutral"]},
                        "support_levels": {"type": "array", "items": {"type": "number"}},
                        "resistance_levels": {"type": "array", "items": {"type": "number"}},
                        "indicators": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "value", "signal"],
                                "properties": {
                                    "name": {"type": "string"},
                                    "value": {"type": "string"},
                                    "signal": {"type": "string", "enum": ["buy", "sell", "neutral"]}
                                }
                            }
                        }
                    }
                },
                "sentiment_analysis": {
                    "type": "object",
                    "required": ["overall", "score", "sources"],
                    "properties": {
                        "overall": sentiment,
                        "score": {"type": "number", "minimum": 0, "maximum": 1},
                        "sources": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["name", "sentiment"],
                                "properties": {
                                    "name": {"type": "string"},
                                    "sentiment": sentiment
                                }
                            }
                        }
                    }
                },
                "recommendation": {
                    "type": "object",
                    "required": ["action", "confidence", "timeframe", "target_price"],
                    "properties": {
                        "action": {"type": "string", "enum": ["buy", "sell", "hold"]},
                        "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                        "timeframe": {"type": "string"},
                        "target_price": {"type": ["number", "null"]}
                    }
                }
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_REPORT,
            description: "Emit the final analysis report as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_REPORT,
        }
    }

    fn system_prompt() -> String {
        [
            "You are a financial analysis engine for equities and crypto pairs.",
            "Combine technical analysis, market sentiment and historical patterns.",
            "Return ONLY valid JSON matching the emit_report schema. No markdown, no prose.",
            "Rules:",
            "- summary is one paragraph of plain text",
            "- support_levels and resistance_levels are positive prices, nearest first",
            "- sentiment score and recommendation confidence are in [0, 1]",
            "- target_price key MUST be present (use null if none)",
            "- ticker is the analysed symbol, or null if none applies",
        ]
        .join("\n")
    }

    fn user_content(request: &AnalysisRequest) -> Vec<InputBlock> {
        match request {
            AnalysisRequest::Ticker { ticker, timeframe } => vec![InputBlock::Text {
                text: format!(
                    "Task: Analyse {ticker} on a {timeframe} timeframe and emit the report."
                ),
            }],
            AnalysisRequest::Chart { chart_image } => vec![
                InputBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: chart_image.format.media_type(),
                        data: base64::engine::general_purpose::STANDARD
                            .encode(&chart_image.bytes),
                    },
                },
                InputBlock::Text {
                    text: format!(
                        "Task: Analyse the attached price chart ({}) and emit the report. \
                         Identify the symbol if it is visible on the chart.",
                        chart_image.file_name
                    ),
                },
            ],
            AnalysisRequest::Question { question } => vec![InputBlock::Text {
                text: format!("Task: Answer this investor question with a full report.\n\nQuestion: {question}"),
            }],
        }
    }

    fn repair_prompt(previous_output: &str) -> String {
        format!(
            "Your previous message was NOT valid JSON for the report schema.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the emit_report schema.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Do NOT include trailing commas, comments, or semicolons.\n\
- score and confidence MUST be numbers between 0 and 1.\n\
- target_price MUST be present (null if none).\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}"
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_report(
        res: &CreateMessageResponse,
    ) -> Result<Option<LlmAnalysisReport>, AnalysisError> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_REPORT {
                    let parsed = serde_json::from_value::<LlmAnalysisReport>(input.clone())
                        .map_err(|e| {
                            Self::err(
                                AnalysisErrorKind::InvalidOutput,
                                format!("failed to decode tool_use.input into LlmAnalysisReport: {e}"),
                            )
                            .with_raw_output(input.to_string())
                        })?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }

    fn request_for(&self, content: Vec<InputBlock>, max_tokens: u32) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        }
    }

    async fn try_parse_with_repairs(
        &self,
        request: &AnalysisRequest,
        initial_text: String,
    ) -> Result<AnalysisReport, AnalysisError> {
        let expected_ticker = request.ticker();
        let first_err = match json::parse_report(&initial_text, expected_ticker) {
            Ok(report) => return Ok(report),
            Err(err) => err,
        };

        let mut last_err = first_err;
        let mut last_text = initial_text;
        for attempt in 1..=REPAIR_ATTEMPTS {
            let repair_req = self.request_for(
                vec![InputBlock::Text {
                    text: Self::repair_prompt(&last_text),
                }],
                self.max_tokens,
            );

            let repair_res = self.create_message(repair_req).await?;
            if let Some(tool_report) = Self::response_tool_report(&repair_res)? {
                return tool_report
                    .validate_and_into_report(expected_ticker)
                    .map_err(|e| Self::err(AnalysisErrorKind::InvalidOutput, format!("{e:#}")));
            }

            let repair_text = Self::response_text(&repair_res);
            match json::parse_report(&repair_text, expected_ticker) {
                Ok(report) => return Ok(report),
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        kind = %request.kind(),
                        error = %err,
                        "model output still invalid after repair attempt"
                    );
                    last_err = err;
                    last_text = repair_text;
                }
            }
        }

        Err(Self::err(
            AnalysisErrorKind::InvalidOutput,
            format!("final_error={last_err:#}"),
        )
        .with_raw_output(last_text))
    }
}

#[async_trait::async_trait]
impl AnalysisService for AnthropicAnalysisService {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let content = Self::user_content(request);
        let mut res = self
            .create_message(self.request_for(content.clone(), self.max_tokens))
            .await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                kind = %request.kind(),
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            res = self.create_message(self.request_for(content, bumped)).await?;
        }

        if let Some(tool_report) = Self::response_tool_report(&res)? {
            let report = tool_report
                .validate_and_into_report(request.ticker())
                .map_err(|e| Self::err(AnalysisErrorKind::InvalidOutput, format!("{e:#}")))?;
            tracing::info!(kind = %request.kind(), ticker = ?report.ticker, "analysis completed");
            return Ok(report);
        }

        // Fallback to text (should be rare with a forced tool choice).
        let text = Self::response_text(&res);
        self.try_parse_with_repairs(request, text).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<InputBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}
