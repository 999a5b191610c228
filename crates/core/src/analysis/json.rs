use crate::domain::contract::LlmAnalysisReport;
use crate::domain::report::AnalysisReport;
use anyhow::Context;

/// Finds the first balanced JSON object in model text. Markdown fences and
/// surrounding prose are skipped; braces inside string literals are ignored.
pub fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_report(text: &str, expected_ticker: Option<&str>) -> anyhow::Result<AnalysisReport> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmAnalysisReport>(&json_str)
        .with_context(|| format!("model output is not valid JSON for report schema: {json_str}"))?;
    parsed.validate_and_into_report(expected_ticker)
}
