use crate::config::Settings;
use crate::domain::analysis::{DailyReport, StockAnalysis};
use crate::domain::contract::{LlmDailyReport, LlmStockAnalysis};
use crate::llm::error::LlmCallError;
use crate::llm::json;
use crate::llm::{AnalyzeInput, LlmClient, Provider, ReportInput};
use anyhow::Context;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_ANALYSIS: &str = "emit_analysis";
const TOOL_NAME_EMIT_REPORT: &str = "emit_report";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
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

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> anyhow::Result<CreateMessageResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
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
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(LlmCallError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        serde_json::from_str::<CreateMessageResponse>(&text)
            .with_context(|| format!("failed to decode Anthropic response: {text}"))
    }

    /// One structured call: tool output first, text fallback with up to two
    /// repair rounds, then a diagnostic error carrying the last raw output.
    async fn request_structured<T>(
        &self,
        tool: Tool,
        system: String,
        user: String,
        decode_tool: impl Fn(serde_json::Value) -> anyhow::Result<T>,
        parse_text: impl Fn(&str) -> anyhow::Result<T>,
        repair: impl Fn(&str) -> String,
    ) -> anyhow::Result<T> {
        let make_req = |max_tokens: u32, content: String| CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(system.clone()),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: Some(vec![tool.clone()]),
            tool_choice: Some(ToolChoice::Tool { name: tool.name }),
        };

        let mut res = self
            .create_message(make_req(self.max_tokens, user.clone()))
            .await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                tool = tool.name,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            res = self.create_message(make_req(bumped, user.clone())).await?;
        }

        // Tool output path.
        if let Some(input) = Self::tool_input(&res, tool.name) {
            return decode_tool(input);
        }

        // Fallback to text (should be rare).
        let mut last_text = Self::response_text(&res);
        let mut last_err = match parse_text(&last_text) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        // Repair attempts: 2
        for attempt in 1..=2u32 {
            let repair_res = self
                .create_message(make_req(self.max_tokens, repair(&last_text)))
                .await?;
            if let Some(input) = Self::tool_input(&repair_res, tool.name) {
                return decode_tool(input);
            }
            let repair_text = Self::response_text(&repair_res);
            match parse_text(&repair_text) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    last_err = err;
                    last_text = repair_text;
                    tracing::warn!(
                        attempt,
                        tool = tool.name,
                        error = %last_err,
                        "LLM output still invalid after repair attempt"
                    );
                }
            }
        }

        Err(LlmCallError {
            provider: Provider::Anthropic,
            stage: "parse_after_repair",
            detail: format!("final_error={last_err}"),
            raw_output: Some(last_text),
        }
        .into())
    }

    fn analysis_tool() -> Tool {
        // Minimal JSON schema for the exact analysis contract.
        // Keep it strict and explicit to maximize compliance.
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["recommendation", "reasoning", "confidenceScore"],
            "properties": {
                "recommendation": {"type": "string", "enum": ["buy", "sell", "hold"]},
                "reasoning": {"type": "string"},
                "confidenceScore": {"type": "number", "minimum": 0, "maximum": 1}
            }
        });

        Tool {
            name: TOOL_NAME_EMIT_ANALYSIS,
            description: "Emit the final stock analysis as structured JSON",
            input_schema: schema,
        }
    }

    fn report_tool() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["reportDate", "recommendations"],
            "properties": {
                "reportDate": {"type": "string"},
                "recommendations": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["ticker", "recommendation", "reason"],
                        "properties": {
                            "ticker": {"type": "string"},
                            "recommendation": {"type": "string", "enum": ["Buy", "Sell", "Hold"]},
                            "reason": {"type": "string"}
                        }
                    }
                }
            }
        });

        Tool {
            name: TOOL_NAME_EMIT_REPORT,
            description: "Emit the daily recommendation report as structured JSON",
            input_schema: schema,
        }
    }

    fn analysis_system_prompt() -> String {
        // Keep strict and provider-agnostic: JSON only, no prose.
        [
            "You are an expert financial analyst for Indian equities.",
            "Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.",
            "No trailing commas. No comments. Use double quotes for all JSON strings.",
            "Output schema:",
            "{",
            "  \"recommendation\": \"buy|sell|hold\",",
            "  \"reasoning\": \"one short paragraph\",",
            "  \"confidenceScore\": 0.0",
            "}",
            "Rules:",
            "- recommendation must be exactly one of: buy, sell, hold",
            "- confidenceScore must be a number in [0, 1]",
            "- base the reasoning on the supplied headlines and figures only",
        ]
        .join("\n")
    }

    fn analysis_user_prompt(input: &AnalyzeInput) -> String {
        format!(
            "Task: Analyze {} and recommend buy, sell, or hold.\n\nRecent headlines JSON:\n{}\n\nFinancial data JSON:\n{}",
            input.ticker,
            input.headlines_json(),
            input.figures_json()
        )
    }

    fn analysis_repair_prompt(previous_output: &str) -> String {
        let schema = [
            "{",
            "  \"recommendation\": \"hold\",",
            "  \"reasoning\": \"one short paragraph\",",
            "  \"confidenceScore\": 0.5",
            "}",
        ]
        .join("\n");

        format!(
            "Your previous message was NOT valid JSON.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the schema and rules.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Use double quotes for all JSON strings.\n\
- recommendation MUST be exactly one of: buy, sell, hold.\n\
- confidenceScore MUST be a number in [0, 1].\n\n\
SCHEMA:\n{schema}\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}"
        )
    }

    fn report_system_prompt() -> String {
        [
            "You are an expert financial analyst writing a daily report for Indian stock market traders.",
            "Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.",
            "No trailing commas. No comments. Use double quotes for all JSON strings.",
            "Output schema:",
            "{",
            "  \"reportDate\": \"YYYY-MM-DD\",",
            "  \"recommendations\": [",
            "    {",
            "      \"ticker\": \"RELIANCE.NS\",",
            "      \"recommendation\": \"Buy\",",
            "      \"reason\": \"one sentence\"",
            "    }",
            "  ]",
            "}",
            "Rules:",
            "- recommendation must be exactly one of: Buy, Sell, Hold",
            "- cover every ticker in the supplied stock data exactly once",
            "- base each reason on the supplied quotes and headlines only",
        ]
        .join("\n")
    }

    fn report_user_prompt(input: &ReportInput) -> String {
        format!(
            "Task: Produce the daily recommendation report for reportDate={}.\n\nStock data JSON:\n{}",
            input.report_date, input.stock_data
        )
    }

    fn report_repair_prompt(previous_output: &str, expected_report_date: chrono::NaiveDate) -> String {
        let schema = [
            "{",
            "  \"reportDate\": \"YYYY-MM-DD\",",
            "  \"recommendations\": [",
            "    {",
            "      \"ticker\": \"RELIANCE.NS\",",
            "      \"recommendation\": \"Buy\",",
            "      \"reason\": \"one sentence\"",
            "    }",
            "  ]",
            "}",
        ]
        .join("\n");

        format!(
            "Your previous message was NOT valid JSON.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the schema and rules.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- The JSON MUST have reportDate=\"{expected_report_date}\".\n\
- recommendation MUST be exactly one of: Buy, Sell, Hold.\n\
- Each entry MUST include keys: ticker, recommendation, reason.\n\n\
SCHEMA:\n{schema}\n\n\
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

    fn tool_input(res: &CreateMessageResponse, tool_name: &str) -> Option<serde_json::Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input } if name == tool_name => Some(input.clone()),
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn analyze_stock(&self, input: AnalyzeInput) -> anyhow::Result<StockAnalysis> {
        self.request_structured(
            Self::analysis_tool(),
            Self::analysis_system_prompt(),
            Self::analysis_user_prompt(&input),
            |value| {
                serde_json::from_value::<LlmStockAnalysis>(value)
                    .context("failed to decode tool_use.input into LlmStockAnalysis")?
                    .validate_and_into_analysis()
            },
            json::parse_analysis,
            Self::analysis_repair_prompt,
        )
        .await
    }

    async fn generate_daily_report(&self, input: ReportInput) -> anyhow::Result<DailyReport> {
        let generated_at = Utc::now();
        let report_date = input.report_date;
        let universe = input.universe.clone();

        self.request_structured(
            Self::report_tool(),
            Self::report_system_prompt(),
            Self::report_user_prompt(&input),
            |value| {
                serde_json::from_value::<LlmDailyReport>(value)
                    .context("failed to decode tool_use.input into LlmDailyReport")?
                    .validate_and_into_report(report_date, &universe, generated_at)
            },
            |text| json::parse_report(text, report_date, &universe, generated_at),
            |previous| Self::report_repair_prompt(previous, report_date),
        )
        .await
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
    content: String,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::Recommendation;
    use serde_json::json;

    #[test]
    fn tool_input_matches_on_tool_name() {
        let res = CreateMessageResponse {
            content: vec![
                ContentBlock::ToolUse {
                    name: "other_tool".to_string(),
                    input: json!({"x": 1}),
                },
                ContentBlock::ToolUse {
                    name: TOOL_NAME_EMIT_ANALYSIS.to_string(),
                    input: json!({
                        "recommendation": "buy",
                        "reasoning": "Solid quarter, price trending up.",
                        "confidenceScore": 0.8,
                    }),
                },
            ],
            stop_reason: None,
        };

        let input = AnthropicClient::tool_input(&res, TOOL_NAME_EMIT_ANALYSIS).unwrap();
        let analysis = serde_json::from_value::<LlmStockAnalysis>(input)
            .unwrap()
            .validate_and_into_analysis()
            .unwrap();
        assert_eq!(analysis.recommendation, Recommendation::Buy);
        assert_eq!(analysis.confidence_score, 0.8);

        assert!(AnthropicClient::tool_input(&res, TOOL_NAME_EMIT_REPORT).is_none());
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "thinking", "thinking": "ignored"},
                {"type": "text", "text": "second"},
            ],
            "stop_reason": "end_turn",
        }))
        .unwrap();

        assert_eq!(AnthropicClient::response_text(&res), "first\nsecond");
    }

    #[test]
    fn unknown_content_blocks_deserialize_without_error() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "redacted_thinking", "data": "x"})).unwrap();
        assert!(matches!(block, ContentBlock::Unknown));
    }

    #[test]
    fn tool_choice_serializes_as_tagged_tool() {
        let req = CreateMessageRequest {
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 64,
            system: None,
            messages: vec![Message {
                role: "user",
                content: "hi".to_string(),
            }],
            tools: Some(vec![AnthropicClient::analysis_tool()]),
            tool_choice: Some(ToolChoice::Tool {
                name: TOOL_NAME_EMIT_ANALYSIS,
            }),
        };

        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["tool_choice"]["type"], "tool");
        assert_eq!(v["tool_choice"]["name"], "emit_analysis");
        assert!(v.get("system").is_none());
        assert_eq!(v["tools"][0]["input_schema"]["type"], "object");
    }
}
