use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::prompt::build_prompt;
use super::traits::{AnalysisRequest, AnalysisResult, Analyzer, AnalyzerInfo};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::model::{TranslationItem, ensure_unique_ids};

/// Gemini `generateContent` analyzer.
///
/// Sends the page image inline with the prompt and asks for a JSON array
/// matching [`TranslationItem`].
pub struct GeminiAnalyzer {
    client: Client,
    /// Base URL for the API (e.g., "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,
    /// Number of attempts per page
    pub retry_count: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// What to do after one attempt
enum Attempt {
    Done(AnalysisResult),
    Retry(AnalysisError, Option<Duration>),
}

impl GeminiAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AnalysisError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            retry_count: config.retry_count.max(1),
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    fn endpoint(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base.trim_end_matches('/'),
            model,
            urlencoding::encode(api_key)
        )
    }

    fn build_request(request: &AnalysisRequest) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.mime_type.clone(),
                            data: BASE64.encode(&request.image),
                        },
                    },
                    Part::Text {
                        text: build_prompt(&request.settings),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }

    async fn attempt(&self, url: &str, body: &GenerateRequest) -> Attempt {
        let response = match self.client.post(url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request failed: {}", e);
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                return Attempt::Retry(AnalysisError::Transport(reason), None);
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!("Rate limited, retry after {:?}s", retry_after);
            return Attempt::Retry(
                AnalysisError::Transport("rate limited".to_string()),
                Some(Duration::from_secs(retry_after.unwrap_or(5))),
            );
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("API error: {} - {}", status, body);
            let err = AnalysisError::Transport(format!("HTTP {status}: {body}"));
            return if status.is_server_error() {
                Attempt::Retry(err, None)
            } else {
                Attempt::Done(Err(err))
            };
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => Attempt::Done(parse_items(parsed.first_text())),
            Err(e) => Attempt::Done(Err(AnalysisError::MalformedResponse(e.to_string()))),
        }
    }
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
    }
}

#[async_trait]
impl Analyzer for GeminiAnalyzer {
    fn info(&self) -> AnalyzerInfo {
        AnalyzerInfo {
            name: "Gemini",
            requires_api_key: true,
        }
    }

    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        let Some(api_key) = request.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Err(AnalysisError::MissingCredential);
        };

        let url = self.endpoint(&request.settings.model, api_key);
        let body = Self::build_request(request);
        info!(
            "Analyzing {} byte {} image with {}",
            request.image.len(),
            request.mime_type,
            request.settings.model
        );

        let mut last_error = None;

        for attempt in 0..self.retry_count {
            debug!("Analysis attempt {}/{}", attempt + 1, self.retry_count);

            match self.attempt(&url, &body).await {
                Attempt::Done(result) => return result,
                Attempt::Retry(err, wait) => {
                    last_error = Some(err);
                    // Wait before retry
                    if attempt + 1 < self.retry_count {
                        let wait = wait.unwrap_or(Duration::from_millis(self.retry_delay_ms));
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        error!("Analysis failed after {} attempts", self.retry_count);
        Err(last_error.unwrap_or_else(|| AnalysisError::Transport("no attempts made".to_string())))
    }
}

/// Parse the model's text into items. No text means no items.
pub fn parse_items(text: Option<&str>) -> AnalysisResult {
    let Some(text) = text.map(strip_code_fence).filter(|t| !t.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut items: Vec<TranslationItem> =
        serde_json::from_str(text).map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let renumbered = ensure_unique_ids(&mut items)
        .ok_or_else(|| AnalysisError::MalformedResponse("item ids cannot be made unique".to_string()))?;
    if renumbered > 0 {
        warn!("Renumbered {} duplicate item ids", renumbered);
    }
    Ok(items)
}

/// Models sometimes wrap JSON in a markdown fence despite the MIME type.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "INTEGER", "description": "Unique ID starting from 1" },
                "originalText": { "type": "STRING", "description": "Original text detected" },
                "translatedText": { "type": "STRING", "description": "Persian translation" },
                "type": {
                    "type": "STRING",
                    "enum": ["BUBBLE", "THOUGHT", "SFX", "NARRATION", "OTHER"]
                },
                "tone": {
                    "type": "STRING",
                    "enum": ["CASUAL", "FORMAL", "ANGRY", "SCARED"]
                },
                "notes": { "type": "STRING", "description": "Why this tone or wording was chosen" }
            },
            "required": ["id", "originalText", "translatedText", "type", "tone"]
        }
    })
}
