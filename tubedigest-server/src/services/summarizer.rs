//! LLM summarization client
//!
//! Talks to any OpenAI-compatible chat-completions endpoint. The model is
//! asked for a single JSON object; anything it returns that does not parse
//! still becomes a (minimal) summary rather than an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tubedigest_common::config::LlmConfig;

use crate::config::SharedSecret;
use crate::models::SummaryDraft;

const USER_AGENT: &str = concat!("TubeDigest/", env!("CARGO_PKG_VERSION"));

const SYSTEM_PROMPT: &str = "You summarize YouTube videos for a personal knowledge base. \
Reply with exactly one JSON object and nothing else.";

const RESPONSE_SHAPE: &str = r#"{
  "title": "short descriptive title",
  "coreTheme": "one sentence on what the video is about",
  "content": "summary in a few paragraphs",
  "sections": [{"title": "...", "timestamp": "mm:ss", "content": "...", "keyWords": ["..."]}],
  "keyPoints": ["..."],
  "insights": ["..."],
  "tags": ["..."]
}"#;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("LLM API key not configured")]
    MissingApiKey,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Input for one summary
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub title: String,
    pub description: String,
    pub transcript: Option<String>,
}

/// Produces structured summaries
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Recorded on every summary
    fn model_name(&self) -> String;

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completions client
pub struct LlmClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    max_transcript_chars: usize,
    api_key: SharedSecret,
}

impl LlmClient {
    pub fn new(config: &LlmConfig, api_key: SharedSecret) -> Result<Self, SummarizeError> {
        // Long transcripts take a while to summarize
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| SummarizeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_transcript_chars: config.max_transcript_chars,
            api_key,
        })
    }
}

#[async_trait]
impl Summarizer for LlmClient {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryDraft, SummarizeError> {
        let key = self.api_key.get().await.ok_or(SummarizeError::MissingApiKey)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(request, self.max_transcript_chars),
                },
            ],
            temperature: 0.3,
        };

        tracing::debug!(model = %self.model, title = %request.title, "Requesting summary");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SummarizeError::ApiError(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::ParseError(e.to_string()))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(SummarizeError::EmptyResponse)?;

        Ok(parse_summary_text(&text, &request.title))
    }
}

/// Prompt text for one video
pub fn build_prompt(request: &SummaryRequest, max_transcript_chars: usize) -> String {
    let mut prompt = format!(
        "Summarize this YouTube video.\n\nTitle: {}\n\nDescription:\n{}\n",
        request.title,
        request.description.trim()
    );

    match request.transcript.as_deref() {
        Some(transcript) => {
            let truncated: String = transcript.chars().take(max_transcript_chars).collect();
            prompt.push_str("\nTranscript (lines prefixed with [mm:ss]):\n");
            prompt.push_str(&truncated);
            if truncated.len() < transcript.len() {
                prompt.push_str("\n[transcript truncated]");
            }
            prompt.push('\n');
        }
        None => prompt.push_str("\nNo transcript is available; rely on the title and description.\n"),
    }

    prompt.push_str("\nRespond with JSON of this shape:\n");
    prompt.push_str(RESPONSE_SHAPE);
    prompt
}

/// Outermost `{...}` of a reply, skipping code fences and chatter
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse model output into a draft, degrading to a minimal draft
pub fn parse_summary_text(raw: &str, fallback_title: &str) -> SummaryDraft {
    let parsed = extract_json_object(raw)
        .and_then(|json| serde_json::from_str::<SummaryDraft>(json).ok())
        .filter(|draft| !draft.is_empty());

    match parsed {
        Some(mut draft) => {
            if draft.title.trim().is_empty() {
                draft.title = fallback_title.to_string();
            }
            draft
        }
        None => {
            tracing::warn!(
                title = %fallback_title,
                "Summary response was not valid JSON; keeping raw text"
            );
            SummaryDraft::minimal(fallback_title, strip_code_fence(raw))
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map_or("", |(_, body)| body);
            body.trim_end().trim_end_matches("```")
        }
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(transcript: Option<&str>) -> SummaryRequest {
        SummaryRequest {
            title: "Video".to_string(),
            description: "About things".to_string(),
            transcript: transcript.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "Here you go:\n```json\n{\"title\": \"T\", \"content\": \"body\", \"tags\": [\"a\"]}\n```";
        let draft = parse_summary_text(raw, "Fallback");
        assert_eq!(draft.title, "T");
        assert_eq!(draft.content, "body");
        assert_eq!(draft.tags, vec!["a".to_string()]);
    }

    #[test]
    fn test_parse_nested_objects_use_outermost_braces() {
        let raw = r#"{"content": "c", "sections": [{"title": "s", "content": "x", "keyWords": []}]}"#;
        let draft = parse_summary_text(raw, "Fallback");
        assert_eq!(draft.title, "Fallback");
        assert_eq!(draft.sections.len(), 1);
    }

    #[test]
    fn test_invalid_json_degrades_to_minimal() {
        let draft = parse_summary_text("The video explains {broken json", "My Video");
        assert_eq!(draft.title, "My Video");
        assert_eq!(draft.content, "The video explains {broken json");
        assert!(draft.sections.is_empty());
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn test_empty_object_degrades_to_minimal() {
        let draft = parse_summary_text("```\n{}\n```", "My Video");
        assert_eq!(draft.title, "My Video");
        assert_eq!(draft.content, "{}");
    }

    #[test]
    fn test_prompt_truncates_transcript() {
        let prompt = build_prompt(&request(Some("abcdefghij")), 4);
        assert!(prompt.contains("abcd\n[transcript truncated]"));
        assert!(!prompt.contains("abcde"));
        assert!(prompt.contains("\"coreTheme\""));
    }

    #[test]
    fn test_prompt_without_transcript() {
        let prompt = build_prompt(&request(None), 100);
        assert!(prompt.contains("No transcript is available"));
        assert!(prompt.contains("Title: Video"));
    }
}
