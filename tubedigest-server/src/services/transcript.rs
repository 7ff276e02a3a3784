//! Video transcripts from YouTube's timed-text endpoint
//!
//! Transcripts are best-effort context for the summarizer: a video without
//! captions still gets summarized from its title and description.

use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub const TIMEDTEXT_BASE_URL: &str = "https://www.youtube.com/api/timedtext";
const USER_AGENT: &str = concat!("TubeDigest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}")]
    ApiError(u16),
}

/// Source of video transcripts
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Timestamped transcript text, `None` when the video has no captions
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, TranscriptError>;
}

/// Timed-text client trying each configured language in order
pub struct TimedTextClient {
    http_client: reqwest::Client,
    base_url: String,
    languages: Vec<String>,
}

impl TimedTextClient {
    pub fn new(languages: Vec<String>) -> Result<Self, TranscriptError> {
        Self::with_base_url(TIMEDTEXT_BASE_URL, languages)
    }

    pub fn with_base_url(base_url: &str, languages: Vec<String>) -> Result<Self, TranscriptError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TranscriptError::NetworkError(e.to_string()))?;

        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages
        };

        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            languages,
        })
    }

    async fn fetch_language(&self, video_id: &str, lang: &str) -> Result<Option<String>, TranscriptError> {
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("lang", lang), ("v", video_id)])
            .send()
            .await
            .map_err(|e| TranscriptError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TranscriptError::ApiError(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranscriptError::NetworkError(e.to_string()))?;

        Ok(parse_timedtext(&body))
    }
}

#[async_trait]
impl TranscriptSource for TimedTextClient {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Option<String>, TranscriptError> {
        for lang in &self.languages {
            if let Some(transcript) = self.fetch_language(video_id, lang).await? {
                tracing::debug!(
                    video_id = %video_id,
                    lang = %lang,
                    chars = transcript.len(),
                    "Fetched transcript"
                );
                return Ok(Some(transcript));
            }
        }

        tracing::debug!(video_id = %video_id, "No transcript available");
        Ok(None)
    }
}

fn text_element() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<text\b[^>]*?\bstart="([0-9.]+)"[^>]*>(.*?)</text>"#)
            .expect("timedtext pattern is valid")
    })
}

fn entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|amp|lt|gt|quot|apos);").expect("entity pattern is valid")
    })
}

fn decode_once(text: &str) -> String {
    entity()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let number = &name[1..];
                    let code = if let Some(hex) = number.strip_prefix(['x', 'X']) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        number.parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

/// Decode XML/HTML entities; timed text escapes caption text twice
pub fn decode_entities(text: &str) -> String {
    decode_once(&decode_once(text))
}

fn format_offset(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("[{}:{:02}:{:02}]", hours, minutes, secs)
    } else {
        format!("[{:02}:{:02}]", minutes, secs)
    }
}

/// Convert a timed-text XML document into `[mm:ss] text` lines
///
/// Returns `None` when the document has no caption text.
pub fn parse_timedtext(xml: &str) -> Option<String> {
    let lines: Vec<String> = text_element()
        .captures_iter(xml)
        .filter_map(|caps| {
            let start: f64 = caps[1].parse().ok()?;
            let text = decode_entities(&caps[2]);
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then(|| format!("{} {}", format_offset(start), text))
        })
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}
