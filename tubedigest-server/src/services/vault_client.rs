//! Note vault export client
//!
//! Pushes Markdown notes into a vault served over a local REST API
//! (Obsidian Local REST API style): `PUT {base}/vault/{path}` creates or
//! replaces a note. Some vault servers only accept POST for new files, so a
//! failed PUT is retried once as POST.

use std::time::Duration;
use thiserror::Error;
use tubedigest_common::config::VaultConfig;

use crate::config::SharedSecret;

const USER_AGENT: &str = concat!("TubeDigest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Vault rejected note (PUT: {put}; POST: {post})")]
    Rejected { put: String, post: String },
}

/// Vault REST client
pub struct VaultClient {
    http_client: reqwest::Client,
    base_url: String,
    folder: String,
    api_key: SharedSecret,
}

impl VaultClient {
    /// Client for a configured vault, `None` when no base URL is set
    pub fn from_config(config: &VaultConfig, api_key: SharedSecret) -> Result<Option<Self>, VaultError> {
        match config.base_url.as_deref().map(str::trim) {
            Some(base_url) if !base_url.is_empty() => Ok(Some(Self::new(
                base_url,
                &config.folder,
                config.accept_invalid_certs,
                api_key,
            )?)),
            _ => Ok(None),
        }
    }

    pub fn new(
        base_url: &str,
        folder: &str,
        accept_invalid_certs: bool,
        api_key: SharedSecret,
    ) -> Result<Self, VaultError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| VaultError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            folder: folder.trim_matches('/').to_string(),
            api_key,
        })
    }

    /// Vault-relative path of a note
    pub fn note_path(&self, subfolder: &str, file_name: &str) -> String {
        [self.folder.as_str(), subfolder.trim_matches('/'), file_name]
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    fn note_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/vault/{}", self.base_url, encoded.join("/"))
    }

    async fn send(&self, method: reqwest::Method, url: &str, markdown: &str) -> Result<(), String> {
        let mut request = self
            .http_client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "text/markdown")
            .body(markdown.to_string());

        if let Some(key) = self.api_key.get().await {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("{} {}", status.as_u16(), body.trim()))
        }
    }

    /// Write a note; returns its vault-relative path
    pub async fn push_note(&self, subfolder: &str, file_name: &str, markdown: &str) -> Result<String, VaultError> {
        let path = self.note_path(subfolder, file_name);
        let url = self.note_url(&path);

        let put_error = match self.send(reqwest::Method::PUT, &url, markdown).await {
            Ok(()) => {
                tracing::info!(path = %path, "Note pushed to vault");
                return Ok(path);
            }
            Err(e) => e,
        };

        tracing::warn!(path = %path, error = %put_error, "Vault PUT failed, retrying with POST");

        match self.send(reqwest::Method::POST, &url, markdown).await {
            Ok(()) => {
                tracing::info!(path = %path, "Note posted to vault");
                Ok(path)
            }
            Err(post_error) => Err(VaultError::Rejected {
                put: put_error,
                post: post_error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VaultClient {
        VaultClient::new("https://127.0.0.1:27124/", "/YouTube/", false, SharedSecret::default()).unwrap()
    }

    #[test]
    fn test_note_path_joins_segments() {
        let c = client();
        assert_eq!(c.note_path("Rust Talks", "2024-05-01 Intro.md"), "YouTube/Rust Talks/2024-05-01 Intro.md");
        assert_eq!(c.note_path("", "a.md"), "YouTube/a.md");
    }

    #[test]
    fn test_note_url_encodes_segments() {
        let c = client();
        assert_eq!(
            c.note_url("YouTube/Rust Talks/a b.md"),
            "https://127.0.0.1:27124/vault/YouTube/Rust%20Talks/a%20b.md"
        );
    }

    #[test]
    fn test_from_config_without_base_url() {
        let config = VaultConfig::default();
        assert!(VaultClient::from_config(&config, SharedSecret::default())
            .unwrap()
            .is_none());

        let config = VaultConfig {
            base_url: Some("   ".to_string()),
            ..VaultConfig::default()
        };
        assert!(VaultClient::from_config(&config, SharedSecret::default())
            .unwrap()
            .is_none());
    }
}
