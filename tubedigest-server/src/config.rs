//! Secret resolution for tubedigest-server
//!
//! API keys resolve Database → ENV → TOML. The database is authoritative so
//! keys entered through the settings API survive restarts; ENV and TOML seed
//! a fresh install. Resolved keys live in [`SharedSecret`] cells that clients
//! read per request, so a key updated at runtime takes effect immediately.

use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tubedigest_common::config::TomlConfig;
use tubedigest_common::{Error, Result};

/// The API keys the service knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    YouTube,
    Llm,
    Vault,
}

impl SecretKind {
    pub const ALL: [SecretKind; 3] = [SecretKind::YouTube, SecretKind::Llm, SecretKind::Vault];

    /// Key in the `settings` table and the settings API
    pub fn setting_key(&self) -> &'static str {
        match self {
            SecretKind::YouTube => "youtube_api_key",
            SecretKind::Llm => "llm_api_key",
            SecretKind::Vault => "vault_api_key",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            SecretKind::YouTube => "TUBEDIGEST_YOUTUBE_API_KEY",
            SecretKind::Llm => "TUBEDIGEST_LLM_API_KEY",
            SecretKind::Vault => "TUBEDIGEST_VAULT_API_KEY",
        }
    }

    pub fn from_setting_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.setting_key() == key)
    }

    fn display_name(&self) -> &'static str {
        match self {
            SecretKind::YouTube => "YouTube API key",
            SecretKind::Llm => "LLM API key",
            SecretKind::Vault => "Vault API key",
        }
    }

    fn toml_value<'a>(&self, config: &'a TomlConfig) -> Option<&'a String> {
        match self {
            SecretKind::YouTube => config.youtube_api_key.as_ref(),
            SecretKind::Llm => config.llm.api_key.as_ref(),
            SecretKind::Vault => config.vault.api_key.as_ref(),
        }
    }

    fn set_toml_value(&self, config: &mut TomlConfig, value: String) {
        match self {
            SecretKind::YouTube => config.youtube_api_key = Some(value),
            SecretKind::Llm => config.llm.api_key = Some(value),
            SecretKind::Vault => config.vault.api_key = Some(value),
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one secret from the three tiers
///
/// Returns `None` when no tier has a valid key; the service still starts and
/// the affected client reports the missing key when used.
pub async fn resolve_secret(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
    kind: SecretKind,
) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_setting::<String>(db, kind.setting_key())
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(kind.env_var()).ok().filter(|k| is_valid_key(k));
    let toml_key = kind
        .toml_value(toml_config)
        .filter(|k| is_valid_key(k))
        .cloned();

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            kind.display_name(),
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("{} loaded from database", kind.display_name());
        return Ok(Some(key));
    }
    if let Some(key) = env_key {
        info!("{} loaded from environment variable", kind.display_name());
        return Ok(Some(key));
    }
    if let Some(key) = toml_key {
        info!("{} loaded from TOML config", kind.display_name());
        return Ok(Some(key));
    }

    warn!(
        "{} not configured. Set it with PUT /api/settings/{}, {}, or in the TOML config.",
        kind.display_name(),
        kind.setting_key(),
        kind.env_var()
    );
    Ok(None)
}

/// Write one secret back to the TOML file (best-effort)
///
/// The database write has already succeeded; a TOML failure only logs.
pub fn sync_secret_to_toml(kind: SecretKind, value: &str, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        tubedigest_common::config::load_toml_config(toml_path)?
    } else {
        TomlConfig::default()
    };

    kind.set_toml_value(&mut config, value.to_string());

    match tubedigest_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("{} synced to TOML: {}", kind.display_name(), toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(())
        }
    }
}

/// Runtime-updatable secret shared between the settings API and a client
#[derive(Clone, Default)]
pub struct SharedSecret(Arc<RwLock<Option<String>>>);

impl SharedSecret {
    pub fn new(value: Option<String>) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    pub async fn set(&self, value: Option<String>) {
        *self.0.write().await = value.filter(|v| is_valid_key(v));
    }

    pub async fn is_set(&self) -> bool {
        self.0.read().await.is_some()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// All service secrets
#[derive(Clone, Default, Debug)]
pub struct RuntimeSecrets {
    pub youtube: SharedSecret,
    pub llm: SharedSecret,
    pub vault: SharedSecret,
}

impl RuntimeSecrets {
    /// Resolve every secret at startup
    pub async fn load(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<Self> {
        Ok(Self {
            youtube: SharedSecret::new(resolve_secret(db, toml_config, SecretKind::YouTube).await?),
            llm: SharedSecret::new(resolve_secret(db, toml_config, SecretKind::Llm).await?),
            vault: SharedSecret::new(resolve_secret(db, toml_config, SecretKind::Vault).await?),
        })
    }

    pub fn get(&self, kind: SecretKind) -> &SharedSecret {
        match kind {
            SecretKind::YouTube => &self.youtube,
            SecretKind::Llm => &self.llm,
            SecretKind::Vault => &self.vault,
        }
    }
}

/// Store a secret in the database and its shared cell
pub async fn update_secret(
    db: &Pool<Sqlite>,
    secrets: &RuntimeSecrets,
    kind: SecretKind,
    value: String,
) -> Result<()> {
    if !is_valid_key(&value) {
        return Err(Error::InvalidInput(format!(
            "{} cannot be blank",
            kind.display_name()
        )));
    }
    crate::db::settings::set_setting(db, kind.setting_key(), value.clone()).await?;
    secrets.get(kind).set(Some(value)).await;
    info!("{} updated", kind.display_name());
    Ok(())
}
