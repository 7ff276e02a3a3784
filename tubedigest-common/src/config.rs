//! Configuration loading and data folder resolution
//!
//! Two tiers, as in every TubeDigest binary:
//! 1. **TOML bootstrap** (`tubedigest.toml`): data folder, listen address,
//!    logging, external service endpoints. Missing or unreadable files never
//!    stop startup; defaults are used and a warning is logged.
//! 2. **Database runtime**: secrets and settings stored in the `settings`
//!    table take priority over environment and TOML (resolved by the server).
//!
//! Data folder priority: CLI argument → `TUBEDIGEST_DATA_FOLDER` → TOML
//! `data_folder` → OS-dependent compiled default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "TUBEDIGEST_DATA_FOLDER";

/// Environment variable overriding the TOML config path
pub const CONFIG_PATH_ENV: &str = "TUBEDIGEST_CONFIG";

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "tubedigest.db";

/// Default HTTP port for tubedigest-server
pub const DEFAULT_PORT: u16 = 5780;

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            log_level: "info".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    pub data_folder: Option<PathBuf>,
    /// Listen address (optional, default 127.0.0.1)
    pub bind_address: Option<String>,
    /// HTTP port (optional, default 5780)
    pub port: Option<u16>,
    /// YouTube Data API key (lowest-priority source)
    pub youtube_api_key: Option<String>,
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub vault: VaultConfig,
    pub polling: PollingConfig,
    pub summaries: SummariesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Summarization endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Transcript text beyond this many characters is cut before prompting
    pub max_transcript_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_transcript_chars: 30_000,
        }
    }
}

/// Note vault REST endpoint; export falls back to downloads when unset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Folder inside the vault receiving exported notes
    pub folder: String,
    /// Local vault plugins usually serve a self-signed certificate
    pub accept_invalid_certs: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            folder: "YouTube".to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// Background video polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub enabled: bool,
    /// Sweep period; each channel is polled according to its own frequency tag
    pub interval_seconds: u64,
    /// Submit newly discovered videos for summarization
    pub auto_summarize: bool,
    /// Uploads fetched per channel per poll
    pub max_results: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            auto_summarize: false,
            max_results: 10,
        }
    }
}

/// Summary generation tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummariesConfig {
    /// Upper bound on concurrently running summaries in a bulk request
    pub max_concurrent: usize,
    /// Transcript languages tried in order
    pub transcript_languages: Vec<String>,
    /// Finished tasks are evicted from the registry after this long
    pub task_ttl_seconds: u64,
}

impl Default for SummariesConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            transcript_languages: vec!["en".to_string()],
            task_ttl_seconds: 600,
        }
    }
}

impl SummariesConfig {
    /// Age after which finished tasks are evicted; saturates for huge values
    pub fn task_ttl(&self) -> chrono::Duration {
        i64::try_from(self.task_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Default TOML location: `<config dir>/tubedigest/tubedigest.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tubedigest").join("tubedigest.toml"))
}

/// Resolve the TOML path: CLI argument → `TUBEDIGEST_CONFIG` → platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load TOML config, falling back to defaults when missing or invalid
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        warn!("No config directory available on this platform, using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} - using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    // File may hold API keys
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Data folder resolution following CLI → ENV → TOML → default
#[derive(Debug, Clone)]
pub struct DataFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.data_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Data folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Data folder from {}: {}", DATA_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!(module = %self.module_name, "Data folder from TOML: {}", path.display());
            return path.clone();
        }

        CompiledDefaults::for_current_platform().data_folder
    }
}

/// Creates the data folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.data_folder.exists() {
            std::fs::create_dir_all(&self.data_folder)?;
            info!("Created data folder: {}", self.data_folder.display());
        }
        if !self.data_folder.is_dir() {
            return Err(Error::Config(format!(
                "Data folder path is not a directory: {}",
                self.data_folder.display()
            )));
        }
        Ok(())
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join(DATABASE_FILE_NAME)
    }
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tubedigest"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tubedigest"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tubedigest"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tubedigest"))
    } else {
        // ~/.local/share/tubedigest
        dirs::data_local_dir()
            .map(|d| d.join("tubedigest"))
            .unwrap_or_else(|| PathBuf::from("./tubedigest_data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults_fill_missing_sections() {
        let config: TomlConfig = toml::from_str("port = 6000\n").unwrap();
        assert_eq!(config.port, Some(6000));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.vault.folder, "YouTube");
        assert!(config.vault.base_url.is_none());
        assert_eq!(config.polling.interval_seconds, 300);
        assert_eq!(config.summaries.transcript_languages, vec!["en".to_string()]);
    }

    #[test]
    fn test_nested_sections_parse() {
        let config: TomlConfig = toml::from_str(
            r#"
            youtube_api_key = "yt-key"

            [llm]
            model = "gpt-4.1"
            max_transcript_chars = 1000

            [vault]
            base_url = "https://127.0.0.1:27124"
            folder = "Notes/YouTube"

            [summaries]
            max_concurrent = 5
            transcript_languages = ["ko", "en"]
            "#,
        )
        .unwrap();

        assert_eq!(config.youtube_api_key.as_deref(), Some("yt-key"));
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.max_transcript_chars, 1000);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.vault.base_url.as_deref(), Some("https://127.0.0.1:27124"));
        assert_eq!(config.vault.folder, "Notes/YouTube");
        assert_eq!(config.summaries.max_concurrent, 5);
        assert_eq!(config.summaries.transcript_languages, vec!["ko", "en"]);
    }

    #[test]
    fn test_database_path_is_inside_data_folder() {
        let initializer = DataFolderInitializer::new(PathBuf::from("/tmp/td"));
        assert_eq!(initializer.database_path(), PathBuf::from("/tmp/td/tubedigest.db"));
    }

    #[test]
    fn test_task_ttl_saturates() {
        let config = SummariesConfig {
            task_ttl_seconds: 90,
            ..SummariesConfig::default()
        };
        assert_eq!(config.task_ttl(), chrono::Duration::seconds(90));

        for huge in [u64::MAX, i64::MAX as u64] {
            let config = SummariesConfig {
                task_ttl_seconds: huge,
                ..SummariesConfig::default()
            };
            assert_eq!(config.task_ttl(), chrono::Duration::MAX);
        }
    }
}
