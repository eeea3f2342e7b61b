//! Configuration for the taskpilot server.
//!
//! Values come from an optional TOML file and are then overlaid with
//! environment variables (a `.env` file in the working directory is loaded
//! first). Every section has working defaults, so an empty file and an
//! empty environment give an embedded-SQLite server on port 8000 with the
//! agent disabled.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Log every request, not just slow ones.
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relational store selection.
///
/// When both `supabase_url` and `supabase_key` are set the PostgREST store
/// is used; otherwise tasks live in a local SQLite file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file (None = `data_dir()/taskpilot.db`).
    pub database_path: Option<PathBuf>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl StoreConfig {
    /// PostgREST endpoint and key, when both are configured.
    pub fn postgrest(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }

    pub fn effective_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("taskpilot.db"))
    }
}

/// Semantic index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    /// Vector database file (None = `data_dir()/index.db`).
    pub path: Option<PathBuf>,
    /// Key for the hosted embeddings API. Without one a local hashing
    /// embedder is used.
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_base_url: Option<String>,
    pub dim: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            embedding_api_key: None,
            embedding_model: "text-embedding-3-small".into(),
            embedding_base_url: None,
            dim: crate::index::embedding::DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl IndexConfig {
    pub fn effective_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("index.db"))
    }
}

/// Language model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Preferred provider: `gemini`, `openai` or `anthropic`.
    pub provider: String,
    /// Model override; applies only to the provider family it names.
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: None,
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 60,
            gemini_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_base_url: None,
            openai_base_url: None,
            anthropic_base_url: None,
        }
    }
}

impl LlmConfig {
    pub fn has_credentials(&self) -> bool {
        [
            &self.gemini_api_key,
            &self.openai_api_key,
            &self.anthropic_api_key,
        ]
        .iter()
        .any(|k| k.as_deref().is_some_and(|k| !k.trim().is_empty()))
    }
}

/// Reminder poller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub check_interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: 5,
        }
    }
}

/// Longest poll interval honoured; larger settings are clamped.
const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        let minutes = self
            .check_interval_minutes
            .clamp(1, MAX_CHECK_INTERVAL_MINUTES);
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Also write daily-rolling log files here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "taskpilot=info".into(),
            directory: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Defaults, or the file at `path`, overlaid with the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "could not read .env file");
            }
        }
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from `lookup` (normally the process environment).
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when a numeric or boolean variable does
    /// not parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = get("DEBUG") {
            self.server.debug = parse_bool("DEBUG", &v)?;
        }

        if let Some(v) = get("DATABASE_PATH") {
            self.store.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SUPABASE_URL") {
            self.store.supabase_url = Some(v);
        }
        if let Some(v) = get("SUPABASE_KEY") {
            self.store.supabase_key = Some(v);
        }

        if let Some(v) = get("INDEX_ENABLED") {
            self.index.enabled = parse_bool("INDEX_ENABLED", &v)?;
        }
        if let Some(v) = get("INDEX_PATH") {
            self.index.path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("EMBEDDING_API_KEY") {
            self.index.embedding_api_key = Some(v);
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            self.index.embedding_model = v;
        }

        if let Some(v) = get("LLM_PROVIDER") {
            self.llm.provider = v.to_lowercase();
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("LLM_TEMPERATURE") {
            self.llm.temperature = parse_var("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(v);
        }

        if let Some(v) = get("SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_bool("SCHEDULER_ENABLED", &v)?;
        }
        if let Some(v) = get("REMINDER_CHECK_INTERVAL_MINUTES") {
            self.scheduler.check_interval_minutes =
                parse_var("REMINDER_CHECK_INTERVAL_MINUTES", &v)?;
        }

        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("LOG_DIR") {
            self.logging.directory = Some(PathBuf::from(v));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::Config(format!("{key}={raw:?}: {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!("{key}={raw:?}: expected a boolean"))),
    }
}

/// Application data directory.
///
/// Resolves to `dirs::data_dir()/taskpilot/`. Override with the
/// `TASKPILOT_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TASKPILOT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("taskpilot"))
        .unwrap_or_else(|| PathBuf::from("/tmp/taskpilot-data"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.llm.provider, "gemini");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(300));
        assert!(config.store.postgrest().is_none());
        assert!(!config.llm.has_credentials());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            [llm]
            provider = "openai"
            "#,
        )
        .unwrap();
        config
            .apply_env(env(&[
                ("PORT", "8080"),
                ("LLM_PROVIDER", "Anthropic"),
                ("ANTHROPIC_API_KEY", "sk-ant"),
                ("REMINDER_CHECK_INTERVAL_MINUTES", "1"),
                ("SCHEDULER_ENABLED", "false"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.provider, "anthropic");
        assert!(config.llm.has_credentials());
        assert_eq!(config.scheduler.interval(), Duration::from_secs(60));
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn huge_interval_is_clamped() {
        let mut config = AppConfig::default();
        config
            .apply_env(|k| {
                (k == "REMINDER_CHECK_INTERVAL_MINUTES").then(|| u64::MAX.to_string())
            })
            .unwrap();
        assert_eq!(
            config.scheduler.interval(),
            Duration::from_secs(MAX_CHECK_INTERVAL_MINUTES * 60)
        );

        config.scheduler.check_interval_minutes = 0;
        assert_eq!(config.scheduler.interval(), Duration::from_secs(60));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("GEMINI_API_KEY", "  "), ("HOST", "")]))
            .unwrap();
        assert!(config.llm.gemini_api_key.is_none());
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.starts_with("PORT=")));
    }

    #[test]
    fn postgrest_needs_both_url_and_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("SUPABASE_URL", "https://x.supabase.co")]))
            .unwrap();
        assert!(config.store.postgrest().is_none());
        config.apply_env(env(&[("SUPABASE_KEY", "anon")])).unwrap();
        assert_eq!(
            config.store.postgrest(),
            Some(("https://x.supabase.co", "anon"))
        );
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        assert!(AppConfig::from_file(Path::new("/nonexistent/taskpilot.toml")).is_err());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(AppError::Config(_))
        ));
    }
}
