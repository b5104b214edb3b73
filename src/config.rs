use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Value of `api_secret` until the operator sets a real one.
pub const PLACEHOLDER_SECRET: &str = "CHANGE_ME";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct VesperConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub api_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub table: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub zip_path: String,
    pub unzip_dir: String,
    pub chunk_tokens: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    /// Hugging Face repository id, e.g. `BAAI/bge-large-en-v1.5`.
    pub model: String,
    pub dimensions: usize,
    /// `cls` or `mean`.
    pub pooling: String,
    /// `auto`, `cpu` or `cuda`.
    pub device: String,
    pub cache_dir: String,
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub enabled: bool,
    pub default_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub max_tokens: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            log_level: "info".into(),
            api_secret: PLACEHOLDER_SECRET.into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_vesper_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            table: "memory".into(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            zip_path: "chatgpt_export.zip".into(),
            unzip_dir: "chatgpt_export".into(),
            chunk_tokens: 5500,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_vesper_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "BAAI/bge-large-en-v1.5".into(),
            dimensions: 1024,
            pooling: "cls".into(),
            device: "auto".into(),
            cache_dir,
            batch_size: 32,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_k: 5,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".into(),
            max_tokens: 256,
        }
    }
}

/// Returns `~/.vesper/`, or `./.vesper` when no home directory is known.
pub fn default_vesper_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vesper")
}

/// Returns the default config file path: `~/.vesper/config.toml`
pub fn default_config_path() -> PathBuf {
    default_vesper_dir().join("config.toml")
}

impl VesperConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            VesperConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `VESPER_*` overrides from an arbitrary lookup (the process
    /// environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("VESPER_ZIP_PATH") {
            self.ingest.zip_path = val;
        }
        if let Some(val) = lookup("VESPER_UNZIP_DIR") {
            self.ingest.unzip_dir = val;
        }
        if let Some(val) = lookup("VESPER_DB") {
            self.storage.db_path = val;
        }
        if let Some(val) = lookup("VESPER_CHUNK_TOKENS") {
            set_parsed(&mut self.ingest.chunk_tokens, "VESPER_CHUNK_TOKENS", &val);
        }
        if let Some(val) = lookup("VESPER_EMBED_MODEL") {
            self.embedding.model = val;
        }
        if let Some(val) = lookup("VESPER_EMBED_DEVICE") {
            self.embedding.device = val;
        }
        if let Some(val) = lookup("VESPER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("VESPER_PORT") {
            set_parsed(&mut self.server.port, "VESPER_PORT", &val);
        }
        if let Some(val) = lookup("VESPER_TOP_K") {
            set_parsed(&mut self.retrieval.default_k, "VESPER_TOP_K", &val);
        }
        if let Some(val) = lookup("VESPER_API_SECRET") {
            self.server.api_secret = val;
        }
        if let Some(val) = lookup("VESPER_RETRIEVAL_ENABLED") {
            self.retrieval.enabled = parse_flag(&val);
        }
        if let Some(val) = lookup("VESPER_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Some(val) = lookup("VESPER_GENERATION_ENDPOINT") {
            self.generation.endpoint = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// True when the shared secret was never changed from the placeholder.
    pub fn secret_is_placeholder(&self) -> bool {
        let secret = self.server.api_secret.trim();
        secret.is_empty() || secret == PLACEHOLDER_SECRET
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, key: &str, raw: &str) {
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = raw, "ignoring unparseable override"),
    }
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = VesperConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.table, "memory");
        assert_eq!(config.ingest.chunk_tokens, 5500);
        assert_eq!(config.retrieval.default_k, 5);
        assert!(config.retrieval.enabled);
        assert!(config.storage.db_path.ends_with("memory.db"));
        assert!(config.secret_is_placeholder());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
api_secret = "s3cret"

[storage]
db_path = "/tmp/test.db"

[ingest]
chunk_tokens = 800
"#;
        let config: VesperConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.ingest.chunk_tokens, 800);
        assert!(!config.secret_is_placeholder());
        // defaults still apply for unset fields
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.embedding.model, "BAAI/bge-large-en-v1.5");
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("VESPER_DB", "/tmp/override.db"),
            ("VESPER_CHUNK_TOKENS", "1200"),
            ("VESPER_PORT", "6001"),
            ("VESPER_API_SECRET", "hunter2"),
            ("VESPER_RETRIEVAL_ENABLED", "off"),
            ("VESPER_EMBED_DEVICE", "cpu"),
        ]
        .into_iter()
        .collect();

        let mut config = VesperConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.ingest.chunk_tokens, 1200);
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.server.api_secret, "hunter2");
        assert!(!config.retrieval.enabled);
        assert_eq!(config.embedding.device, "cpu");
    }

    #[test]
    fn unparseable_numeric_override_is_ignored() {
        let mut config = VesperConfig::default();
        config.apply_overrides(|k| (k == "VESPER_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn blank_secret_counts_as_placeholder() {
        let mut config = VesperConfig::default();
        config.server.api_secret = "   ".into();
        assert!(config.secret_is_placeholder());
    }
}
