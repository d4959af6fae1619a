use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::entry::{IndexSpec, Metric, ProvisioningSpec};
use super::search::OutputFormat;
use crate::error::ConfigError;
use crate::utils::retry::RetryConfig;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_INDEX_NAME: &str = "car-data-index";
pub const DEFAULT_DIMENSION: u32 = 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 512;

const APP_DIR: &str = "rowvec";
const PROJECT_DIR: &str = ".rowvec";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration after all layers have been applied.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: Config,
    pub global_path: Option<PathBuf>,
    pub project_path: Option<PathBuf>,
}

impl Config {
    /// `~/.config/rowvec/config.toml` (platform dependent).
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    /// `./.rowvec` relative to the current directory.
    pub fn project_config_dir() -> Option<PathBuf> {
        std::env::current_dir().ok().map(|d| d.join(PROJECT_DIR))
    }

    /// Nearest `.rowvec/config.toml`, walking up from the current directory.
    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .map(|dir| dir.join(PROJECT_DIR).join(CONFIG_FILE))
            .find(|p| p.is_file())
    }

    /// Resolve defaults, global file, project file, then environment, and validate.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let resolved = Self::resolve()?;
        resolved.config.validate()?;
        Ok(resolved)
    }

    /// Same layering as [`Config::load`] without validation, for callers that
    /// still apply their own overrides.
    pub fn resolve() -> Result<ResolvedConfig, ConfigError> {
        dotenvy::dotenv().ok();

        let global_path = Self::global_path().filter(|p| p.is_file());
        let project_path = Self::find_project_config();

        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in global_path.iter().chain(project_path.iter()) {
            let content = std::fs::read_to_string(path)?;
            let layer: toml::Value = toml::from_str(&content)?;
            merge_toml(&mut merged, layer);
        }

        let mut config: Config = merged.try_into()?;
        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(ResolvedConfig {
            config,
            global_path,
            project_path,
        })
    }

    /// Apply `ROWVEC_*` overrides from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ROWVEC_EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Some(v) = lookup("ROWVEC_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(v);
        }
        if let Some(v) = lookup("ROWVEC_INDEX_URL") {
            self.index.url = v;
        }
        if let Some(v) = lookup("ROWVEC_INDEX_NAME") {
            self.index.name = v;
        }
        if let Some(v) = lookup("ROWVEC_INDEX_API_KEY") {
            self.index.api_key = Some(v);
        }
        if let Some(driver) = lookup("ROWVEC_INDEX_DRIVER").and_then(|v| v.parse().ok()) {
            self.index.driver = driver;
        }
        if let Some(n) = lookup("ROWVEC_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.pipeline.chunk_size = n;
        }
        if let Some(n) = lookup("ROWVEC_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.pipeline.batch_size = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.pipeline.chunk_size == 0 {
            return invalid("pipeline.chunk_size must be at least 1");
        }
        if self.pipeline.batch_size == 0 {
            return invalid("pipeline.batch_size must be at least 1");
        }
        if self.pipeline.fields.is_empty() {
            return invalid("pipeline.fields must name at least one column");
        }
        self.pipeline.delimiter_byte()?;
        if self.index.dimension == 0 {
            return invalid("index.dimension must be at least 1");
        }
        if self.index.name.trim().is_empty() {
            return invalid("index.name must not be empty");
        }
        if self.embedding.concurrency == 0 {
            return invalid("embedding.concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn init_global() -> Result<PathBuf, ConfigError> {
        let path = Self::global_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        Self::default().save_to(&path)?;
        Ok(path)
    }

    pub fn init_project() -> Result<PathBuf, ConfigError> {
        let dir = Self::project_config_dir().ok_or_else(|| {
            ConfigError::PathError("could not determine project directory".to_string())
        })?;
        let path = dir.join(CONFIG_FILE);
        Self::default().save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.embedding.api_key = mask(&self.embedding.api_key);
        copy.index.api_key = mask(&self.index.api_key);
        copy
    }
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name forwarded to servers hosting several models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Expected vector width; responses of another length are rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight embedding requests per chunk
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Let the server truncate over-long inputs instead of rejecting them
    #[serde(default = "default_true")]
    pub truncate: bool,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_timeout() -> u64 {
    120
}

fn default_concurrency() -> usize {
    16
}

fn default_true() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            api_key: None,
            model: None,
            dimension: None,
            timeout_secs: default_embedding_timeout(),
            concurrency: default_concurrency(),
            truncate: true,
        }
    }
}

/// Vector index backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
    /// In-process store, nothing is persisted
    Memory,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorDriver::Qdrant),
            "postgresql" | "postgres" | "pgvector" => Ok(VectorDriver::PostgreSQL),
            "memory" => Ok(VectorDriver::Memory),
            _ => Err(format!("unknown vector driver: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_index_url")]
    pub url: String,

    #[serde(default = "default_index_name")]
    pub name: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default)]
    pub metric: Metric,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,

    /// PostgreSQL schema; `public` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,

    #[serde(default)]
    pub on_disk: bool,
}

fn default_index_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_DIMENSION
}

fn default_index_timeout() -> u64 {
    30
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    10
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_index_url(),
            name: default_index_name(),
            dimension: default_dimension(),
            metric: Metric::default(),
            api_key: None,
            timeout_secs: default_index_timeout(),
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
            shard_number: None,
            replication_factor: None,
            on_disk: false,
        }
    }
}

impl IndexConfig {
    /// Creation parameters for the configured index.
    pub fn spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.name.clone(),
            dimension: u64::from(self.dimension),
            metric: self.metric,
            provisioning: ProvisioningSpec {
                shard_number: self.shard_number,
                replication_factor: self.replication_factor,
                on_disk: self.on_disk,
            },
        }
    }
}

/// One column of the record template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub column: String,
    pub label: String,
}

impl FieldSpec {
    pub fn new(column: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Template columns, in output order; all of them are required
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSpec>,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_text_chars() -> usize {
    DEFAULT_MAX_TEXT_CHARS
}

fn default_delimiter() -> char {
    ','
}

fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name", "Name"),
        FieldSpec::new("mpg", "MPG"),
        FieldSpec::new("cylinders", "Cylinders"),
        FieldSpec::new("displacement", "Displacement"),
        FieldSpec::new("horsepower", "Horsepower"),
        FieldSpec::new("weight", "Weight"),
        FieldSpec::new("acceleration", "Acceleration"),
        FieldSpec::new("model_year", "Model Year"),
        FieldSpec::new("origin", "Origin"),
    ]
}

impl PipelineConfig {
    /// The delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ConfigError::ValidationError(
                    "pipeline.delimiter must be a single ASCII character".to_string(),
                )
            })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            max_text_chars: default_max_text_chars(),
            delimiter: default_delimiter(),
            fields: default_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per embedding or upsert call; 1 disables retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts.max(1))
            .with_initial_delay(std::time::Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(std::time::Duration::from_millis(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}
