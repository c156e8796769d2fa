use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::distance::DistanceMetric;
use crate::embeddings::TaskType;
use crate::error::DupRadarError;

pub const WEBHOOK_SECRET_ENV: &str = "GITHUB_WEBHOOK_SECRET";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const VERTEX_API_KEY_ENV: &str = "VERTEX_API_KEY";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Deserialize, Clone)]
pub struct DupRadarConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    pub embedding: EmbeddingConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vector_search: VectorSearchConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/webhook".to_string(),
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TriageConfig {
    pub similarity_threshold: f64,
    pub top_k: u32,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.20,
            top_k: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub project_id: String,
    pub region: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Overrides the regional Vertex AI endpoint (local emulators, tests).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_embedding_model() -> String {
    "text-embedding-005".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_max_input_chars() -> usize {
    // text-embedding-005 accepts 2048 tokens; four chars per token is a safe bound
    8192
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Attempts per search or insert, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_db_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_db_retry_delay_ms() -> u64 {
    200
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "issue_fingerprints".to_string()
}

/// Which stored fingerprints a similarity search may return.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Repository,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VectorSearchConfig {
    pub distance_type: DistanceMetric,
    pub dimensions: usize,
    pub scope: SearchScope,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            distance_type: DistanceMetric::Cosine,
            dimensions: 768,
            scope: SearchScope::All,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            user_agent: concat!("dupradar/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub max_in_flight: usize,
    pub call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_in_flight: num_cpus::get().max(2),
            call_timeout_secs: 30,
        }
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix("DUPRADAR")
        .separator("__")
        .try_parsing(true)
}

impl DupRadarConfig {
    /// Load the TOML file at `path`, then apply `DUPRADAR__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Self::from_sources(File::with_name(path), env_overrides())?;
        let config = config.with_port_override(std::env::var(PORT_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    fn from_sources<S>(file: S, env: Environment) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Apply a `PORT` value (container platforms) over `server.port`.
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(raw) = port.map(str::trim).filter(|p| !p.is_empty()) {
            self.server.port = raw.parse().map_err(|_| {
                ConfigError::Message(format!("{} must be a port number, got {:?}", PORT_ENV, raw))
            })?;
        }
        Ok(self)
    }

    /// Parse a config from an in-memory TOML string (no environment layer).
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.triage.top_k == 0 {
            return Err(ConfigError::Message(
                "triage.top_k must be a positive integer".to_string(),
            ));
        }
        if !self.triage.similarity_threshold.is_finite() || self.triage.similarity_threshold < 0.0
        {
            return Err(ConfigError::Message(
                "triage.similarity_threshold must be a non-negative number".to_string(),
            ));
        }
        if self.embedding.dimensions != self.vector_search.dimensions {
            return Err(ConfigError::Message(format!(
                "embedding.dimensions ({}) does not match vector_search.dimensions ({})",
                self.embedding.dimensions, self.vector_search.dimensions
            )));
        }
        if self.pipeline.queue_capacity == 0 || self.pipeline.max_in_flight == 0 {
            return Err(ConfigError::Message(
                "pipeline.queue_capacity and pipeline.max_in_flight must be positive".to_string(),
            ));
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "server.path must start with '/', got {:?}",
                self.server.path
            )));
        }
        Ok(())
    }
}

/// Credentials read from the environment only, never from the config file.
#[derive(Clone)]
pub struct Secrets {
    pub webhook_secret: String,
    pub github_token: Option<String>,
    pub vertex_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, DupRadarError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DupRadarError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            webhook_secret: get(WEBHOOK_SECRET_ENV)
                .ok_or(DupRadarError::MissingEnv(WEBHOOK_SECRET_ENV))?,
            github_token: get(GITHUB_TOKEN_ENV),
            vertex_api_key: get(VERTEX_API_KEY_ENV),
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("webhook_secret", &"<redacted>")
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("vertex_api_key", &self.vertex_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
