use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Falls back to [`crate::db::default_database_path`] when unset.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_uploads_directory")]
    pub uploads_directory: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub intelligence: IntelligenceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            uploads_directory: default_uploads_directory(),
            worker_count: default_worker_count(),
            dispatch: DispatchConfig::default(),
            intelligence: IntelligenceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Configured database path, or the per-user default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn uploads_path(&self) -> PathBuf {
        PathBuf::from(&self.uploads_directory)
    }
}

fn default_uploads_directory() -> String {
    "uploads".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Re-invocation policy for jobs whose execution itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint used for structured
/// extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    /// No deadline when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some("GROQ_API_KEY".to_string())
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: 0.0,
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            request_timeout_secs: None,
        }
    }
}

impl IntelligenceConfig {
    pub fn api_key_source(&self) -> SecretSource<'_> {
        SecretSource {
            direct: self.api_key.as_deref(),
            file: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
