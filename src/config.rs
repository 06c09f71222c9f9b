//! Configuration module

use std::env;
use std::path::PathBuf;

use crate::loader::LoaderSettings;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Model artifact location (mounted without extension)
    pub model_path: PathBuf,

    /// Name served under /v1/models/{name}
    pub model_name: String,

    /// Synthesize the reference model when no artifact is mounted
    pub allow_fallback_model: bool,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model_path: PathBuf::from("/mnt/models/model"),
            model_name: "iris-model".to_string(),
            allow_fallback_model: true,
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            model_name: env::var("MODEL_NAME").unwrap_or(defaults.model_name),

            allow_fallback_model: env::var("ALLOW_FALLBACK_MODEL")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.allow_fallback_model),

            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            model_path: self.model_path.clone(),
            allow_fallback: self.allow_fallback_model,
        }
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
