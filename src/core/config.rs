//! Configuration management for the gateway.
//!
//! Two layers of configuration exist:
//!
//! - [`AppConfig`]: process settings read from environment variables
//!   (bind address, upstream endpoint, timeouts).
//! - [`TranslationConfig`]: the parameter translation tables read from a JSON
//!   document (`modelMapping`, `extraBodyParams`, `modelDefaultParams`).
//!
//! Both are built once at startup and shared read-only afterwards.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;

/// Upstream chat completions endpoint used when `UPSTREAM_URL` is unset.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.poe.com/v1/chat/completions";

/// Extra parameter that carries the image aspect ratio upstream.
pub const ASPECT_PARAM: &str = "aspect";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Full URL of the upstream chat completions endpoint
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Path of the JSON translation document
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Request timeout in seconds for the upstream provider
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Operator switch for `/v1/images/generations`
    #[serde(default = "default_image_generation")]
    pub image_generation: bool,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream_url: default_upstream_url(),
            config_path: default_config_path(),
            verify_ssl: default_verify_ssl(),
            request_timeout_secs: default_request_timeout(),
            image_generation: default_image_generation(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_config_path() -> String {
    "config.json".to_string()
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

fn default_image_generation() -> bool {
    true
}

impl AppConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = AppConfig::default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }

        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(url) = std::env::var("UPSTREAM_URL") {
            if !url.trim().is_empty() {
                config.upstream_url = url;
            }
        }

        if let Ok(path) = std::env::var("CONFIG_PATH") {
            config.config_path = path;
        }

        if let Ok(verify_ssl_str) = std::env::var("VERIFY_SSL") {
            config.verify_ssl = str_to_bool(&verify_ssl_str);
        }

        if let Ok(timeout_str) = std::env::var("REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                config.request_timeout_secs = timeout;
            }
        }

        if let Ok(flag) = std::env::var("IMAGE_GENERATION") {
            config.image_generation = str_to_bool(&flag);
        }

        config
    }
}

/// Parameter translation tables.
///
/// ```json
/// {
///   "modelMapping": { "gpt-4": "GPT-4o" },
///   "extraBodyParams": ["aspect", "thinking_budget"],
///   "modelDefaultParams": { "gpt-4": { "thinking_budget": 1024 } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationConfig {
    /// Caller-facing alias -> upstream model name
    #[serde(default)]
    pub model_mapping: HashMap<String, String>,

    /// Names accepted upstream only inside `extra_body`
    #[serde(default)]
    pub extra_body_params: HashSet<String>,

    /// Caller-facing model name -> parameter defaults
    #[serde(default)]
    pub model_default_params: HashMap<String, Map<String, Value>>,
}

impl TranslationConfig {
    /// Load the translation document from a JSON file.
    ///
    /// `${VAR}`, `${VAR:-default}` and `${VAR:default}` are expanded from the
    /// environment before parsing.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let expanded = expand_env_vars(&content);

        serde_json::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Load the translation document, degrading to an empty configuration
    /// (pure pass-through) on any failure.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => {
                tracing::info!(
                    path = %path,
                    model_mappings = config.model_mapping.len(),
                    extra_body_params = config.extra_body_params.len(),
                    model_defaults = config.model_default_params.len(),
                    "Translation config loaded"
                );
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path,
                    error = %format!("{:#}", e),
                    "Translation config unavailable, falling back to empty config"
                );
                Self::default()
            }
        }
    }

    /// Resolve a caller-facing model name to its upstream name.
    pub fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_mapping
            .get(model)
            .map(String::as_str)
            .unwrap_or(model)
    }

    pub fn is_extra_param(&self, name: &str) -> bool {
        self.extra_body_params.contains(name)
    }

    pub fn defaults_for(&self, model: &str) -> Option<&Map<String, Value>> {
        self.model_default_params.get(model)
    }

    /// Whether the image aspect ratio can reach the upstream.
    pub fn supports_aspect(&self) -> bool {
        self.is_extra_param(ASPECT_PARAM)
    }
}

static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-?([^}]*))?\}").expect("valid env var pattern")
});

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_RE
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("POE_TEST_VAR", "test_value");
        }
        let output = expand_env_vars(r#"{"model": "${POE_TEST_VAR}"}"#);
        assert_eq!(output, r#"{"model": "test_value"}"#);
        unsafe {
            std::env::remove_var("POE_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        unsafe {
            std::env::remove_var("POE_MISSING_VAR");
        }
        assert_eq!(expand_env_vars("${POE_MISSING_VAR:-fallback}"), "fallback");
        assert_eq!(expand_env_vars("${POE_MISSING_VAR:fallback}"), "fallback");
        assert_eq!(expand_env_vars("${POE_MISSING_VAR:-}"), "");
    }

    #[test]
    fn test_expand_leaves_plain_dollars_alone() {
        assert_eq!(expand_env_vars("costs $5"), "costs $5");
    }

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("true"));
        assert!(str_to_bool("TRUE"));
        assert!(str_to_bool("1"));
        assert!(str_to_bool("yes"));
        assert!(str_to_bool("On"));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("0"));
        assert!(!str_to_bool("off"));
        assert!(!str_to_bool(""));
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.config_path, "config.json");
        assert!(config.verify_ssl);
        assert!(config.image_generation);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    #[serial]
    fn test_env_var_overrides() {
        unsafe {
            std::env::set_var("HOST", "127.0.0.1");
            std::env::set_var("PORT", "9999");
            std::env::set_var("VERIFY_SSL", "false");
            std::env::set_var("IMAGE_GENERATION", "off");
            std::env::set_var("UPSTREAM_URL", "http://localhost:1234/v1/chat/completions");
        }

        let config = AppConfig::from_env();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9999);
        assert!(!config.verify_ssl);
        assert!(!config.image_generation);
        assert_eq!(config.upstream_url, "http://localhost:1234/v1/chat/completions");

        unsafe {
            std::env::remove_var("HOST");
            std::env::remove_var("PORT");
            std::env::remove_var("VERIFY_SSL");
            std::env::remove_var("IMAGE_GENERATION");
            std::env::remove_var("UPSTREAM_URL");
        }
    }

    #[test]
    #[serial]
    fn test_invalid_port_keeps_default() {
        unsafe {
            std::env::set_var("PORT", "not-a-port");
        }
        assert_eq!(AppConfig::from_env().server.port, 3000);
        unsafe {
            std::env::remove_var("PORT");
        }
    }

    #[test]
    fn test_load_translation_config() {
        let file = write_config(
            r#"{
                "modelMapping": {"gpt-4": "GPT-4o"},
                "extraBodyParams": ["aspect", "thinking_budget"],
                "modelDefaultParams": {"gpt-4": {"thinking_budget": 1024, "top_p": 0.9}}
            }"#,
        );

        let config = TranslationConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.resolve_model("gpt-4"), "GPT-4o");
        assert!(config.is_extra_param("aspect"));
        assert!(config.supports_aspect());
        let defaults = config.defaults_for("gpt-4").unwrap();
        assert_eq!(defaults["thinking_budget"], json!(1024));
        assert_eq!(defaults["top_p"], json!(0.9));
    }

    #[test]
    fn test_partial_document_defaults_missing_tables() {
        let file = write_config(r#"{"modelMapping": {"a": "b"}}"#);
        let config = TranslationConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.model_mapping.len(), 1);
        assert!(config.extra_body_params.is_empty());
        assert!(config.model_default_params.is_empty());
        assert!(!config.supports_aspect());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(TranslationConfig::load("nonexistent_config.json").is_err());
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = TranslationConfig::load_or_default("nonexistent_config.json");
        assert_eq!(config, TranslationConfig::default());
    }

    #[test]
    fn test_load_or_default_on_invalid_json() {
        let file = write_config("{ not json");
        let config = TranslationConfig::load_or_default(file.path().to_str().unwrap());
        assert_eq!(config, TranslationConfig::default());
    }

    #[test]
    fn test_load_or_default_on_wrong_shape() {
        let file = write_config(r#"{"extraBodyParams": "aspect"}"#);
        let config = TranslationConfig::load_or_default(file.path().to_str().unwrap());
        assert_eq!(config, TranslationConfig::default());
    }

    #[test]
    fn test_load_with_env_expansion() {
        unsafe {
            std::env::set_var("POE_TEST_TARGET_MODEL", "Claude-Sonnet-4");
        }
        let file = write_config(r#"{"modelMapping": {"claude": "${POE_TEST_TARGET_MODEL}"}}"#);
        let config = TranslationConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.resolve_model("claude"), "Claude-Sonnet-4");
        unsafe {
            std::env::remove_var("POE_TEST_TARGET_MODEL");
        }
    }

    #[test]
    fn test_resolve_model_passthrough() {
        let config = TranslationConfig::default();
        assert_eq!(config.resolve_model("unknown-model"), "unknown-model");
    }
}
