//! Configuration loading, validation, and management for Reframe.
//!
//! Loads configuration from `~/.reframe/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.reframe/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative-AI API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which provider to use: "gemini" or "scripted" (offline)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature for feedback-style generations
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Maximum output tokens per generation
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Upper bound on any single AI call, in seconds. The dominant
    /// latency source in the system; calls past this fall back.
    #[serde(default = "default_ai_timeout_secs")]
    pub ai_timeout_secs: u64,

    /// Default student age used when a request omits it
    #[serde(default = "default_student_age")]
    pub default_student_age: u8,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Daily AI usage gating
    #[serde(default)]
    pub usage: UsageConfig,

    /// Safety screening configuration
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Scoring thresholds and rewards
    #[serde(default)]
    pub scoring: ScoringConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-pro".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_ai_timeout_secs() -> u64 {
    8
}
fn default_student_age() -> u8 {
    10
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("default_temperature", &self.default_temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("ai_timeout_secs", &self.ai_timeout_secs)
            .field("default_student_age", &self.default_student_age)
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("usage", &self.usage)
            .field("safety", &self.safety)
            .field("scoring", &self.scoring)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Front-end origins allowed by CORS. Everything else is rejected.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Secret used to sign bearer tokens. Required in production;
    /// generated per-process when absent (tokens die with the process).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,

    /// Issued-token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// Sliding-window request ceiling per client per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}
fn default_token_ttl_hours() -> u64 {
    24
}
fn default_requests_per_minute() -> usize {
    60
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("allowed_origins", &self.allowed_origins)
            .field("token_secret", &redact(&self.token_secret))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            token_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "in-memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path. `:memory:` for ephemeral.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    AppConfig::config_dir()
        .join("reframe.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Maximum AI-backed operations per user per calendar day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

fn default_daily_limit() -> u32 {
    5
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
        }
    }
}

/// Safety screening configuration.
///
/// The keyword tiers are the canonical set — the screener scans
/// high → medium → low and stops at the first tier with any match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_keywords_high")]
    pub keywords_high: Vec<String>,

    #[serde(default = "default_keywords_medium")]
    pub keywords_medium: Vec<String>,

    #[serde(default = "default_keywords_low")]
    pub keywords_low: Vec<String>,

    /// Temperature for the AI classification pass; low for consistency.
    #[serde(default = "default_classification_temperature")]
    pub classification_temperature: f32,

    /// Help lines returned with every safety verdict
    #[serde(default = "default_help_lines")]
    pub help_lines: Vec<HelpLineConfig>,

    /// Online resources returned with every safety verdict
    #[serde(default = "default_help_sites")]
    pub help_sites: Vec<HelpSiteConfig>,
}

fn default_keywords_high() -> Vec<String> {
    ["kill myself", "suicide", "hurt myself", "want to die", "want to disappear"]
        .map(String::from)
        .to_vec()
}
fn default_keywords_medium() -> Vec<String> {
    ["violence", "bullying", "bullied", "hit me", "abuse"]
        .map(String::from)
        .to_vec()
}
fn default_keywords_low() -> Vec<String> {
    ["depressed", "anxious", "scared", "hopeless", "can't take it"]
        .map(String::from)
        .to_vec()
}
fn default_classification_temperature() -> f32 {
    0.3
}
fn default_help_lines() -> Vec<HelpLineConfig> {
    vec![
        HelpLineConfig {
            name: "Youth Helpline".into(),
            number: "1388".into(),
        },
        HelpLineConfig {
            name: "Crisis Line".into(),
            number: "109".into(),
        },
    ]
}
fn default_help_sites() -> Vec<HelpSiteConfig> {
    vec![HelpSiteConfig {
        name: "Youth Cyber Counseling Center".into(),
        url: "https://www.cyber1388.kr".into(),
    }]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpLineConfig {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpSiteConfig {
    pub name: String,
    pub url: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords_high: default_keywords_high(),
            keywords_medium: default_keywords_medium(),
            keywords_low: default_keywords_low(),
            classification_temperature: default_classification_temperature(),
            help_lines: default_help_lines(),
            help_sites: default_help_sites(),
        }
    }
}

/// Scoring thresholds and gamification rewards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Sub-score used in every parse-failure fallback payload
    #[serde(default = "default_fallback_score")]
    pub fallback_score: u8,

    /// Overall score at or above which skill points are awarded
    #[serde(default = "default_skill_threshold")]
    pub skill_threshold: u8,

    /// Skill points per qualifying evaluation
    #[serde(default = "default_skill_points")]
    pub skill_points: u32,

    /// Base XP for completing a session
    #[serde(default = "default_completion_xp")]
    pub completion_xp: u32,

    /// Additional XP per minute of session duration
    #[serde(default = "default_xp_per_minute")]
    pub xp_per_minute: u32,
}

fn default_fallback_score() -> u8 {
    70
}
fn default_skill_threshold() -> u8 {
    80
}
fn default_skill_points() -> u32 {
    10
}
fn default_completion_xp() -> u32 {
    20
}
fn default_xp_per_minute() -> u32 {
    5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fallback_score: default_fallback_score(),
            skill_threshold: default_skill_threshold(),
            skill_points: default_skill_points(),
            completion_xp: default_completion_xp(),
            xp_per_minute: default_xp_per_minute(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.reframe/config.toml).
    ///
    /// Also checks environment variables:
    /// - `REFRAME_API_KEY` then `GEMINI_API_KEY` for the API key
    /// - `REFRAME_MODEL` for the model
    /// - `REFRAME_DB` for the store path
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("REFRAME_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("REFRAME_MODEL") {
            config.model = model;
        }

        if let Ok(db) = std::env::var("REFRAME_DB") {
            config.store.path = db;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".reframe")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.usage.daily_limit == 0 {
            return Err(ConfigError::ValidationError(
                "usage.daily_limit must be at least 1".into(),
            ));
        }

        if self.safety.enabled && self.safety.keywords_high.is_empty() {
            return Err(ConfigError::ValidationError(
                "safety.keywords_high must not be empty while safety is enabled".into(),
            ));
        }

        if self.ai_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ai_timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            default_temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            ai_timeout_secs: default_ai_timeout_secs(),
            default_student_age: default_student_age(),
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            usage: UsageConfig::default(),
            safety: SafetyConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider, "gemini");
        assert_eq!(config.usage.daily_limit, 5);
        assert_eq!(config.gateway.port, 8787);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.usage.daily_limit, config.usage.daily_limit);
        assert_eq!(parsed.safety.keywords_high, config.safety.keywords_high);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_daily_limit_rejected() {
        let mut config = AppConfig::default();
        config.usage.daily_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider, "gemini");
    }

    #[test]
    fn keyword_tiers_have_canonical_defaults() {
        let config = AppConfig::default();
        assert!(config
            .safety
            .keywords_high
            .iter()
            .any(|k| k == "want to disappear"));
        assert!(config.safety.keywords_medium.iter().any(|k| k == "bullying"));
        assert!(config.safety.keywords_low.iter().any(|k| k == "depressed"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret-key".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
