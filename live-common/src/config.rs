//! Configuration management for the live-stream analysis bot.
//!
//! The bot reads a single JSON file at `~/.livebot/config.json`. Every section
//! is optional and falls back to defaults, so an empty file (or no file at all)
//! yields a runnable configuration apart from the Feishu credentials.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `LIVEBOT_CONFIG` → alternate config file path
//! - `PORT` → server.port
//! - `LIVEBOT_BIND_ADDRESS` → server.bind
//! - `LIVEBOT_LOG_LEVEL` → observability.log_level
//! - `LIVEBOT_LOG_FORMAT` → observability.log_format
//! - `FEISHU_APP_ID` → feishu.app_id
//! - `FEISHU_APP_SECRET` → feishu.app_secret
//! - `FEISHU_ENCRYPT_KEY` → feishu.encrypt_key
//! - `FEISHU_VERIFICATION_TOKEN` → feishu.verification_token

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".livebot"),
        |dirs| dirs.home_dir().join(".livebot"),
    )
}

/// Get the configuration file path, honoring `LIVEBOT_CONFIG`.
pub fn config_path() -> PathBuf {
    std::env::var("LIVEBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Feishu/Lark bot credentials (channel disabled when absent)
    #[serde(default)]
    pub feishu: Option<FeishuConfig>,

    /// Logging settings
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Scoring constants, thresholds, and static report content
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Split out from [`Config::apply_env_overrides`] so tests do not have to
    /// mutate the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT override"),
            }
        }
        if let Some(bind) = lookup("LIVEBOT_BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Some(level) = lookup("LIVEBOT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("LIVEBOT_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        let app_id = lookup("FEISHU_APP_ID");
        let app_secret = lookup("FEISHU_APP_SECRET");
        if app_id.is_some() || app_secret.is_some() {
            let feishu = self.feishu.get_or_insert_with(FeishuConfig::default);
            feishu.enabled = true;
            if let Some(id) = app_id {
                feishu.app_id = id;
            }
            if let Some(secret) = app_secret {
                feishu.app_secret = secret;
            }
        }
        if let Some(feishu) = self.feishu.as_mut() {
            if let Some(key) = lookup("FEISHU_ENCRYPT_KEY") {
                feishu.encrypt_key = Some(key);
            }
            if let Some(token) = lookup("FEISHU_VERIFICATION_TOKEN") {
                feishu.verification_token = Some(token);
            }
        }
    }

    /// Check the configuration for values the service cannot run with.
    ///
    /// Returns every problem found rather than stopping at the first one.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.server.port == 0 {
            problems.push("server.port must be non-zero".to_string());
        }

        if let Some(feishu) = self.feishu.as_ref().filter(|f| f.enabled) {
            if feishu.app_id.trim().is_empty() {
                problems.push("feishu.app_id is required when feishu is enabled".to_string());
            }
            if feishu.app_secret.trim().is_empty() {
                problems.push("feishu.app_secret is required when feishu is enabled".to_string());
            }
        }

        let scoring = &self.analysis.scoring;
        for (name, value) in [
            ("analysis.scoring.order_value_divisor", scoring.order_value_divisor),
            ("analysis.scoring.gmv_unit", scoring.gmv_unit),
            ("analysis.scoring.gmv_divisor", scoring.gmv_divisor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                problems.push(format!("{name} must be a positive number"));
            }
        }
        if !(scoring.rating_s >= scoring.rating_a && scoring.rating_a >= scoring.rating_b) {
            problems.push("analysis.scoring rating thresholds must satisfy s >= a >= b".to_string());
        }

        let diagnostics = &self.analysis.diagnostics;
        if diagnostics.severe_conversion_rate > diagnostics.low_conversion_rate {
            problems.push(
                "analysis.diagnostics.severe_conversion_rate must not exceed low_conversion_rate"
                    .to_string(),
            );
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Whether the Feishu channel should be started.
    pub fn feishu_enabled(&self) -> bool {
        self.feishu.as_ref().is_some_and(|f| f.enabled)
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "0.0.0.0" so the platform can reach the webhook.
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Capacity of the inbound message queue between webhook and processor
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_queue_capacity() -> usize {
    100
}

// ============================================================================
// Feishu Configuration
// ============================================================================

/// Feishu channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeishuConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub encrypt_key: Option<String>,
    #[serde(default)]
    pub verification_token: Option<String>,
    /// Open IDs allowed to use the bot. Empty or `"*"` admits everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
    /// Use the international Lark endpoints instead of Feishu.
    #[serde(default)]
    pub use_lark: bool,
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Analysis Configuration
// ============================================================================

/// Analysis configuration: scoring constants and static report content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticConfig,

    /// Static recommendations shown on every report (first three are used)
    #[serde(default = "default_recommendations")]
    pub recommendations: Vec<RecommendationConfig>,

    /// Reply sent when a message does not contain all three metrics
    #[serde(default = "default_clarification_prompt")]
    pub clarification_prompt: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            diagnostics: DiagnosticConfig::default(),
            recommendations: default_recommendations(),
            clarification_prompt: default_clarification_prompt(),
        }
    }
}

/// Composite score constants.
///
/// The score is the sum of four sub-scores, each capped at `component_cap`:
///
/// - viewer value: `value_per_viewer * viewer_value_multiplier`
/// - conversion: `conversion_rate * conversion_multiplier`
/// - order value: `average_order_value / order_value_divisor`
/// - GMV: `(gmv / gmv_unit * 100) / gmv_divisor`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub viewer_value_multiplier: f64,
    pub conversion_multiplier: f64,
    pub order_value_divisor: f64,
    pub gmv_unit: f64,
    pub gmv_divisor: f64,
    pub component_cap: f64,
    pub max_score: f64,
    /// Minimum score for an S rating
    pub rating_s: f64,
    /// Minimum score for an A rating
    pub rating_a: f64,
    /// Minimum score for a B rating
    pub rating_b: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            viewer_value_multiplier: 50.0,
            conversion_multiplier: 500.0,
            order_value_divisor: 10.0,
            gmv_unit: 1000.0,
            gmv_divisor: 5.0,
            component_cap: 25.0,
            max_score: 100.0,
            rating_s: 80.0,
            rating_a: 60.0,
            rating_b: 40.0,
        }
    }
}

/// Conversion-rate thresholds for the diagnostics block (fractions, not percent).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// Below this the conversion rate is flagged as severely low (0.5%)
    pub severe_conversion_rate: f64,
    /// Below this the conversion rate needs improvement (1.0%)
    pub low_conversion_rate: f64,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            severe_conversion_rate: 0.005,
            low_conversion_rate: 0.01,
        }
    }
}

/// Priority tag of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Medium,
    Longterm,
}

impl Priority {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Medium => "medium",
            Self::Longterm => "longterm",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static recommendation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub priority: Priority,
    pub title: String,
    pub description: String,
}

fn default_recommendations() -> Vec<RecommendationConfig> {
    vec![
        RecommendationConfig {
            priority: Priority::Urgent,
            title: "优化开场话术".to_string(),
            description: "准备吸引人的开场和福利预告".to_string(),
        },
        RecommendationConfig {
            priority: Priority::Medium,
            title: "提升互动频率".to_string(),
            description: "每5-10分钟设置互动环节".to_string(),
        },
        RecommendationConfig {
            priority: Priority::Longterm,
            title: "建立粉丝群".to_string(),
            description: "培养忠实用户提升复购".to_string(),
        },
    ]
}

fn default_clarification_prompt() -> String {
    "请发送格式: GMV=1000, 观众数=5000, 订单数=50\n\
     Please send in the format: GMV=<number>, viewers=<number>, orders=<number>"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.feishu_enabled());
        assert_eq!(config.analysis.recommendations.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.port, 10000);
        assert_eq!(config.analysis.scoring.conversion_multiplier, 500.0);
        assert_eq!(config.analysis.diagnostics.low_conversion_rate, 0.01);
    }

    #[test]
    fn test_partial_scoring_section() {
        let config: Config =
            serde_json::from_str(r#"{"analysis": {"scoring": {"component_cap": 30.0}}}"#).unwrap();
        assert_eq!(config.analysis.scoring.component_cap, 30.0);
        assert_eq!(config.analysis.scoring.viewer_value_multiplier, 50.0);
        assert_eq!(config.analysis.recommendations.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{"port": 8080}},
                "feishu": {{"enabled": true, "app_id": "cli_x", "app_secret": "s"}},
                "observability": {{"level": "debug", "format": "json"}}
            }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.feishu_enabled());
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides_enable_feishu() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("FEISHU_APP_ID", "cli_env"),
            ("FEISHU_APP_SECRET", "secret_env"),
            ("FEISHU_ENCRYPT_KEY", "enc"),
            ("LIVEBOT_LOG_LEVEL", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.observability.log_level, "warn");
        let feishu = config.feishu.as_ref().unwrap();
        assert!(feishu.enabled);
        assert_eq!(feishu.app_id, "cli_env");
        assert_eq!(feishu.app_secret, "secret_env");
        assert_eq!(feishu.encrypt_key.as_deref(), Some("enc"));
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "PORT").then(|| "abc".to_string()));
        assert_eq!(config.server.port, 10000);
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let mut config = Config::default();
        config.feishu = Some(FeishuConfig {
            enabled: true,
            ..FeishuConfig::default()
        });
        config.analysis.scoring.order_value_divisor = 0.0;

        let problems = config.validate().unwrap_err();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("app_id")));
        assert!(problems.iter().any(|p| p.contains("app_secret")));
        assert!(problems.iter().any(|p| p.contains("order_value_divisor")));
    }

    #[test]
    fn test_validate_rating_order() {
        let mut config = Config::default();
        config.analysis.scoring.rating_a = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_priority_serialization() {
        let json = serde_json::to_string(&Priority::Longterm).unwrap();
        assert_eq!(json, "\"longterm\"");
        assert_eq!(Priority::Urgent.to_string(), "urgent");
    }
}
