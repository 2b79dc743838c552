//! Configuration for kore.
//!
//! Maps directly to `kore.toml`. Every section and field is optional; missing
//! values fall back to the defaults below.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{KoreError, Result};

/// Top-level kore configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KoreConfig {
    /// Bridge behaviour: caching, remembering, tracing.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Per-user repeat-query limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// How much memory is pulled into prompts.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Router defaults and complexity-level routes.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Backend used when a provider is built from config.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KoreConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `KoreError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| KoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `KoreError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.limit > 0 && self.rate_limit.window_secs <= 0 {
            return Err(KoreError::Config(format!(
                "rate_limit.window_secs must be positive when rate limiting is on (got {})",
                self.rate_limit.window_secs
            )));
        }
        for (field, secs) in [
            ("bridge.cache_ttl_secs", self.bridge.cache_ttl_secs),
            ("rate_limit.window_secs", self.rate_limit.window_secs),
        ] {
            if Duration::try_seconds(secs).is_none() {
                return Err(KoreError::Config(format!("{field} is out of range (got {secs})")));
            }
        }
        if self.memory.reflect_limit == 0 {
            return Err(KoreError::Config("memory.reflect_limit must be at least 1".into()));
        }
        if self.bridge.default_user.trim().is_empty() {
            return Err(KoreError::Config("bridge.default_user must not be empty".into()));
        }
        match self.provider.kind.as_str() {
            "ollama" | "openai" | "none" => {}
            other => {
                return Err(KoreError::Config(format!(
                    "provider.kind must be one of ollama, openai, none (got '{other}')"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Bridge defaults. Call-site options override these per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Response cache TTL in seconds. Zero or negative disables caching.
    #[serde(default = "default_3600")]
    pub cache_ttl_secs: i64,
    /// Whether `think` consults the cache by default.
    #[serde(default = "default_true")]
    pub use_cache: bool,
    /// Whether `think` stores each exchange in memory by default.
    #[serde(default = "default_true")]
    pub remember: bool,
    /// Record a trace for every bridge operation.
    #[serde(default)]
    pub traces: bool,
    /// User identifier used when the caller passes an empty one.
    #[serde(default = "default_user")]
    pub default_user: String,
}

impl BridgeConfig {
    /// Cache TTL as a signed duration.
    /// Saturates at the representable bounds for values `validate` would reject.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        saturating_seconds(self.cache_ttl_secs)
    }

    /// Whether caching is on at all.
    #[must_use]
    pub fn caching_enabled(&self) -> bool {
        self.cache_ttl_secs > 0
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 3600,
            use_cache: true,
            remember: true,
            traces: false,
            default_user: default_user(),
        }
    }
}

/// Repeat-query limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Identical queries allowed per user per window. Zero disables limiting.
    #[serde(default)]
    pub limit: u32,
    /// Window length in seconds.
    #[serde(default = "default_3600")]
    pub window_secs: i64,
    /// Text returned when a limited query has no cached or remembered answer.
    /// When unset the call fails with a rate-limit error instead.
    #[serde(default)]
    pub refusal: Option<String>,
}

impl RateLimitConfig {
    /// Window as a signed duration.
    /// Saturates at the representable bounds for values `validate` would reject.
    #[must_use]
    pub fn window(&self) -> Duration {
        saturating_seconds(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 0,
            window_secs: 3600,
            refusal: None,
        }
    }
}

/// How much memory is pulled into prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Memories injected as context into each `think` prompt.
    #[serde(default = "default_10")]
    pub context_limit: usize,
    /// Memories summarized by `reflect`.
    #[serde(default = "default_50")]
    pub reflect_limit: usize,
    /// Characters of a prompt/response kept when remembering an exchange.
    #[serde(default = "default_200")]
    pub excerpt_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            context_limit: 10,
            reflect_limit: 50,
            excerpt_chars: 200,
        }
    }
}

/// Router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Route used when no decision function is set. Defaults to the first registered route.
    #[serde(default)]
    pub default_route: Option<String>,
    /// Total message length at which the length-based decision picks "quality".
    #[serde(default = "default_500")]
    pub length_threshold: usize,
    /// Route per complexity level.
    #[serde(default)]
    pub levels: LevelRoutesConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_route: None,
            length_threshold: 500,
            levels: LevelRoutesConfig::default(),
        }
    }
}

/// Route name for each complexity level. One field per level keeps the mapping total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRoutesConfig {
    /// Trivial queries.
    #[serde(default = "default_fast")]
    pub level_0: String,
    /// Simple queries.
    #[serde(default = "default_fast")]
    pub level_1: String,
    /// Involved queries.
    #[serde(default = "default_quality")]
    pub level_2: String,
    /// Hard queries.
    #[serde(default = "default_quality")]
    pub level_3: String,
}

impl Default for LevelRoutesConfig {
    fn default() -> Self {
        Self {
            level_0: default_fast(),
            level_1: default_fast(),
            level_2: default_quality(),
            level_3: default_quality(),
        }
    }
}

/// Backend selection for providers built from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub kind: String,
    /// Base URL for the LLM API. Unset means the default for `kind`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (hosted APIs only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Hard timeout for any LLM call in milliseconds.
    #[serde(default = "default_30000")]
    pub timeout_ms: u64,
    /// Maximum tokens to generate.
    #[serde(default = "default_1024")]
    pub max_tokens: u32,
}

/// Base URL used for an Ollama provider without `base_url`.
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// Base URL used for an OpenAI provider without `base_url`.
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";

impl ProviderConfig {
    /// The configured base URL, else the default for `kind`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.kind.as_str()) {
            (Some(url), _) => url,
            (None, "openai") => OPENAI_DEFAULT_URL,
            (None, _) => OLLAMA_DEFAULT_URL,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_ollama(),
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: 30_000,
            max_tokens: 1024,
        }
    }
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn saturating_seconds(secs: i64) -> Duration {
    Duration::try_seconds(secs).unwrap_or(if secs < 0 { Duration::MIN } else { Duration::MAX })
}

fn default_true() -> bool { true }
fn default_user() -> String { "conversation".to_string() }
fn default_fast() -> String { "fast".to_string() }
fn default_quality() -> String { "quality".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_model() -> String { "llama3.2".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_10() -> usize { 10 }
fn default_50() -> usize { 50 }
fn default_200() -> usize { 200 }
fn default_500() -> usize { 500 }
fn default_1024() -> u32 { 1024 }
fn default_3600() -> i64 { 3600 }
fn default_30000() -> u64 { 30_000 }
