//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Environment variable prefix (`FANFOLIO__LOGGING__LEVEL=debug`)
pub const ENV_PREFIX: &str = "FANFOLIO";

/// Main model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub logging: LoggingConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub thread: ThreadPolicy,
    pub cache: CacheConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Content validation strictness
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Accept post bodies without a kind and without a file
    #[serde(default = "default_allow_text_only_bodies")]
    pub allow_text_only_bodies: bool,
}

fn default_allow_text_only_bodies() -> bool {
    true
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            allow_text_only_bodies: default_allow_text_only_bodies(),
        }
    }
}

/// Reply nesting policy
///
/// The thread itself never caps depth; callers that want a limit ask
/// the policy before calling `add_reply`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadPolicy {
    /// Maximum depth of a new reply (root = 0). `None` means unbounded.
    pub max_depth: Option<usize>,
}

impl ThreadPolicy {
    /// Whether a reply may be added below a node at `parent_depth`.
    pub fn allows(&self, parent_depth: usize) -> bool {
        match self.max_depth {
            Some(max) => parent_depth < max,
            None => true,
        }
    }
}

/// Aggregate cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum aggregates per cache (default: 1024)
    pub max_items: usize,
    /// Seconds an entry lives after insertion (default: 86400)
    pub ttl_seconds: u64,
}

impl ModelConfig {
    /// Load configuration from files and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FANFOLIO__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(Path::new("config"))
    }

    /// Load configuration with `default.toml`/`local.toml` taken from `dir`.
    pub fn load_from(dir: &Path) -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("content.allow_text_only_bodies", true)?
            .set_default("cache.max_items", 1024)?
            .set_default("cache.ttl_seconds", 86_400)?
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join("local")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let model_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        model_config.validate()?;
        Ok(model_config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }

        if self.thread.max_depth == Some(0) {
            return Err(AppError::Config(
                "thread.max_depth must be greater than 0 when set".to_string(),
            ));
        }

        if self.cache.max_items == 0 {
            return Err(AppError::Config(
                "cache.max_items must be greater than 0".to_string(),
            ));
        }

        if self.cache.ttl_seconds == 0 {
            return Err(AppError::Config(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            content: ContentConfig::default(),
            thread: ThreadPolicy::default(),
            cache: CacheConfig {
                max_items: 1024,
                ttl_seconds: 86_400,
            },
        }
    }
}
