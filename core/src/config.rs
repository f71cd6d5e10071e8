//! Configuration loading
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`flowops.toml` in the working directory, or the path in
//!    `FLOWOPS_CONFIG_PATH`, or an explicit `config_path`)
//! 3. Environment variables such as `FLOWOPS__SANDBOX__TIMEOUT_MS`
//! 4. Overrides set on the [`ConfigBuilder`] (usually from CLI flags)
//!
//! A `.env` file in the working directory is read before the environment
//! layer is consulted.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::executor::Limits;
use crate::sandbox::{SandboxSettings, DEFAULT_TIMEOUT};

pub const DEFAULT_CONFIG_FILE: &str = "flowops.toml";
pub const CONFIG_PATH_ENV: &str = "FLOWOPS_CONFIG_PATH";
pub const ENV_PREFIX: &str = "FLOWOPS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid configuration value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxConfig {
    pub timeout_ms: u64,
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Longest string a script may build, in bytes
    pub max_string_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn sandbox_settings(&self) -> SandboxSettings {
        SandboxSettings {
            timeout: Duration::from_millis(self.sandbox.timeout_ms),
            limits: Limits {
                max_steps: self.sandbox.max_steps,
                max_call_depth: self.sandbox.max_call_depth,
                max_string_len: self.sandbox.max_string_len,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field| ConfigError::Invalid {
            field,
            message: "must be greater than zero".to_string(),
        };
        if self.sandbox.timeout_ms == 0 {
            return Err(zero("sandbox.timeout_ms"));
        }
        if self.sandbox.max_steps == 0 {
            return Err(zero("sandbox.max_steps"));
        }
        if self.sandbox.max_call_depth == 0 {
            return Err(zero("sandbox.max_call_depth"));
        }
        if self.sandbox.max_string_len == 0 {
            return Err(zero("sandbox.max_string_len"));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.filter",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    env_prefix: String,
    timeout_ms: Option<u64>,
    max_steps: Option<u64>,
    log_filter: Option<String>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
            timeout_ms: None,
            max_steps: None,
            log_filter: None,
        }
    }
}

impl ConfigBuilder {
    /// Read this file instead of the default location; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();

        let explicit = self
            .config_path
            .clone()
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let file_source = match &explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.clone()));
                }
                file_source(path).required(true)
            }
            None => file_source(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let mut builder = config::Config::builder()
            .set_default("sandbox.timeout_ms", DEFAULT_TIMEOUT.as_millis() as i64)?
            .set_default("sandbox.max_steps", Limits::default().max_steps as i64)?
            .set_default(
                "sandbox.max_call_depth",
                Limits::default().max_call_depth as i64,
            )?
            .set_default(
                "sandbox.max_string_len",
                Limits::default().max_string_len as i64,
            )?
            .set_default("logging.filter", "info")?
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(timeout_ms) = self.timeout_ms {
            builder = builder.set_override("sandbox.timeout_ms", timeout_ms as i64)?;
        }
        if let Some(max_steps) = self.max_steps {
            builder = builder.set_override("sandbox.max_steps", max_steps as i64)?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            file = ?explicit,
            timeout_ms = config.sandbox.timeout_ms,
            max_steps = config.sandbox.max_steps,
            "configuration loaded"
        );
        Ok(config)
    }
}

fn file_source(path: &Path) -> config::File<config::FileSourceFile, config::FileFormat> {
    config::File::from(path).format(config::FileFormat::Toml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Each test gets its own prefix so parallel tests never see each other's variables
    fn isolated(prefix: &str) -> ConfigBuilder {
        Config::builder().env_prefix(prefix)
    }

    #[test]
    fn test_defaults() {
        let config = isolated("FLOWOPS_TEST_DEFAULTS").build().unwrap();
        assert_eq!(config.sandbox.timeout_ms, 5000);
        assert_eq!(config.sandbox.max_steps, 1_000_000);
        assert_eq!(config.sandbox.max_call_depth, 64);
        assert_eq!(config.sandbox.max_string_len, 1 << 22);

        let settings = config.sandbox_settings();
        assert_eq!(settings.timeout, Duration::from_millis(5000));
        assert_eq!(settings.limits, Limits::default());
    }

    #[test]
    fn test_file_then_env_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[sandbox]\ntimeout_ms = 750\nmax_steps = 20\n\n[logging]\nfilter = \"debug\""
        )
        .unwrap();

        std::env::set_var("FLOWOPS_TEST_LAYERS__SANDBOX__MAX_STEPS", "30");

        let config = isolated("FLOWOPS_TEST_LAYERS")
            .config_path(Some(file.path().to_path_buf()))
            .log_filter(Some("warn".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.sandbox.timeout_ms, 750);
        assert_eq!(config.sandbox.max_steps, 30);
        assert_eq!(config.logging.filter, "warn");

        std::env::remove_var("FLOWOPS_TEST_LAYERS__SANDBOX__MAX_STEPS");
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = isolated("FLOWOPS_TEST_MISSING")
            .config_path(Some(PathBuf::from("/nonexistent/flowops.toml")))
            .build();
        assert!(matches!(result, Err(ConfigError::MissingFile(_))));
    }

    #[test]
    fn test_rejects_zero_limits() {
        let result = isolated("FLOWOPS_TEST_ZERO")
            .timeout_ms(Some(0))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "sandbox.timeout_ms", .. })
        ));
    }

    #[test]
    fn test_string_limit_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sandbox]\nmax_string_len = 1024").unwrap();

        let config = isolated("FLOWOPS_TEST_STRING_LEN")
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .unwrap();
        assert_eq!(config.sandbox_settings().limits.max_string_len, 1024);

        let mut zero = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(zero, "[sandbox]\nmax_string_len = 0").unwrap();
        let result = isolated("FLOWOPS_TEST_STRING_LEN_ZERO")
            .config_path(Some(zero.path().to_path_buf()))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "sandbox.max_string_len", .. })
        ));
    }
}
