//! Configuration loading from the settings file and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{GatewayConfig, RuntimeMode};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable selecting the runtime mode.
pub const ENV_MODE: &str = "NODE_ENV";
/// Environment variable overriding the settings file path.
pub const ENV_CONFIG_PATH: &str = "GATEWAY_CONFIG";
/// Environment variable replacing the allow-list with a single origin.
pub const ENV_CLIENT_URL: &str = "CLIENT_URL";
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_UPLOAD_ROOT: &str = "UPLOAD_ROOT";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML settings file. Does not validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Default settings file for a runtime mode.
pub fn settings_path(mode: &RuntimeMode) -> PathBuf {
    PathBuf::from("config").join(format!("{}.toml", mode.name()))
}

/// Load configuration from the process environment.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    load(|var| std::env::var(var).ok())
}

/// Load, override and validate configuration.
///
/// `lookup` resolves environment variables. The mode-specific settings file is
/// optional unless named explicitly through `GATEWAY_CONFIG`. The file that was
/// read is recorded in `settings_file` so it can be logged once logging is up.
pub fn load<F>(lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mode = lookup(ENV_MODE)
        .filter(|m| !m.is_empty())
        .map(RuntimeMode::new)
        .unwrap_or_default();

    let settings_file = match lookup(ENV_CONFIG_PATH) {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(settings_path(&mode)).filter(|path| path.exists()),
    };
    let mut config = match &settings_file {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    config.mode = mode;
    config.settings_file = settings_file;

    apply_env_overrides(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the process-environment overrides on top of the settings file.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_CLIENT_URL).filter(|v| !v.is_empty()) {
        config.cors.allowed_origins = vec![url];
    }

    if let Some(port) = lookup(ENV_PORT).filter(|v| !v.is_empty()) {
        config.listener.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
            var: ENV_PORT,
            value: port.clone(),
        })?;
    }

    if let Some(host) = lookup(ENV_HOST).filter(|v| !v.is_empty()) {
        config.listener.host = host;
    }

    if let Some(root) = lookup(ENV_UPLOAD_ROOT).filter(|v| !v.is_empty()) {
        config.static_files.root = PathBuf::from(root);
    }

    Ok(())
}
