//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports TOML and JSON formats
//!
//! ## Environment Variables
//! - `STEWARD_API_BASE_URL`: Base URL of the admin REST surface (required)
//! - `STEWARD_MAX_RETRIES`: Retry ceiling for retryable call failures
//! - `STEWARD_TOKEN_STORE`: Path of the stored-user-token JSON file
//! - `STEWARD_SERVICE_ACCOUNT`: Service account email for delegation
//! - `STEWARD_ADMIN_SUBJECT`: Default impersonated administrator
//! - `STEWARD_KEY_FILE`: PEM private key path (software signer)
//! - `STEWARD_PIV_SERIAL`: PIV device serial (hardware signer)
//! - `STEWARD_MAX_WORKERS`: Concurrent worker ceiling per batch generation
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./steward.toml` or `./steward.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../steward.toml` or `../steward.json` (parent directory)
//! 4. Relative to the executable location

use std::path::{Path, PathBuf};

use steward_domain::{
    ApiConfig, AuthConfig, BatchConfig, Config, KeySource, Result, StewardError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `StewardError::Config` if configuration cannot be loaded from
/// either source, or a file has an invalid format.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `STEWARD_API_BASE_URL` must be present; every other variable has a
/// default or is optional.
///
/// # Errors
/// Returns `StewardError::Config` when the base URL is missing or a
/// numeric variable fails to parse.
pub fn load_from_env() -> Result<Config> {
    let base_url = env_var("STEWARD_API_BASE_URL")?;
    let max_retries = env_parse("STEWARD_MAX_RETRIES")?;
    let max_workers = env_parse("STEWARD_MAX_WORKERS")?;

    let key_source = match (env_opt("STEWARD_KEY_FILE"), env_opt("STEWARD_PIV_SERIAL")) {
        (Some(path), _) => Some(KeySource::Pem { path }),
        (None, Some(serial)) => {
            let serial = serial.parse::<u32>().map_err(|e| {
                StewardError::Config(format!("Invalid STEWARD_PIV_SERIAL: {e}"))
            })?;
            Some(KeySource::Piv { serial: Some(serial), pin: env_opt("STEWARD_PIV_PIN") })
        }
        (None, None) => None,
    };

    let mut api = ApiConfig {
        base_url,
        request_timeout_secs: 30,
        max_retries: 5,
        page_size: 500,
    };
    if let Some(max_retries) = max_retries {
        api.max_retries = max_retries;
    }

    let mut batch = BatchConfig::default();
    if let Some(max_workers) = max_workers {
        batch.max_workers = max_workers;
    }

    Ok(Config {
        api,
        auth: AuthConfig {
            token_store_path: env_opt("STEWARD_TOKEN_STORE"),
            service_account_email: env_opt("STEWARD_SERVICE_ACCOUNT"),
            client_id: env_opt("STEWARD_CLIENT_ID"),
            key_source,
            token_uri: env_opt("STEWARD_TOKEN_URI")
                .unwrap_or_else(|| "https://oauth2.googleapis.com/token".to_string()),
            admin_subject: env_opt("STEWARD_ADMIN_SUBJECT"),
        },
        batch,
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Format is detected by file extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `StewardError::Config` if no file is found or parsing fails.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(StewardError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => probe_config_paths().ok_or_else(|| {
            StewardError::Config(
                "No config file found; set STEWARD_API_BASE_URL or create steward.toml"
                    .to_string(),
            )
        })?,
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| StewardError::Config(format!("Cannot read {}: {e}", path.display())))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| StewardError::Config(format!("Invalid TOML in {}: {e}", path.display())))?,
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| StewardError::Config(format!("Invalid JSON in {}: {e}", path.display())))?,
        _ => {
            return Err(StewardError::Config(format!(
                "Unsupported config format: {}",
                path.display()
            )))
        }
    };

    tracing::info!(path = %path.display(), "Configuration loaded from file");
    Ok(config)
}

/// Find the first existing config file among the standard locations.
fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for dir in ["./", "../"] {
        for name in ["steward", "config"] {
            for ext in ["toml", "json"] {
                candidates.push(PathBuf::from(format!("{dir}{name}.{ext}")));
            }
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            for ext in ["toml", "json"] {
                candidates.push(exe_dir.join(format!("steward.{ext}")));
            }
        }
    }
    candidates.into_iter().find(|p| p.exists())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| StewardError::Config(format!("Missing environment variable: {name}")))
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| StewardError::Config(format!("Invalid {name}: {e}"))),
    }
}
