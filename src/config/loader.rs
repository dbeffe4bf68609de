//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),
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

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => RelayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load dotenv files into the process environment.
///
/// `ENV_FILE` names a single file that must exist. Otherwise `.env.local`
/// is preferred, then `.env`; missing files are not an error. Variables
/// already set in the environment win. Returns the file that was loaded.
pub fn load_env_files() -> Result<Option<PathBuf>, ConfigError> {
    if let Ok(explicit) = std::env::var("ENV_FILE") {
        let path = PathBuf::from(explicit);
        dotenvy::from_path(&path)?;
        return Ok(Some(path));
    }

    for candidate in [".env.local", ".env"] {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            dotenvy::from_path(&path)?;
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Apply the deployment's environment variables on top of file config.
///
/// `lookup` is injected so tests don't touch the process environment.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = non_empty("PORT").or_else(|| non_empty("SERVER_PORT")) {
        config.listener.bind_address = replace_port(&config.listener.bind_address, port.trim());
    }
    if let Some(key) = non_empty("IMG_APIKEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(proxy) = non_empty("HTTP_PROXY") {
        config.upstream.proxy = Some(proxy);
    }
    if let Some(url) = non_empty("DATABASE_URL").or_else(|| mysql_url_from_parts(&non_empty)) {
        config.ledger.database_url = url;
    }
    if let Some(table) = non_empty("TABLE_NAME") {
        config.ledger.table_name = table;
    }
}

/// Build a MySQL URL from `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USERNAME`
/// and `DB_PASSWORD`. Host and name are required; the port defaults to 3306.
fn mysql_url_from_parts<F>(var: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = var("DB_HOST")?;
    let name = var("DB_NAME")?;
    let port = var("DB_PORT").unwrap_or_else(|| "3306".to_string());

    let mut url = url::Url::parse(&format!("mysql://{}:{}", host.trim(), port.trim())).ok()?;
    url.set_path(name.trim());
    if let Some(user) = var("DB_USERNAME") {
        url.set_username(user.trim()).ok()?;
        if let Some(password) = var("DB_PASSWORD") {
            url.set_password(Some(&password)).ok()?;
        }
    }
    Some(url.to_string())
}

fn replace_port(bind_address: &str, port: &str) -> String {
    let host = match bind_address.rsplit_once(':') {
        Some((host, _)) => host,
        None => bind_address,
    };
    format!("{}:{}", host, port)
}
