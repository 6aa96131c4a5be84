//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Load a `.env` file into the process environment, if one exists
//! 2. Build the configuration from `REPOLINK_*` variables
//! 3. If `REPOLINK_HOST` is unset, fall back to a config file
//! 4. Validate whichever configuration was produced
//!
//! ## Environment Variables
//! - `REPOLINK_HOST` (required), `REPOLINK_PORT`, `REPOLINK_PROTOCOL`,
//!   `REPOLINK_BASE_PATH`
//! - `REPOLINK_AUTH_TYPE`: `basic` (default), `oauth`, or `service_account`
//!   - basic: `REPOLINK_USERNAME`, `REPOLINK_PASSWORD`
//!   - oauth: `REPOLINK_CLIENT_ID`, `REPOLINK_CLIENT_SECRET`,
//!     `REPOLINK_TOKEN_URL`, `REPOLINK_SCOPE`
//!   - service_account: `REPOLINK_CLIENT_ID`, `REPOLINK_CLIENT_SECRET`,
//!     `REPOLINK_TECHNICAL_ACCOUNT_ID`, `REPOLINK_ORG_ID`,
//!     `REPOLINK_PRIVATE_KEY` or `REPOLINK_PRIVATE_KEY_PATH`,
//!     `REPOLINK_IMS_ENDPOINT`, `REPOLINK_METASCOPES` (comma separated),
//!     `REPOLINK_ASSERTION_TTL_SECS`
//!   - both token schemes: `REPOLINK_REFRESH_THRESHOLD_MS`
//! - `REPOLINK_TIMEOUT_MS`
//! - `REPOLINK_RETRY_MAX_ATTEMPTS`, `REPOLINK_RETRY_BASE_DELAY_MS`,
//!   `REPOLINK_RETRY_MAX_DELAY_MS`, `REPOLINK_RETRY_MULTIPLIER`
//! - `REPOLINK_CB_FAILURE_THRESHOLD`, `REPOLINK_CB_RECOVERY_TIMEOUT_MS`,
//!   `REPOLINK_CB_MONITORING_WINDOW_MS`
//! - `REPOLINK_CACHE_ENABLED`, `REPOLINK_CACHE_MAX_SIZE`,
//!   `REPOLINK_CACHE_TTL_MS`, `REPOLINK_CACHE_EVICTION` (`lru` or `lfu`)
//! - `REPOLINK_HEALTH_PATH`, `REPOLINK_USER_AGENT`
//!
//! ## File Locations
//! The loader probes, in order, `repolink.toml`, `repolink.json`,
//! `config.toml` and `config.json` in the working directory, its parent, and
//! next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use repolink_domain::{
    AuthConfig, ClientConfig, EvictionStrategy, Protocol, RepoLinkError, Result, Secret,
    UpstreamConfig,
};

const FILE_NAMES: [&str; 4] = ["repolink.toml", "repolink.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `RepoLinkError::Config` if neither the environment nor any config
/// file yields a valid configuration.
pub fn load() -> Result<ClientConfig> {
    load_dotenv();

    if std::env::var_os("REPOLINK_HOST").is_some() {
        let config = load_from_env()?;
        tracing::info!("configuration loaded from environment variables");
        return Ok(config);
    }

    tracing::debug!("REPOLINK_HOST not set, trying config files");
    load_from_file(None)
}

/// Populate the process environment from a `.env` file when present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "could not load .env file"),
    }
}

/// Load configuration from `REPOLINK_*` environment variables
///
/// Unset optional variables keep their defaults.
///
/// # Errors
/// Returns `RepoLinkError::Config` if a required variable is missing, a
/// value does not parse, or the result fails validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut upstream = UpstreamConfig::new(env_var("REPOLINK_HOST")?);
    upstream.port = env_parse("REPOLINK_PORT")?;
    if let Some(protocol) = env_parse::<Protocol>("REPOLINK_PROTOCOL")? {
        upstream.protocol = protocol;
    }
    if let Some(base_path) = env_opt("REPOLINK_BASE_PATH") {
        upstream.base_path = base_path;
    }

    let mut config = ClientConfig::new(upstream, auth_from_env()?);

    set_from_env(&mut config.timeout_ms, "REPOLINK_TIMEOUT_MS")?;

    set_from_env(&mut config.retry.max_attempts, "REPOLINK_RETRY_MAX_ATTEMPTS")?;
    set_from_env(&mut config.retry.base_delay_ms, "REPOLINK_RETRY_BASE_DELAY_MS")?;
    set_from_env(&mut config.retry.max_delay_ms, "REPOLINK_RETRY_MAX_DELAY_MS")?;
    set_from_env(&mut config.retry.multiplier, "REPOLINK_RETRY_MULTIPLIER")?;

    set_from_env(&mut config.circuit_breaker.failure_threshold, "REPOLINK_CB_FAILURE_THRESHOLD")?;
    set_from_env(
        &mut config.circuit_breaker.recovery_timeout_ms,
        "REPOLINK_CB_RECOVERY_TIMEOUT_MS",
    )?;
    set_from_env(
        &mut config.circuit_breaker.monitoring_window_ms,
        "REPOLINK_CB_MONITORING_WINDOW_MS",
    )?;

    config.cache.enabled = env_bool("REPOLINK_CACHE_ENABLED", config.cache.enabled);
    set_from_env(&mut config.cache.max_size, "REPOLINK_CACHE_MAX_SIZE")?;
    set_from_env(&mut config.cache.default_ttl_ms, "REPOLINK_CACHE_TTL_MS")?;
    set_from_env::<EvictionStrategy>(&mut config.cache.eviction, "REPOLINK_CACHE_EVICTION")?;

    if let Some(path) = env_opt("REPOLINK_HEALTH_PATH") {
        config.health_path = path;
    }
    if let Some(agent) = env_opt("REPOLINK_USER_AGENT") {
        config.user_agent = agent;
    }

    config.validate()?;
    Ok(config)
}

fn auth_from_env() -> Result<AuthConfig> {
    let scheme = env_opt("REPOLINK_AUTH_TYPE").unwrap_or_else(|| "basic".to_string());
    let refresh_threshold_ms = env_parse("REPOLINK_REFRESH_THRESHOLD_MS")?.unwrap_or(0);

    match scheme.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "basic" => Ok(AuthConfig::Basic {
            username: env_var("REPOLINK_USERNAME")?,
            password: Secret::new(env_var("REPOLINK_PASSWORD")?),
        }),
        "oauth" => Ok(AuthConfig::Oauth {
            client_id: env_var("REPOLINK_CLIENT_ID")?,
            client_secret: Secret::new(env_var("REPOLINK_CLIENT_SECRET")?),
            token_url: env_var("REPOLINK_TOKEN_URL")?,
            scope: env_opt("REPOLINK_SCOPE"),
            refresh_threshold_ms,
        }),
        "service_account" => Ok(AuthConfig::ServiceAccount {
            client_id: env_var("REPOLINK_CLIENT_ID")?,
            client_secret: Secret::new(env_var("REPOLINK_CLIENT_SECRET")?),
            technical_account_id: env_var("REPOLINK_TECHNICAL_ACCOUNT_ID")?,
            org_id: env_var("REPOLINK_ORG_ID")?,
            private_key: Secret::new(private_key_from_env()?),
            ims_endpoint: env_var("REPOLINK_IMS_ENDPOINT")?,
            metascopes: env_opt("REPOLINK_METASCOPES")
                .map(|list| {
                    list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
                })
                .unwrap_or_default(),
            exchange_path: repolink_domain::constants::DEFAULT_JWT_EXCHANGE_PATH.to_string(),
            assertion_ttl_secs: env_parse("REPOLINK_ASSERTION_TTL_SECS")?
                .unwrap_or(repolink_domain::constants::DEFAULT_ASSERTION_TTL_SECS),
            refresh_threshold_ms,
        }),
        other => Err(RepoLinkError::Config(format!("Unsupported REPOLINK_AUTH_TYPE: {other}"))),
    }
}

/// Inline key wins over a key file. Escaped newlines are expanded so the PEM
/// can live on one line in a `.env` file.
fn private_key_from_env() -> Result<String> {
    if let Some(inline) = env_opt("REPOLINK_PRIVATE_KEY") {
        return Ok(inline.replace("\\n", "\n"));
    }
    let path = env_var("REPOLINK_PRIVATE_KEY_PATH").map_err(|_| {
        RepoLinkError::Config(
            "service_account auth requires REPOLINK_PRIVATE_KEY or REPOLINK_PRIVATE_KEY_PATH"
                .to_string(),
        )
    })?;
    std::fs::read_to_string(&path)
        .map_err(|e| RepoLinkError::Config(format!("Failed to read private key {path}: {e}")))
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `RepoLinkError::Config` if the file is missing, does not parse,
/// or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RepoLinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RepoLinkError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RepoLinkError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RepoLinkError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RepoLinkError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RepoLinkError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        RepoLinkError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Set, non-blank variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RepoLinkError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

fn set_from_env<T>(slot: &mut T, key: &str) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = env_parse(key)? {
        *slot = value;
    }
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use super::*;

    const ALL_VARS: [&str; 14] = [
        "REPOLINK_HOST",
        "REPOLINK_PORT",
        "REPOLINK_PROTOCOL",
        "REPOLINK_AUTH_TYPE",
        "REPOLINK_USERNAME",
        "REPOLINK_PASSWORD",
        "REPOLINK_CLIENT_ID",
        "REPOLINK_CLIENT_SECRET",
        "REPOLINK_TOKEN_URL",
        "REPOLINK_SCOPE",
        "REPOLINK_RETRY_MAX_ATTEMPTS",
        "REPOLINK_CACHE_ENABLED",
        "REPOLINK_CACHE_EVICTION",
        "REPOLINK_TIMEOUT_MS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_env_bool_parsing() {
        std::env::set_var("REPOLINK_TEST_BOOL", "YES");
        assert!(env_bool("REPOLINK_TEST_BOOL", false));
        std::env::set_var("REPOLINK_TEST_BOOL", "off");
        assert!(!env_bool("REPOLINK_TEST_BOOL", true));
        std::env::remove_var("REPOLINK_TEST_BOOL");
        assert!(env_bool("REPOLINK_TEST_BOOL", true));
    }

    #[test]
    #[serial]
    fn test_load_basic_from_env() {
        clear_env();
        std::env::set_var("REPOLINK_HOST", "author.example.com");
        std::env::set_var("REPOLINK_PORT", "4502");
        std::env::set_var("REPOLINK_PROTOCOL", "http");
        std::env::set_var("REPOLINK_USERNAME", "admin");
        std::env::set_var("REPOLINK_PASSWORD", "admin");
        std::env::set_var("REPOLINK_RETRY_MAX_ATTEMPTS", "5");
        std::env::set_var("REPOLINK_CACHE_ENABLED", "false");
        std::env::set_var("REPOLINK_CACHE_EVICTION", "LFU");

        let config = load_from_env().unwrap();
        clear_env();

        assert_eq!(config.upstream.base_url(), "http://author.example.com:4502");
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.eviction, EvictionStrategy::Lfu);
        assert!(matches!(config.auth, AuthConfig::Basic { ref username, .. } if username == "admin"));
    }

    #[test]
    #[serial]
    fn test_load_oauth_from_env() {
        clear_env();
        std::env::set_var("REPOLINK_HOST", "author.example.com");
        std::env::set_var("REPOLINK_AUTH_TYPE", "oauth");
        std::env::set_var("REPOLINK_CLIENT_ID", "client");
        std::env::set_var("REPOLINK_CLIENT_SECRET", "secret");
        std::env::set_var("REPOLINK_TOKEN_URL", "https://ims.example.com/token");
        std::env::set_var("REPOLINK_SCOPE", "openid");

        let config = load_from_env().unwrap();
        clear_env();

        match config.auth {
            AuthConfig::Oauth { client_id, scope, refresh_threshold_ms, .. } => {
                assert_eq!(client_id, "client");
                assert_eq!(scope.as_deref(), Some("openid"));
                assert_eq!(refresh_threshold_ms, 0);
            }
            other => panic!("expected oauth config, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_missing_host_is_config_error() {
        clear_env();
        let err = load_from_env().unwrap_err();
        assert!(matches!(err, RepoLinkError::Config(ref m) if m.contains("REPOLINK_HOST")));
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_config_error() {
        clear_env();
        std::env::set_var("REPOLINK_HOST", "author.example.com");
        std::env::set_var("REPOLINK_USERNAME", "admin");
        std::env::set_var("REPOLINK_PASSWORD", "admin");
        std::env::set_var("REPOLINK_TIMEOUT_MS", "soon");

        let err = load_from_env().unwrap_err();
        clear_env();
        assert!(matches!(err, RepoLinkError::Config(ref m) if m.contains("REPOLINK_TIMEOUT_MS")));
    }

    #[test]
    #[serial]
    fn test_unknown_auth_type() {
        clear_env();
        std::env::set_var("REPOLINK_HOST", "author.example.com");
        std::env::set_var("REPOLINK_AUTH_TYPE", "kerberos");

        let err = load_from_env().unwrap_err();
        clear_env();
        assert!(matches!(err, RepoLinkError::Config(_)));
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
timeout_ms = 5000

[upstream]
host = "author.example.com"

[auth]
type = "basic"
username = "admin"
password = "admin"

[cache]
max_size = 50
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.cache.max_size, 50);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let json_content = r#"{
            "upstream": {"host": "author.example.com"},
            "auth": {"type": "basic", "username": "admin", "password": "admin"},
            "retry": {"max_attempts": 0}
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();
        assert!(matches!(result, Err(RepoLinkError::Config(_))));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/repolink.toml")));
        assert!(matches!(result, Err(RepoLinkError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("host: x", &PathBuf::from("repolink.yaml"));
        assert!(result.is_err());
    }
}
