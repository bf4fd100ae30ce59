//! Configuration loader
//!
//! Every setting has a default, so the application starts with no
//! config file at all. Loading proceeds in layers:
//! 1. Built-in defaults
//! 2. A config file, if one is found (probed paths, JSON or TOML)
//! 3. Environment variable overrides
//!
//! ## Environment Variables
//! - `DOSETRACK_DB_PATH`: Database file path
//! - `DOSETRACK_DB_POOL_SIZE`: Connection pool size
//! - `DOSETRACK_BIND_ADDR`: HTTP listen address
//! - `DOSETRACK_USER_ID`: Owner recorded on rows
//! - `DOSETRACK_ADVANCE_MINUTES`: Default alert lead time
//! - `DOSETRACK_NOTIFICATIONS_ENABLED`: Alerting on/off (true/false)
//! - `DOSETRACK_DUE_CHECK_INTERVAL`: Due-check poll interval in seconds
//! - `DOSETRACK_SCAN_API_KEY`: Label-scan API key
//! - `DOSETRACK_SCAN_ENDPOINT`: Label-scan endpoint override
//! - `DOSETRACK_SCAN_MODEL`: Label-scan model name
//!
//! ## File Locations
//! The loader probes, in order: `./config.{json,toml}`,
//! `./dosetrack.{json,toml}`, the same names one and two directories
//! up, and next to the executable.

use std::path::{Path, PathBuf};

use dosetrack_domain::{Config, DoseTrackError, Result};

/// Load configuration with the layered strategy described in the
/// module docs.
pub fn load() -> Result<Config> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Format is
/// detected by extension (`.json` or `.toml`).
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DoseTrackError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DoseTrackError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DoseTrackError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DoseTrackError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DoseTrackError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DoseTrackError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file. Returns the first
/// one that exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let names = ["config.json", "config.toml", "dosetrack.json", "dosetrack.toml"];
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        for prefix in ["", "../", "../../"] {
            for name in names {
                candidates.push(cwd.join(format!("{prefix}{name}")));
            }
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            for name in names {
                candidates.push(exe_dir.join(name));
            }
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(path) = std::env::var("DOSETRACK_DB_PATH") {
        config.database.path = path;
    }
    if let Some(pool_size) = env_parse::<u32>("DOSETRACK_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Ok(addr) = std::env::var("DOSETRACK_BIND_ADDR") {
        config.server.bind_addr = addr;
    }
    if let Ok(user_id) = std::env::var("DOSETRACK_USER_ID") {
        config.server.user_id = user_id;
    }
    if let Some(minutes) = env_parse::<i64>("DOSETRACK_ADVANCE_MINUTES")? {
        config.notifications.advance_minutes = minutes;
    }
    if let Some(enabled) = env_bool("DOSETRACK_NOTIFICATIONS_ENABLED") {
        config.notifications.enabled = enabled;
    }
    if let Some(interval) = env_parse::<u64>("DOSETRACK_DUE_CHECK_INTERVAL")? {
        config.notifications.due_check_interval_secs = interval;
    }
    if let Ok(key) = std::env::var("DOSETRACK_SCAN_API_KEY") {
        config.scan.api_key = Some(key);
    }
    if let Ok(endpoint) = std::env::var("DOSETRACK_SCAN_ENDPOINT") {
        config.scan.endpoint = Some(endpoint);
    }
    if let Ok(model) = std::env::var("DOSETRACK_SCAN_MODEL") {
        config.scan.model = model;
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| DoseTrackError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`
/// (case-insensitive). `None` when the variable is unset.
fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_dosetrack_env() {
        for key in [
            "DOSETRACK_DB_PATH",
            "DOSETRACK_DB_POOL_SIZE",
            "DOSETRACK_BIND_ADDR",
            "DOSETRACK_USER_ID",
            "DOSETRACK_ADVANCE_MINUTES",
            "DOSETRACK_NOTIFICATIONS_ENABLED",
            "DOSETRACK_DUE_CHECK_INTERVAL",
            "DOSETRACK_SCAN_API_KEY",
            "DOSETRACK_SCAN_ENDPOINT",
            "DOSETRACK_SCAN_MODEL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_without_env_or_file() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_dosetrack_env();

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.database.path, "dosetrack.db");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.server.bind_addr, "127.0.0.1:7420");
        assert_eq!(config.notifications.advance_minutes, 15);
        assert!(config.notifications.enabled);
    }

    #[test]
    fn test_env_overrides_take_effect() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_dosetrack_env();

        std::env::set_var("DOSETRACK_DB_PATH", "/tmp/meds.db");
        std::env::set_var("DOSETRACK_DB_POOL_SIZE", "8");
        std::env::set_var("DOSETRACK_ADVANCE_MINUTES", "30");
        std::env::set_var("DOSETRACK_NOTIFICATIONS_ENABLED", "off");
        std::env::set_var("DOSETRACK_SCAN_API_KEY", "secret");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.database.path, "/tmp/meds.db");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.notifications.advance_minutes, 30);
        assert!(!config.notifications.enabled);
        assert_eq!(config.scan.api_key.as_deref(), Some("secret"));

        clear_dosetrack_env();
    }

    #[test]
    fn test_invalid_numeric_env_fails() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_dosetrack_env();

        std::env::set_var("DOSETRACK_DB_POOL_SIZE", "not-a-number");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        assert!(matches!(result, Err(DoseTrackError::Config(_))));

        clear_dosetrack_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[database]
path = "meds.db"
pool_size = 6

[server]
bind_addr = "0.0.0.0:9000"
user_id = "ana"

[notifications]
advance_minutes = 10
enabled = true
due_check_interval_secs = 30

[scan]
model = "gemini-2.0-flash"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("toml config");
        assert_eq!(config.database.path, "meds.db");
        assert_eq!(config.server.user_id, "ana");
        assert_eq!(config.notifications.advance_minutes, 10);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "database": { "path": "meds.db", "pool_size": 2 },
            "server": { "bind_addr": "127.0.0.1:7420", "user_id": "default" },
            "notifications": {
                "advance_minutes": 20,
                "enabled": false,
                "due_check_interval_secs": 15
            },
            "scan": { "api_key": null, "endpoint": null, "model": "gemini-2.0-flash" }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("json config");
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.notifications.advance_minutes, 20);
        assert!(!config.notifications.enabled);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(matches!(result, Err(DoseTrackError::Config(_))));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_content = r#"
[database]
path = "only-this.db"
pool_size = 4
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("partial config");
        assert_eq!(config.database.path, "only-this.db");
        // Sections absent from the file fall back to defaults.
        assert_eq!(config.server.bind_addr, "127.0.0.1:7420");
        assert_eq!(config.scan.model, "gemini-2.0-flash");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("anything", &PathBuf::from("test.yaml"));
        assert!(matches!(result, Err(DoseTrackError::Config(_))));
    }
}
