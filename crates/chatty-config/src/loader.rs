use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::Config;

/// Name of the config file in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "chatty.json";

/// Settings file written by the old desktop relay. Its `api_key`/`webhooks`
/// record loads as a [`Config`] unchanged.
pub const LEGACY_CONFIG_FILE: &str = "Ducks B. Chatty.json";

/// Find the config file by searching standard locations.
pub fn find_config_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_config_path_from(&cwd, dirs::home_dir().as_deref())
}

/// Search order: `<dir>/chatty.json`, the legacy settings file in `<dir>`,
/// `<home>/.chatty/config.json`. Falls back to the home location (created on
/// first save) or to `<dir>/chatty.json` without a home directory.
pub fn find_config_path_from(dir: &Path, home: Option<&Path>) -> PathBuf {
    let local = dir.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    let legacy = dir.join(LEGACY_CONFIG_FILE);
    if legacy.exists() {
        return legacy;
    }

    match home {
        Some(home) => home.join(".chatty").join("config.json"),
        None => local,
    }
}

fn is_legacy_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == std::ffi::OsStr::new(LEGACY_CONFIG_FILE))
}

/// Load configuration from a JSON file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Save configuration to a JSON file.
///
/// The legacy settings file keeps its `api_key` spelling so the old relay can
/// still read it.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let mut value = serde_json::to_value(config)?;
    if is_legacy_path(path) {
        if let Some(record) = value.as_object_mut() {
            if let Some(key) = record.remove("apiKey") {
                record.insert("api_key".to_string(), key);
            }
        }
    }
    let contents = serde_json::to_string_pretty(&value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file_wins_over_legacy_and_home() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "{}").unwrap();
        std::fs::write(dir.path().join(LEGACY_CONFIG_FILE), "{}").unwrap();

        let found = find_config_path_from(dir.path(), Some(home.path()));
        assert_eq!(found, dir.path().join(LOCAL_CONFIG_FILE));
    }

    #[test]
    fn legacy_settings_file_is_picked_up_and_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LEGACY_CONFIG_FILE),
            r#"{"api_key": "abc", "webhooks": {"global": "", "trade": "https://example.com/t", "cartel": ""}}"#,
        )
        .unwrap();

        let found = find_config_path_from(dir.path(), Some(home.path()));
        assert_eq!(found, dir.path().join(LEGACY_CONFIG_FILE));

        let cfg = load_config(&found).unwrap();
        assert_eq!(cfg.api_key, "abc");
        assert_eq!(cfg.webhooks.trade, "https://example.com/t");
    }

    #[test]
    fn nothing_present_defaults_to_home_then_local() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();

        assert_eq!(
            find_config_path_from(dir.path(), Some(home.path())),
            home.path().join(".chatty").join("config.json")
        );
        assert_eq!(
            find_config_path_from(dir.path(), None),
            dir.path().join(LOCAL_CONFIG_FILE)
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.json")).unwrap();
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.relay.catch_up_count, 5);
    }

    #[test]
    fn save_creates_parent_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut cfg = Config::default();
        cfg.api_key = "secret".into();
        cfg.webhooks.trade = "https://discord.com/api/webhooks/1/abc".into();
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.api_key, "secret");
        assert_eq!(loaded.webhooks.trade, "https://discord.com/api/webhooks/1/abc");
        assert!(loaded.webhooks.global.is_empty());
    }

    #[test]
    fn legacy_file_is_saved_in_its_own_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEGACY_CONFIG_FILE);

        let mut cfg = Config::default();
        cfg.api_key = "abc".into();
        save_config(&path, &cfg).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["api_key"], "abc");
        assert!(raw.get("apiKey").is_none());
        assert_eq!(load_config(&path).unwrap().api_key, "abc");
    }

    #[test]
    fn garbage_file_is_an_error_naming_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }
}
