use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "switcher.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub poll_interval_ms: u64,
    pub observer_row_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/switcher.db".into(),
            poll_interval_ms: 1000,
            observer_row_height: 80,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    poll_interval_ms: Option<u64>,
    observer_row_height: Option<u32>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `path` if it parses, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.poll_interval_ms {
                    settings.poll_interval_ms = v;
                }
                if let Some(v) = file_cfg.observer_row_height {
                    settings.observer_row_height = v;
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("SWITCHER_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval_ms = parsed;
        }
    }

    if let Some(v) = env("APP__OBSERVER_ROW_HEIGHT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.observer_row_height = parsed;
        }
    }

    settings
}

/// Turns a plain path or a bare `sqlite:` path into a `sqlite://` url.
///
/// Parent directories are created by `Storage::new`.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url);
    format!("sqlite://{}", path.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
