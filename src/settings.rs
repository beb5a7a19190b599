use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::survey::InstrumentHeight;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const BACKEND_URL_ENV: &str = "EM31_BACKEND_URL";

/// Instrument height used until the user stores another default.
pub const FACTORY_INSTRUMENT_HEIGHT: InstrumentHeight = InstrumentHeight::from_const(0.15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Substitute for invalid instrument height input, in metres.
    pub default_instrument_height: InstrumentHeight,
    pub backend_url: String,
    pub tile_url_template: String,
    pub health_timeout_ms: u64,
    pub health_retry_ms: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            default_instrument_height: FACTORY_INSTRUMENT_HEIGHT,
            backend_url: "http://127.0.0.1:8000".into(),
            tile_url_template: "/tiles/{z}/{x}/{y}.png".into(),
            health_timeout_ms: 15_000,
            health_retry_ms: 400,
            canvas_width: 800,
            canvas_height: 500,
        }
    }
}

impl ViewerSettings {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn health_retry(&self) -> Duration {
        Duration::from_millis(self.health_retry_ms)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ViewerSettings>,
}

impl SettingsStore {
    /// Opens the settings file. A missing, unreadable or corrupt file yields
    /// the defaults; it is rewritten on the next update.
    pub fn new(path: PathBuf) -> Self {
        let data = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                    log_warn!("Ignoring invalid settings in {}: {err}", path.display());
                    ViewerSettings::default()
                }),
                Err(err) => {
                    log_warn!("Failed to read settings from {}: {err}", path.display());
                    ViewerSettings::default()
                }
            }
        } else {
            ViewerSettings::default()
        };

        Self {
            path,
            data: RwLock::new(data),
        }
    }

    pub fn snapshot(&self) -> ViewerSettings {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn default_instrument_height(&self) -> InstrumentHeight {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .default_instrument_height
    }

    /// Validates and stores a new default instrument height.
    pub fn update_default_instrument_height(&self, raw: &str) -> Result<InstrumentHeight> {
        let height = InstrumentHeight::parse(raw)?;
        self.update(|settings| settings.default_instrument_height = height)?;
        Ok(height)
    }

    /// Stored backend URL unless `EM31_BACKEND_URL` overrides it.
    pub fn backend_url(&self) -> String {
        match std::env::var(BACKEND_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => self.data.read().unwrap_or_else(PoisonError::into_inner).backend_url.clone(),
        }
    }

    pub fn update(&self, change: impl FnOnce(&mut ViewerSettings)) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &ViewerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.snapshot(), ViewerSettings::default());
        assert_eq!(store.default_instrument_height().meters(), 0.15);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");
        let store = SettingsStore::new(path.clone());
        assert_eq!(store.snapshot(), ViewerSettings::default());

        fs::write(&path, r#"{"default_instrument_height": -1}"#).expect("write");
        assert_eq!(SettingsStore::new(path).snapshot(), ViewerSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"canvas_width": 1024}"#).expect("write");
        let settings = SettingsStore::new(path).snapshot();
        assert_eq!(settings.canvas_width, 1024);
        assert_eq!(settings.canvas_height, 500);
    }

    #[test]
    fn test_update_height_validates_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone());

        assert!(store.update_default_instrument_height("abc").is_err());
        assert!(store.update_default_instrument_height("-0.5").is_err());
        assert!(!path.exists());

        let height = store.update_default_instrument_height("0,3").expect("valid height");
        assert_eq!(height.meters(), 0.3);
        let reopened = SettingsStore::new(path);
        assert_eq!(reopened.default_instrument_height().meters(), 0.3);
    }
}
