use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::normalize::Persist;
use crate::error::{CalibError, Result};

/// File name of the settings document inside the application directory.
pub const SETTINGS_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Host settings. Created once at startup and passed to whoever needs it.
///
/// Missing keys fall back to their defaults, so settings files written by
/// older versions keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Host-owned display and acquisition preferences; stored here, read by
    // the host application.
    pub plot_log_y: bool,
    pub calculate_on_open: bool,
    pub signal_channel: u32,
    pub tag_channel: u32,
    pub peak_fwhm_us: f64,
    pub theme: Theme,
    /// Write normalization fixes back when a calibration is opened.
    pub rewrite_on_load: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plot_log_y: true,
            calculate_on_open: true,
            signal_channel: 1,
            tag_channel: 2,
            peak_fwhm_us: 0.02,
            theme: Theme::Light,
            rewrite_on_load: true,
        }
    }
}

impl Settings {
    /// Defaults when `path` does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| CalibError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CalibError::io(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CalibError::io(path, e))
    }

    /// How opening a calibration treats normalization fixes.
    pub fn persist_on_load(&self) -> Persist {
        if self.rewrite_on_load {
            Persist::IfChanged
        } else {
            Persist::Never
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.persist_on_load(), Persist::IfChanged);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"theme": "dark", "rewrite_on_load": false}"#).unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.signal_channel, 1);
        assert_eq!(s.persist_on_load(), Persist::Never);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let s = Settings {
            peak_fwhm_us: 0.05,
            ..Settings::default()
        };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ theme: ").unwrap();
        assert!(matches!(Settings::load(&path), Err(CalibError::Json(_))));
    }
}
