//! Persisted settings
//!
//! A small JSON file holding the preferred output and the locations of the
//! command line tools.  The routing core only ever reads it; the `output`
//! command is the one place that writes the preference back.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Analogue headphone jack of the embedded host.
pub const DEFAULT_SINK_PREFERENCE: &str = "alsa_output.platform-bcm2835_audio.analog-stereo";

/// Where the external tools live and who runs the sound server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub aconnect: String,
    pub pactl: String,
    pub sudo: String,
    /// Run `pactl` as this user (the system-wide sound server's owner)
    pub run_as: Option<String>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            aconnect: "/usr/bin/aconnect".to_string(),
            pactl: "/usr/bin/pactl".to_string(),
            sudo: "/usr/bin/sudo".to_string(),
            run_as: Some("pulse".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Technical name of the sink every USB input is looped to
    pub sink_preference: Option<String>,
    pub tools: ToolPaths,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sink_preference: Some(DEFAULT_SINK_PREFERENCE.to_string()),
            tools: ToolPaths::default(),
        }
    }
}

impl Settings {
    /// `<config_dir>/midipipes/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("midipipes").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut settings: Self = serde_json::from_str(&text).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        // An explicit null means "never chosen"
        if settings.sink_preference.is_none() {
            settings.sink_preference = Some(DEFAULT_SINK_PREFERENCE.to_string());
        }
        Ok(settings)
    }

    /// Like [`load`](Self::load), but writes the defaults out on first use so
    /// there is a file for the operator to edit.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let existed = path.exists();
        let settings = Self::load(path)?;
        if !existed {
            settings.save(path)?;
            log::info!("Wrote default settings to {}", path.display());
        }
        Ok(settings)
    }

    /// Settings for one run.  A dry run reads but never creates the file.
    pub fn load_for_run(path: &Path, dry_run: bool) -> Result<Self> {
        if dry_run {
            Self::load(path)
        } else {
            Self::load_or_init(path)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(
            settings.sink_preference.as_deref(),
            Some(DEFAULT_SINK_PREFERENCE)
        );
        assert_eq!(settings.tools, ToolPaths::default());
    }

    #[test]
    fn test_load_or_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        Settings::load_or_init(&path).unwrap();
        assert!(path.exists());

        let mut settings = Settings::load(&path).unwrap();
        settings.sink_preference = Some("alsa_output.usb-Foo".to_string());
        settings.save(&path).unwrap();

        // A second init must not clobber the operator's choice
        let settings = Settings::load_or_init(&path).unwrap();
        assert_eq!(settings.sink_preference.as_deref(), Some("alsa_output.usb-Foo"));
    }

    #[test]
    fn test_dry_run_does_not_write_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings::load_for_run(&path, true).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!path.exists());

        Settings::load_for_run(&path, false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "sink_preference": null, "tools": { "run_as": null } }"#)
            .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(
            settings.sink_preference.as_deref(),
            Some(DEFAULT_SINK_PREFERENCE)
        );
        assert_eq!(settings.tools.run_as, None);
        assert_eq!(settings.tools.pactl, "/usr/bin/pactl");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Settings { .. })));
    }
}
