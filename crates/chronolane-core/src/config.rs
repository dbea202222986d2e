//! TOML-based layout configuration.
//!
//! Stores rendering defaults for hosts:
//! - The visible time window (offset, pixel scale, paddings)
//! - Row metrics (height and spacing)
//!
//! Configuration is stored at `~/.config/chronolane/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coords::{RowMetrics, ViewWindow};
use crate::error::{ConfigError, Result};

/// Visible window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_padding")]
    pub left_padding: i64,
    #[serde(default = "default_padding")]
    pub right_padding: i64,
}

/// Row configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowConfig {
    #[serde(default = "default_row_height")]
    pub height: i64,
    #[serde(default = "default_row_spacing")]
    pub spacing: i64,
}

/// Layout configuration.
///
/// Serialized to/from TOML at `~/.config/chronolane/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub rows: RowConfig,
}

fn default_scale() -> f64 {
    1.0
}
fn default_padding() -> i64 {
    20
}
fn default_row_height() -> i64 {
    24
}
fn default_row_spacing() -> i64 {
    4
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            scale: default_scale(),
            left_padding: default_padding(),
            right_padding: default_padding(),
        }
    }
}

impl Default for RowConfig {
    fn default() -> Self {
        Self {
            height: default_row_height(),
            spacing: default_row_spacing(),
        }
    }
}

/// Returns `~/.config/chronolane[-dev]/` based on CHRONOLANE_ENV.
///
/// Set CHRONOLANE_ENV=dev to use the development directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CHRONOLANE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("chronolane-dev")
    } else {
        base_dir.join("chronolane")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

impl LayoutConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Number(n) if n.is_f64() => value
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Number(_) => value
                        .parse::<i64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?,
                    serde_json::Value::Object(_) => {
                        return Err(invalid("cannot overwrite a whole section".into()))
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, or return defaults if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, or return defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds
    /// invalid values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into())
            }
        };
        let cfg: LayoutConfig = toml::from_str(&content).map_err(ConfigError::from)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the mapper cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.view.scale.is_finite() || self.view.scale < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "view.scale".into(),
                message: format!("{} is not a finite non-negative number", self.view.scale),
            });
        }
        for (key, value) in [
            ("view.left_padding", self.view.left_padding),
            ("view.right_padding", self.view.right_padding),
            ("rows.height", self.rows.height),
            ("rows.spacing", self.rows.spacing),
        ] {
            if value < 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("{value} is negative"),
                });
            }
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or validate; `self` is left untouched in that case.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: LayoutConfig = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn view_window(&self) -> ViewWindow {
        ViewWindow {
            offset: self.view.offset,
            scale: self.view.scale,
            left_padding: self.view.left_padding,
            right_padding: self.view.right_padding,
        }
    }

    pub fn row_metrics(&self) -> RowMetrics {
        RowMetrics {
            row_height: self.rows.height,
            row_spacing: self.rows.spacing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_mapper_defaults() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.view_window(), ViewWindow::default());
        assert_eq!(cfg.row_metrics(), RowMetrics::default());
    }

    #[test]
    fn test_get_and_set_by_path() {
        let mut cfg = LayoutConfig::default();
        assert_eq!(cfg.get("view.left_padding").as_deref(), Some("20"));

        cfg.set("view.scale", "0.25").unwrap();
        cfg.set("rows.height", "30").unwrap();
        assert_eq!(cfg.view.scale, 0.25);
        assert_eq!(cfg.rows.height, 30);

        assert!(cfg.set("view.nope", "1").is_err());
        assert!(cfg.set("rows.height", "tall").is_err());
        assert!(cfg.set("view", "1").is_err());
        assert_eq!(cfg.get("missing"), None);
    }

    #[test]
    fn test_set_rejects_negative_scale() {
        let mut cfg = LayoutConfig::default();
        assert!(cfg.set("view.scale", "-2").is_err());
        assert_eq!(cfg.view.scale, 1.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: LayoutConfig = toml::from_str("[view]\nscale = 0.5\n").unwrap();
        assert_eq!(cfg.view.scale, 0.5);
        assert_eq!(cfg.view.left_padding, 20);
        assert_eq!(cfg.rows, RowConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert_eq!(LayoutConfig::load_from(&path).unwrap(), LayoutConfig::default());

        let mut cfg = LayoutConfig::default();
        cfg.view.offset = 1_000;
        cfg.save_to(&path).unwrap();
        assert_eq!(LayoutConfig::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rows]\nheight = -1\n").unwrap();
        assert!(LayoutConfig::load_from(&path).is_err());

        std::fs::write(&path, "not = [toml").unwrap();
        assert!(LayoutConfig::load_from(&path).is_err());
    }
}
