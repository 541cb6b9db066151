use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BursarError, Result};

/// Notification settings, persisted as a small JSON blob. Loaded once at
/// startup; saved on every mutation. Unknown/missing fields fall back to
/// the defaults so old settings files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub min_amount: f64,
    #[serde(default = "default_enabled")]
    pub include_credits: bool,
    #[serde(default = "default_enabled")]
    pub include_debits: bool,
    #[serde(default)]
    pub exclude_categories: Vec<String>,
    #[serde(default)]
    pub exclude_vendors: Vec<String>,
    #[serde(default = "default_cooldown")]
    pub notification_cooldown: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_cooldown() -> u64 {
    300
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_amount: 0.0,
            include_credits: true,
            include_debits: true,
            exclude_categories: Vec::new(),
            exclude_vendors: Vec::new(),
            notification_cooldown: 300,
        }
    }
}

impl NotificationSettings {
    /// Apply a `notify set <key> <value>` mutation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "enabled" => self.enabled = parse_bool(key, value)?,
            "min_amount" => {
                self.min_amount = value
                    .parse()
                    .map_err(|_| BursarError::Settings(format!("invalid amount: {value}")))?
            }
            "include_credits" => self.include_credits = parse_bool(key, value)?,
            "include_debits" => self.include_debits = parse_bool(key, value)?,
            "notification_cooldown" => {
                self.notification_cooldown = value
                    .parse()
                    .map_err(|_| BursarError::Settings(format!("invalid cooldown: {value}")))?
            }
            "exclude_categories" => self.exclude_categories = parse_list(value),
            "exclude_vendors" => self.exclude_vendors = parse_list(value),
            _ => {
                return Err(BursarError::Settings(format!(
                    "unknown setting: {key} (expected one of enabled, min_amount, \
                     include_credits, include_debits, notification_cooldown, \
                     exclude_categories, exclude_vendors)"
                )))
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "yes" => Ok(true),
        "false" | "off" | "no" => Ok(false),
        _ => Err(BursarError::Settings(format!("{key} expects true/false, got: {value}"))),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("bursar")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> NotificationSettings {
    load_settings_from(&settings_path())
}

pub fn load_settings_from(path: &PathBuf) -> NotificationSettings {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        NotificationSettings::default()
    }
}

pub fn save_settings(settings: &NotificationSettings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn save_settings_to(settings: &NotificationSettings, path: &PathBuf) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = NotificationSettings::default();
        settings.min_amount = 50.0;
        settings.exclude_vendors = vec!["Gusto".to_string()];
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path);
        assert_eq!(loaded.min_amount, 50.0);
        assert_eq!(loaded.exclude_vendors, vec!["Gusto".to_string()]);
        assert!(loaded.enabled);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("absent.json"));
        assert!(s.enabled);
        assert_eq!(s.notification_cooldown, 300);
        assert_eq!(s.min_amount, 0.0);
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let json = r#"{"min_amount": 25.0, "include_credits": false}"#;
        let s: NotificationSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.min_amount, 25.0);
        assert!(!s.include_credits);
        assert!(s.include_debits);
        assert_eq!(s.notification_cooldown, 300);
    }

    #[test]
    fn test_set_parses_values() {
        let mut s = NotificationSettings::default();
        s.set("enabled", "off").unwrap();
        assert!(!s.enabled);
        s.set("min_amount", "12.5").unwrap();
        assert_eq!(s.min_amount, 12.5);
        s.set("notification_cooldown", "600").unwrap();
        assert_eq!(s.notification_cooldown, 600);
        s.set("exclude_categories", "payroll, taxes").unwrap();
        assert_eq!(s.exclude_categories, vec!["payroll", "taxes"]);
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut s = NotificationSettings::default();
        assert!(s.set("enabled", "maybe").is_err());
        assert!(s.set("min_amount", "lots").is_err());
        assert!(s.set("color", "red").is_err());
    }
}
