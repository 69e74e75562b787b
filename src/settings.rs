//! Persistence model and configuration IO.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::modes::Mode;
use crate::wallpaper::StyleMode;

/// File name used under the per-user config directory.
const SETTINGS_FILE: &str = "settings.json";

/// Default image model served by Pollinations.
pub const DEFAULT_MODEL: &str = "flux";

/// Models selectable when the user supplies their own API key.
pub const AVAILABLE_MODELS: [&str; 6] = [
    "flux",
    "flux-realism",
    "flux-pro",
    "turbo",
    "midjourney",
    "dalle",
];

/// Resolutions offered in the UI. The flux model accepts arbitrary sizes,
/// these are the common desktop ones.
pub const SUPPORTED_RESOLUTIONS: [&str; 5] = [
    "1920x1080",
    "2560x1440",
    "3840x2160",
    "1366x768",
    "1280x720",
];

/// Allowed auto-change interval range in minutes.
pub const INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=240;

/// Settings persisted to `settings.json`.
///
/// Every field takes its default when absent from the file and unknown keys
/// are ignored, so older and newer settings files both load cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Wallpaper resolution as "WxH".
    pub resolution: String,
    /// Whether the app starts with the OS session.
    pub auto_start: bool,
    /// Whether prompts get random variety/lighting descriptors.
    pub enhance_prompts: bool,
    /// Mode restored on the next launch.
    pub last_mode: Mode,
    /// Auto-change period in minutes (clamped to 1..=240 on use).
    pub interval_minutes: u64,
    /// Whether the auto-change timer resumes on startup.
    pub auto_change: bool,
    /// Free-text prompt used by the custom mode.
    pub custom_prompt: String,
    /// Whether to minimize to the tray when launched at login.
    pub minimize_to_tray: bool,
    /// Pollinations model name.
    pub model: String,
    /// Optional user-supplied API key; empty means anonymous access.
    pub api_key: String,
    /// Windows wallpaper style.
    pub style: StyleMode,
    /// Folder generated wallpapers are written to; `None` means
    /// Pictures/PolliPaper.
    pub save_folder: Option<String>,
    /// Whether the first-run setup has been completed.
    pub setup_complete: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".to_string(),
            auto_start: false,
            enhance_prompts: true,
            last_mode: Mode::TimeOfDay,
            interval_minutes: 60,
            auto_change: false,
            custom_prompt: String::new(),
            minimize_to_tray: true,
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            style: StyleMode::Fill,
            save_folder: None,
            setup_complete: false,
        }
    }
}

impl AppSettings {
    /// Parse the stored "WxH" resolution, falling back to Full HD when the
    /// string is malformed.
    pub fn dimensions(&self) -> (u32, u32) {
        parse_resolution(&self.resolution).unwrap_or((1920, 1080))
    }

    /// Interval clamped to the supported range.
    pub fn interval(&self) -> std::time::Duration {
        let minutes = self
            .interval_minutes
            .clamp(*INTERVAL_RANGE.start(), *INTERVAL_RANGE.end());
        std::time::Duration::from_secs(minutes * 60)
    }
}

/// Parse a "WxH" string into a (width, height) pair.
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

/// Build the settings path and ensure the directory exists.
fn settings_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "pollipaper", "pollipaper")
        .ok_or_else(|| anyhow!("cannot determine config directory"))?;
    let config_dir = proj_dirs.config_dir();
    fs::create_dir_all(config_dir)?;
    Ok(config_dir.join(SETTINGS_FILE))
}

/// Load settings from disk, returning defaults when missing or unreadable.
pub fn load() -> AppSettings {
    let path = match settings_path() {
        Ok(path) => path,
        Err(_) => return AppSettings::default(),
    };
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return AppSettings::default(),
    };
    serde_json::from_str(&contents).unwrap_or_default()
}

/// Persist settings to disk as pretty JSON.
pub fn save(settings: &AppSettings) -> Result<()> {
    let path = settings_path()?;
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"resolution": "2560x1440"}"#).unwrap();
        assert_eq!(settings.resolution, "2560x1440");
        assert_eq!(settings.interval_minutes, 60);
        assert!(settings.enhance_prompts);
        assert_eq!(settings.last_mode, Mode::TimeOfDay);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings: AppSettings = serde_json::from_str(
            r#"{"interval_minutes": 15, "some_future_key": {"nested": true}}"#,
        )
        .unwrap();
        assert_eq!(settings.interval_minutes, 15);
    }

    #[test]
    fn resolution_parsing() {
        assert_eq!(parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_resolution("2560X1440"), Some((2560, 1440)));
        assert_eq!(parse_resolution("garbage"), None);
        assert_eq!(parse_resolution("0x1080"), None);

        let mut settings = AppSettings::default();
        settings.resolution = "not-a-size".into();
        assert_eq!(settings.dimensions(), (1920, 1080));
    }

    #[test]
    fn interval_is_clamped() {
        let mut settings = AppSettings::default();
        settings.interval_minutes = 0;
        assert_eq!(settings.interval(), std::time::Duration::from_secs(60));
        settings.interval_minutes = 100_000;
        assert_eq!(
            settings.interval(),
            std::time::Duration::from_secs(240 * 60)
        );
    }
}
