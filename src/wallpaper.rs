//! Wallpaper file output and the OS wallpaper primitives.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use log::{info, warn};
use thiserror::Error;
use walkdir::WalkDir;

/// Subfolder of the Pictures directory where generated wallpapers accumulate.
const OUTPUT_SUBDIR: &str = "PolliPaper";

/// Failure modes of the apply stage.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("cannot determine the Pictures folder")]
    NoPicturesFolder,
    #[error("failed to write wallpaper file: {0}")]
    DiskWrite(#[from] std::io::Error),
    #[error("failed to set desktop wallpaper: {0}")]
    WallpaperApply(String),
}

/// Windows wallpaper style applied alongside the image.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StyleMode {
    Fill,
    Fit,
    Stretch,
    Tile,
    Center,
    Span,
}

impl Default for StyleMode {
    fn default() -> Self {
        StyleMode::Fill
    }
}

impl StyleMode {
    pub const ALL: [StyleMode; 6] = [
        StyleMode::Fill,
        StyleMode::Fit,
        StyleMode::Stretch,
        StyleMode::Tile,
        StyleMode::Center,
        StyleMode::Span,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StyleMode::Fill => "Fill",
            StyleMode::Fit => "Fit",
            StyleMode::Stretch => "Stretch",
            StyleMode::Tile => "Tile",
            StyleMode::Center => "Center",
            StyleMode::Span => "Span",
        }
    }
}

/// Default output folder: Pictures/PolliPaper.
pub fn default_output_dir() -> Result<PathBuf, ApplyError> {
    let dirs = UserDirs::new().ok_or(ApplyError::NoPicturesFolder)?;
    let pictures = dirs.picture_dir().ok_or(ApplyError::NoPicturesFolder)?;
    Ok(pictures.join(OUTPUT_SUBDIR))
}

/// Write image bytes to a uniquely named file under `dir`.
///
/// Existing wallpapers are never overwritten; history accumulates on disk
/// until the user clears the folder themselves.
pub fn save_image(bytes: &[u8], dir: &Path) -> Result<PathBuf, ApplyError> {
    fs::create_dir_all(dir)?;
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("png");
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let mut path = dir.join(format!("wallpaper_{stamp}.{ext}"));
    let mut counter = 1u32;
    while path.exists() {
        path = dir.join(format!("wallpaper_{stamp}_{counter}.{ext}"));
        counter += 1;
    }

    fs::write(&path, bytes)?;
    info!("saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}

/// Persist the image and set it as the desktop background.
///
/// If the OS call fails after a successful write, the fresh file is removed
/// best-effort so a wallpaper that was never applied does not linger.
pub fn apply(bytes: &[u8], dir: &Path) -> Result<PathBuf, ApplyError> {
    let path = save_image(bytes, dir)?;
    if let Err(err) = set_wallpaper(&path) {
        if let Err(cleanup) = fs::remove_file(&path) {
            warn!(
                "could not remove unapplied wallpaper {}: {cleanup}",
                path.display()
            );
        }
        return Err(err);
    }
    Ok(path)
}

#[cfg(windows)]
pub fn set_wallpaper(path: &Path) -> Result<(), ApplyError> {
    use std::os::windows::ffi::OsStrExt;
    use windows::Win32::UI::WindowsAndMessaging::{
        SystemParametersInfoW, SPI_SETDESKWALLPAPER, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE,
    };

    let wide_path: Vec<u16> = OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(wide_path.as_ptr() as *mut _),
            SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
        )
    }
    .map_err(|err| ApplyError::WallpaperApply(format!("SystemParametersInfoW failed: {err}")))?;
    Ok(())
}

#[cfg(not(windows))]
pub fn set_wallpaper(path: &Path) -> Result<(), ApplyError> {
    use std::process::Command;

    // Best-effort desktop-environment dispatch for non-Windows sessions.
    let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default();
    let uri = format!("file://{}", path.display());
    let status = if desktop.to_lowercase().contains("gnome") || desktop.is_empty() {
        Command::new("gsettings")
            .args(["set", "org.gnome.desktop.background", "picture-uri", &uri])
            .status()
    } else {
        return Err(ApplyError::WallpaperApply(format!(
            "unsupported desktop environment: {desktop}"
        )));
    };
    match status {
        Ok(code) if code.success() => Ok(()),
        Ok(code) => Err(ApplyError::WallpaperApply(format!(
            "wallpaper command exited with {code}"
        ))),
        Err(err) => Err(ApplyError::WallpaperApply(err.to_string())),
    }
}

/// Write the Windows wallpaper style registry values.
#[cfg(windows)]
pub fn set_wallpaper_style(mode: StyleMode) -> Result<(), ApplyError> {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_SET_VALUE};
    use winreg::RegKey;

    let (style, tile) = match mode {
        StyleMode::Fill => ("10", "0"),
        StyleMode::Fit => ("6", "0"),
        StyleMode::Stretch => ("2", "0"),
        StyleMode::Tile => ("0", "1"),
        StyleMode::Center => ("0", "0"),
        StyleMode::Span => ("22", "0"),
    };
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let desktop = hkcu
        .open_subkey_with_flags("Control Panel\\Desktop", KEY_SET_VALUE)
        .map_err(|err| ApplyError::WallpaperApply(err.to_string()))?;
    // WallpaperStyle / TileWallpaper values understood by Windows.
    desktop
        .set_value("WallpaperStyle", &style)
        .map_err(|err| ApplyError::WallpaperApply(err.to_string()))?;
    desktop
        .set_value("TileWallpaper", &tile)
        .map_err(|err| ApplyError::WallpaperApply(err.to_string()))?;
    Ok(())
}

/// Style is a Windows registry concept; a no-op elsewhere.
#[cfg(not(windows))]
pub fn set_wallpaper_style(_mode: StyleMode) -> Result<(), ApplyError> {
    Ok(())
}

/// Return true when the file extension is a supported image type.
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) => matches!(
            ext.to_ascii_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "bmp" | "gif" | "webp"
        ),
        None => false,
    }
}

/// List previously generated wallpapers in the output folder, newest first.
/// Timestamped names make lexicographic order chronological.
pub fn list_generated(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_image(path))
        .collect();
    images.sort();
    images.reverse();
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pollipaper_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn saved_file_contains_exact_bytes() {
        let dir = temp_dir("save");
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[9, 9, 9, 9]);

        let path = save_image(&bytes, &dir).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert_eq!(path.extension().unwrap(), "png");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn repeated_saves_never_overwrite() {
        let dir = temp_dir("unique");
        let first = save_image(&PNG_MAGIC, &dir).unwrap();
        let second = save_image(&PNG_MAGIC, &dir).unwrap();
        let third = save_image(&PNG_MAGIC, &dir).unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(first.exists() && second.exists() && third.exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_bytes_fall_back_to_png_extension() {
        let dir = temp_dir("ext");
        let path = save_image(b"definitely not an image", &dir).unwrap();
        assert_eq!(path.extension().unwrap(), "png");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn history_lists_images_newest_first() {
        let dir = temp_dir("history");
        fs::write(dir.join("wallpaper_20240101_000000.png"), PNG_MAGIC).unwrap();
        fs::write(dir.join("wallpaper_20250101_000000.png"), PNG_MAGIC).unwrap();
        fs::write(dir.join("notes.txt"), b"not an image").unwrap();

        let listed = list_generated(&dir);
        assert_eq!(listed.len(), 2);
        assert!(listed[0].ends_with("wallpaper_20250101_000000.png"));
        assert!(listed[1].ends_with("wallpaper_20240101_000000.png"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_history_folder_is_just_empty() {
        let dir = temp_dir("none").join("does_not_exist");
        assert!(list_generated(&dir).is_empty());
    }
}
