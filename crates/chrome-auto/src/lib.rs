//! # chrome-auto
//!
//! Locate a Chromium / Google Chrome executable at runtime so that callers of
//! a CDP client never need to hard-code a browser path per machine.
//!
//! ## How it works
//!
//! On first call to [`locate_chrome`]:
//!
//! 1. Honours `CHROME_PATH` when it points to an existing executable.
//! 2. Searches every directory of `PATH` for the platform's well-known
//!    executable names (`google-chrome`, `chromium`, `chrome-headless-shell`, …).
//! 3. Probes the platform's default install locations
//!    (`/Applications/Google Chrome.app/…`, `C:\Program Files\…`).
//!
//! The first hit is cached for the lifetime of the process; subsequent calls
//! never touch the file system.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrome_auto::{locate_chrome, is_chrome_available};
//!
//! if is_chrome_available() {
//!     let path = locate_chrome().expect("checked above");
//!     println!("using {}", path.display());
//! }
//! ```
//!
//! ## Platform support
//!
//! | OS      | Executables searched on `PATH`                                          |
//! |---------|-------------------------------------------------------------------------|
//! | Linux   | `google-chrome`, `google-chrome-stable`, `chromium`, `chromium-browser`, `chrome-headless-shell`, `chrome` |
//! | macOS   | `chromium`, `google-chrome`, `chrome-headless-shell`                     |
//! | Windows | `chrome.exe`, `msedge.exe`, `chrome-headless-shell.exe`                  |
//!
//! ## Environment variable overrides
//!
//! - `CHROME_PATH`: path to an existing browser executable; skips discovery.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable holding an explicit browser executable path.
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by chrome-auto operations.
#[derive(Error, Debug)]
pub enum ChromeAutoError {
    /// The current OS has no known browser locations.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// `CHROME_PATH` was set but does not name an executable file.
    #[error("CHROME_PATH '{path}' is not an executable file")]
    EnvPathInvalid { path: PathBuf },

    /// Nothing usable was found on `PATH` or in the default locations.
    #[error(
        "No Chromium or Chrome executable found (searched {searched} locations).\n\
Install Chromium or set CHROME_PATH=/path/to/chrome."
    )]
    NotFound { searched: usize },
}

// ── Internal: platform metadata ──────────────────────────────────────────────

struct PlatformInfo {
    /// Executable file names looked up in each `PATH` directory.
    executable_names: &'static [&'static str],
    /// Absolute default install locations, probed after `PATH`.
    install_paths: &'static [&'static str],
}

fn detect_platform() -> Result<PlatformInfo, ChromeAutoError> {
    match std::env::consts::OS {
        "linux" => Ok(PlatformInfo {
            executable_names: &[
                "google-chrome",
                "google-chrome-stable",
                "chromium",
                "chromium-browser",
                "chrome-headless-shell",
                "chrome",
            ],
            install_paths: &[
                "/usr/bin/google-chrome",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
                "/opt/google/chrome/chrome",
            ],
        }),
        "macos" => Ok(PlatformInfo {
            executable_names: &["chromium", "google-chrome", "chrome-headless-shell"],
            install_paths: &[
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
            ],
        }),
        "windows" => Ok(PlatformInfo {
            executable_names: &["chrome.exe", "msedge.exe", "chrome-headless-shell.exe"],
            install_paths: &[
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
            ],
        }),
        os => Err(ChromeAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }),
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns `true` when [`locate_chrome`] would succeed.
pub fn is_chrome_available() -> bool {
    locate_chrome().is_ok()
}

/// Returns the path of a usable browser executable.
///
/// # Thread safety
///
/// Safe to call from multiple threads; discovery runs at most once per
/// process once it has succeeded.
pub fn locate_chrome() -> Result<PathBuf, ChromeAutoError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = resolve()?;

    // Ignore the race: both threads found a valid executable.
    let _ = RESOLVED_PATH.set(path.clone());

    Ok(path)
}

/// Searches each directory of a `PATH`-style value for the first of `names`
/// that is an executable file.
///
/// Directories are visited in order; within a directory, `names` are tried
/// in order.
pub fn find_in_path(names: &[&str], path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var).find_map(|dir| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| is_executable(candidate))
    })
}

/// Returns `true` when `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve() -> Result<PathBuf, ChromeAutoError> {
    // 1. Environment variable override.
    if let Some(env_path) = std::env::var_os(CHROME_PATH_ENV) {
        let p = PathBuf::from(env_path);
        if is_executable(&p) {
            return Ok(p);
        }
        return Err(ChromeAutoError::EnvPathInvalid { path: p });
    }

    let info = detect_platform()?;

    // 2. PATH lookup.
    if let Some(path_var) = std::env::var_os("PATH") {
        if let Some(found) = find_in_path(info.executable_names, &path_var) {
            return Ok(found);
        }
    }

    // 3. Default install locations.
    info.install_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| is_executable(p))
        .ok_or(ChromeAutoError::NotFound {
            searched: info.executable_names.len() + info.install_paths.len(),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn touch_executable(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        p
    }

    #[test]
    fn detect_platform_is_supported() {
        detect_platform().expect("current platform should be supported");
    }

    #[test]
    fn platform_info_fields_nonempty() {
        let info = detect_platform().unwrap();
        assert!(!info.executable_names.is_empty());
        assert!(!info.install_paths.is_empty());
    }

    #[test]
    fn find_in_path_respects_directory_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch_executable(second.path(), "chromium");
        let expected = touch_executable(first.path(), "chromium");

        let path_var =
            std::env::join_paths([first.path(), second.path()]).expect("joinable paths");
        assert_eq!(find_in_path(&["chromium"], &path_var), Some(expected));
    }

    #[test]
    fn find_in_path_misses_cleanly() {
        let empty = tempfile::tempdir().unwrap();
        let path_var = OsString::from(empty.path());
        assert_eq!(find_in_path(&["google-chrome"], &path_var), None);
    }

    #[test]
    fn directories_are_not_executables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("chromium")).unwrap();
        assert!(!is_executable(&dir.path().join("chromium")));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chromium"), b"").unwrap();
        let path_var = OsString::from(dir.path());
        assert_eq!(find_in_path(&["chromium"], &path_var), None);
    }
}
