//! Chrome binary discovery.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Known Chrome binary locations, in search priority order.
///
/// The Lambda layer path comes first; the macOS bundles are last.
const KNOWN_PATHS: &[&str] = &[
    "/opt/chromium",
    "/opt/chrome/chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

/// Find a Chrome or Chromium binary.
///
/// Search order:
/// 1. `configured` (from settings, which already folds in `CHROME_PATH`)
/// 2. `CHROME_PATH` environment variable
/// 3. Known system paths
///
/// Returns `None` if no valid executable is found.
pub fn find_chrome(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if is_executable(path) {
            return Some(path.to_path_buf());
        }
        tracing::debug!(path = %path.display(), "configured Chrome path not executable, falling through");
    }

    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(&env_path);
        if is_executable(&path) {
            return Some(path);
        }
        tracing::debug!(path = %env_path, "CHROME_PATH set but not executable, falling through");
    }

    search_paths().into_iter().find(|path| {
        let found = is_executable(path);
        if found {
            tracing::debug!(path = %path.display(), "found Chrome binary");
        }
        found
    })
}

/// Return the ordered list of candidate paths (excluding overrides).
pub fn search_paths() -> Vec<PathBuf> {
    KNOWN_PATHS.iter().map(PathBuf::from).collect()
}

/// Check if a path exists and is executable.
fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}
