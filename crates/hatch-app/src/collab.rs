//! Host collaborators behind small seams: directory picking, home lookup,
//! and a best-effort external editor launcher.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Seam for "pick a directory" requests. The stdio build has no native
/// dialogs, so the default implementation declines every request.
pub trait DirectoryPicker: Send + Sync {
    fn pick_directory(&self) -> Option<PathBuf>;
}

/// Picker for environments without a display server.
pub struct HeadlessPicker;

impl DirectoryPicker for HeadlessPicker {
    fn pick_directory(&self) -> Option<PathBuf> {
        None
    }
}

/// The user's home directory, from the environment.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Try to open `path` in an external editor, best-effort.
///
/// `$VISUAL`/`$EDITOR` take precedence, then common GUI editors. Returns
/// `true` if any candidate launched; failure to launch is not an error.
pub fn open_in_editor(path: &Path) -> bool {
    let mut candidates: Vec<String> = Vec::new();
    for var in ["VISUAL", "EDITOR"] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                candidates.push(value);
            }
        }
    }
    for fallback in ["code", "zed", "subl"] {
        candidates.push(fallback.to_string());
    }

    for candidate in candidates {
        match Command::new(&candidate).arg(path).spawn() {
            Ok(_) => {
                log::info!("opened {} with {candidate}", path.display());
                return true;
            }
            Err(e) => log::debug!("editor candidate {candidate} failed: {e}"),
        }
    }
    false
}
