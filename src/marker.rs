use std::path::{Path, PathBuf};

use crate::error::Result;

pub const MARKER_NAMES: [&str; 2] = ["VERSION", "version"];

/// Ordered marker candidates: the app dir first, then the working dir.
pub fn candidates(app_dir: &Path, cwd: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(4);
    for dir in [app_dir, cwd] {
        for name in MARKER_NAMES {
            let path = dir.join(name);
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    out
}

/// Candidates that a new version should be written to: existing markers and
/// anything living directly in the app dir.
pub fn write_targets(candidates: &[PathBuf], app_dir: &Path) -> Vec<PathBuf> {
    candidates
        .iter()
        .filter(|p| p.is_file() || p.parent() == Some(app_dir))
        .cloned()
        .collect()
}

pub fn read_first<P: AsRef<Path>>(candidates: &[P]) -> Option<(PathBuf, String)> {
    for path in candidates {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let content = content.trim();
                if !content.is_empty() {
                    return Some((path.to_path_buf(), content.to_string()));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot read version marker {}: {e}", path.display()),
        }
    }
    None
}

pub fn write_one(path: &Path, version: &str) -> Result<()> {
    std::fs::write(path, version.trim())?;
    Ok(())
}

/// Writes `version` to every target, returning the ones that succeeded.
pub fn write_all(targets: &[PathBuf], version: &str) -> Vec<PathBuf> {
    let mut written = Vec::new();
    for path in targets {
        match write_one(path, version) {
            Ok(()) => {
                log::info!("version marker updated: {}", path.display());
                written.push(path.clone());
            }
            Err(e) => log::warn!("cannot write version marker {}: {e}", path.display()),
        }
    }
    written
}
