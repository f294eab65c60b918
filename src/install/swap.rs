use std::io::Write;
use std::path::{Path, PathBuf};

use super::HelperJob;
use crate::error::{Result, UpdaterError};

pub trait FileOps {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn copy(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()>;

    fn remove(&self, path: &Path) -> std::io::Result<()>;
}

/// Real filesystem. Copies land in a temp file next to the destination and
/// are renamed over it, keeping the destination's permissions if it exists.
pub struct StdFs;

impl FileOps for StdFs {
    fn copy(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        let dir = to.parent().unwrap_or_else(|| Path::new("."));
        let perms = match std::fs::metadata(to) {
            Ok(meta) => meta.permissions(),
            Err(_) => std::fs::metadata(from)?.permissions(),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut input = std::fs::File::open(from)?;
            std::io::copy(&mut input, tmp.as_file_mut())?;
            tmp.as_file_mut().flush()?;
            tmp.as_file_mut().sync_all()?;
        }
        std::fs::set_permissions(tmp.path(), perms)?;

        tmp.persist(to).map(|_| ()).map_err(|e| e.error)
    }

    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        std::fs::write(path, contents)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReport {
    pub attempts_used: u32,
    pub markers_written: Vec<PathBuf>,
}

/// Backup, replace, write markers, clean up. A replace that keeps failing is
/// undone from the backup before the error is returned.
pub fn run(job: &HelperJob, fs: &dyn FileOps) -> Result<SwapReport> {
    if !fs.exists(&job.source) {
        return Err(UpdaterError::MissingFile {
            role: "downloaded update",
            path: job.source.clone(),
        });
    }
    if !fs.exists(&job.target) {
        return Err(UpdaterError::MissingFile {
            role: "current executable",
            path: job.target.clone(),
        });
    }

    let backup = job.backup_path();
    log::info!("backing up {} to {}", job.target.display(), backup.display());
    fs.copy(&job.target, &backup)?;

    let attempts = job.attempts.max(1);
    let mut attempt = 0;
    let replaced = loop {
        attempt += 1;
        match fs.copy(&job.source, &job.target) {
            Ok(()) => break Ok(()),
            Err(e) if attempt < attempts => {
                log::warn!("replace attempt {attempt}/{attempts} failed: {e}");
                std::thread::sleep(job.retry_delay);
            }
            Err(e) => break Err(e),
        }
    };

    if let Err(source) = replaced {
        log::error!("replace failed after {attempts} attempts; restoring backup");
        let restored = match fs.copy(&backup, &job.target) {
            Ok(()) => {
                let _ = fs.remove(&backup);
                true
            }
            Err(e) => {
                log::error!("restore failed, backup kept at {}: {e}", backup.display());
                false
            }
        };
        return Err(UpdaterError::ReplaceFailed {
            path: job.target.clone(),
            attempts,
            restored,
            source,
        });
    }
    log::info!("replaced {} (attempt {attempt})", job.target.display());

    let mut markers_written = Vec::new();
    for marker in &job.markers {
        match fs.write(marker, job.version.trim()) {
            Ok(()) => markers_written.push(marker.clone()),
            Err(e) => log::warn!("cannot write version marker {}: {e}", marker.display()),
        }
    }

    for leftover in [&job.source, &backup] {
        if let Err(e) = fs.remove(leftover) {
            log::warn!("cannot remove {}: {e}", leftover.display());
        }
    }

    Ok(SwapReport {
        attempts_used: attempt,
        markers_written,
    })
}
