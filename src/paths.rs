use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Result, UpdaterError};

pub const APP_DIR_NAME: &str = "RelatorioTJMS";

pub fn user_config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join(APP_DIR_NAME))
}

pub fn staging_dir() -> PathBuf {
    std::env::temp_dir()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutablePath {
    Found(PathBuf),
    /// Nothing was found while probing; the guess is only usable if it
    /// exists by the time the installer asks for it.
    Unresolved { guess: PathBuf },
}

#[derive(Debug, Clone)]
pub struct InstallLocation {
    pub executable: ExecutablePath,
    pub app_dir: PathBuf,
    pub is_packaged_binary: bool,
}

impl InstallLocation {
    pub fn require_executable(&self) -> Result<&Path> {
        match &self.executable {
            ExecutablePath::Found(path) if path.is_file() => Ok(path),
            ExecutablePath::Found(path) => Err(UpdaterError::MissingFile {
                role: "current executable",
                path: path.clone(),
            }),
            ExecutablePath::Unresolved { guess } if guess.is_file() => {
                log::info!("late-resolved executable at {}", guess.display());
                Ok(guess)
            }
            ExecutablePath::Unresolved { guess } => Err(UpdaterError::UnresolvedLocation {
                guess: guess.clone(),
            }),
        }
    }

    pub fn display_executable(&self) -> String {
        match &self.executable {
            ExecutablePath::Found(p) => p.display().to_string(),
            ExecutablePath::Unresolved { guess } => format!("{} (unresolved)", guess.display()),
        }
    }
}

/// Inputs for [`resolve_install_location`], collected once at startup.
#[derive(Debug, Clone)]
pub struct Probe<'a> {
    pub executable_name: &'a str,
    pub current_exe: &'a Path,
    pub app_dir_override: Option<&'a Path>,
    pub cwd: &'a Path,
}

pub fn resolve_install_location(probe: &Probe<'_>) -> InstallLocation {
    let exe_dir = probe.current_exe.parent().unwrap_or(probe.cwd);

    let packaged = probe.app_dir_override.is_none()
        && probe
            .current_exe
            .file_name()
            .is_some_and(|n| same_name(&n.to_string_lossy(), probe.executable_name));

    if packaged {
        return InstallLocation {
            executable: ExecutablePath::Found(probe.current_exe.to_path_buf()),
            app_dir: exe_dir.to_path_buf(),
            is_packaged_binary: true,
        };
    }

    let mut app_dir = probe.app_dir_override.unwrap_or(exe_dir).to_path_buf();
    if !app_dir.is_dir() {
        log::debug!("app dir {} missing; using cwd", app_dir.display());
        app_dir = probe.cwd.to_path_buf();
    }

    let name = probe.executable_name;
    let candidates = [
        app_dir.join(name),
        app_dir.join("dist").join(name),
        probe.cwd.join(name),
        probe.cwd.join("dist").join(name),
    ];

    let executable = match candidates.iter().find(|p| p.is_file()) {
        Some(found) => ExecutablePath::Found(found.clone()),
        None => ExecutablePath::Unresolved {
            guess: app_dir.join(name),
        },
    };

    InstallLocation {
        executable,
        app_dir,
        is_packaged_binary: false,
    }
}

fn same_name(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}
