mod helper;
pub mod script;
pub mod swap;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, UpdaterError};
use crate::paths::InstallLocation;
use crate::release::UpdateInfo;

pub use helper::{DetachedHelper, wait_for_pid_exit_best_effort};

/// Everything the helper process needs, as literal values. The helper
/// re-derives nothing from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperJob {
    pub parent_pid: u32,
    pub source: PathBuf,
    pub target: PathBuf,
    pub version: String,
    pub markers: Vec<PathBuf>,
    pub attempts: u32,
    pub retry_delay: Duration,
    pub relaunch: bool,
}

impl HelperJob {
    pub fn backup_path(&self) -> PathBuf {
        backup_path_for(&self.target)
    }

    /// Arguments for the hidden `apply-update` subcommand.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "apply-update".into(),
            "--pid".into(),
            self.parent_pid.to_string().into(),
            "--src".into(),
            self.source.clone().into(),
            "--dst".into(),
            self.target.clone().into(),
            "--version".into(),
            self.version.clone().into(),
            "--attempts".into(),
            self.attempts.to_string().into(),
            "--retry-delay-ms".into(),
            self.retry_delay.as_millis().to_string().into(),
        ];
        for marker in &self.markers {
            args.push("--marker".into());
            args.push(marker.clone().into());
        }
        if self.relaunch {
            args.push("--relaunch".into());
        }
        args
    }

    pub fn map_paths(&self, f: impl Fn(&Path) -> PathBuf) -> Self {
        Self {
            source: f(&self.source),
            target: f(&self.target),
            markers: self.markers.iter().map(|m| f(m)).collect(),
            ..self.clone()
        }
    }
}

pub fn backup_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// The terminal step of an install: hands the job to something that outlives
/// this process. On success the production implementation never returns.
pub trait Handoff {
    fn hand_off(&self, job: &HelperJob) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub relaunch: bool,
}

pub struct Installer {
    location: InstallLocation,
    marker_candidates: Vec<PathBuf>,
    settings: InstallSettings,
    handoff: Box<dyn Handoff + Send + Sync>,
}

impl Installer {
    pub fn new(
        location: InstallLocation,
        marker_candidates: Vec<PathBuf>,
        settings: InstallSettings,
        handoff: Box<dyn Handoff + Send + Sync>,
    ) -> Self {
        Self {
            location,
            marker_candidates,
            settings,
            handoff,
        }
    }

    pub fn location(&self) -> &InstallLocation {
        &self.location
    }

    /// Verifies both ends of the swap, then delegates the swap itself to the
    /// helper. Nothing on disk is touched when a precondition fails.
    pub fn apply(&self, downloaded: &Path, info: &UpdateInfo) -> Result<()> {
        if !downloaded.is_file() {
            return Err(UpdaterError::MissingFile {
                role: "downloaded update",
                path: downloaded.to_path_buf(),
            });
        }

        let target = self.location.require_executable().inspect_err(|e| {
            log::error!("refusing to install: {e}");
        })?;

        let job = HelperJob {
            parent_pid: std::process::id(),
            source: downloaded.to_path_buf(),
            target: target.to_path_buf(),
            version: info.tag_version.clone(),
            markers: crate::marker::write_targets(&self.marker_candidates, &self.location.app_dir),
            attempts: self.settings.attempts.max(1),
            retry_delay: self.settings.retry_delay,
            relaunch: self.settings.relaunch,
        };

        log::info!(
            "installing {} over {} ({} marker(s))",
            job.source.display(),
            job.target.display(),
            job.markers.len()
        );
        self.handoff.hand_off(&job)
    }
}
