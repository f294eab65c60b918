use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;

use crate::config::UpdaterConfig;
use crate::download::Downloader;
use crate::error::{Result, UpdaterError};
use crate::install::{DetachedHelper, Handoff, InstallSettings, Installer};
use crate::paths::InstallLocation;
use crate::release::{GithubReleases, ReleaseLocator, ReleaseSource, UpdateInfo};
use crate::version::{Version, strip_tag_prefix};

pub const STATUS_CHECKING: &str = "Verificando atualizações...";
pub const STATUS_UP_TO_DATE: &str = "Já está atualizado";
pub const STATUS_DOWNLOADING: &str = "Baixando atualização...";
pub const STATUS_DOWNLOAD_FAILED: &str = "Erro no download";
pub const STATUS_APPLYING: &str = "Aplicando atualização...";
pub const STATUS_APPLIED: &str = "Atualização aplicada, reiniciando...";
pub const STATUS_FAILED: &str = "Erro na atualização";
pub const STATUS_BUSY: &str = "Atualização já em andamento";

const LOCK_FILE_NAME: &str = "relatorio-updater.lock";

const DOWNLOAD_START: u8 = 20;
const DOWNLOAD_SPAN: u8 = 70;
const APPLY_START: u8 = 90;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
}

impl UpdateOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Check, download and install, in that order. Built once by the application
/// controller and shared with the background worker through an `Arc`.
pub struct Updater {
    config: UpdaterConfig,
    current: Version,
    marker_candidates: Vec<PathBuf>,
    locator: ReleaseLocator,
    downloader: Downloader,
    installer: Installer,
    lock_path: PathBuf,
}

impl Updater {
    pub fn new(config: UpdaterConfig, location: InstallLocation, cwd: &Path) -> Result<Self> {
        let source = GithubReleases::new(&config.api_base, config.check_timeout())?;
        let handoff = DetachedHelper {
            staging_dir: crate::paths::staging_dir(),
            grace_delay: config.grace_delay(),
        };
        Self::with_parts(
            config,
            location,
            cwd,
            &crate::paths::staging_dir(),
            Box::new(source),
            Box::new(handoff),
        )
    }

    pub fn with_parts(
        config: UpdaterConfig,
        location: InstallLocation,
        cwd: &Path,
        staging_dir: &Path,
        source: Box<dyn ReleaseSource + Send + Sync>,
        handoff: Box<dyn Handoff + Send + Sync>,
    ) -> Result<Self> {
        let marker_candidates = crate::marker::candidates(&location.app_dir, cwd);
        let current = crate::version::read_current_version(&marker_candidates);

        let locator = ReleaseLocator::new(
            source,
            &config.repo_owner,
            &config.repo_name,
            &config.executable_name,
        );
        let downloader = Downloader::new(staging_dir, config.download_timeout())?;
        let installer = Installer::new(
            location,
            marker_candidates.clone(),
            InstallSettings {
                attempts: config.replace_attempts,
                retry_delay: config.retry_delay(),
                relaunch: config.relaunch,
            },
            handoff,
        );

        log::debug!(
            "updater for {}/{} at version {current}, executable {}",
            config.repo_owner,
            config.repo_name,
            installer.location().display_executable()
        );

        Ok(Self {
            config,
            current,
            marker_candidates,
            locator,
            downloader,
            installer,
            lock_path: staging_dir.join(LOCK_FILE_NAME),
        })
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn current_version(&self) -> &Version {
        &self.current
    }

    pub fn location(&self) -> &InstallLocation {
        self.installer.location()
    }

    pub fn check_for_update(&self) -> Option<UpdateInfo> {
        self.locator.check_for_update(&self.current)
    }

    pub fn locate(&self) -> Result<Option<UpdateInfo>> {
        self.locator.locate(&self.current)
    }

    /// Rewrites the version markers when the registry is ahead, without
    /// fetching the binary. Returns whether any marker was written.
    pub fn sync_version_marker_only(&mut self) -> bool {
        let (remote, release) = match self.locator.newer_version(&self.current) {
            Ok(Some(found)) => found,
            Ok(None) => {
                log::info!("version markers already current ({})", self.current);
                return false;
            }
            Err(e) => {
                log::warn!("version sync failed: {e}");
                return false;
            }
        };

        let targets = crate::marker::write_targets(&self.marker_candidates, &self.location().app_dir);
        let written = crate::marker::write_all(&targets, strip_tag_prefix(&release.tag_name));
        if written.is_empty() {
            log::warn!("no version marker could be written");
            return false;
        }

        self.current = remote;
        true
    }

    /// Runs the whole sequence. Every failure is folded into the outcome.
    pub fn update_if_available(&self, mut on_progress: Option<&mut dyn FnMut(&str, u8)>) -> UpdateOutcome {
        let mut report = |status: &str, pct: u8| {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(status, pct);
            }
        };

        let _lock = match self.lock_or_outcome() {
            Ok(lock) => lock,
            Err(outcome) => return outcome,
        };

        report(STATUS_CHECKING, 0);
        let Some(info) = self.check_for_update() else {
            report(STATUS_UP_TO_DATE, 100);
            return UpdateOutcome::failed(STATUS_UP_TO_DATE);
        };

        if !self.config.auto_update {
            log::info!("update {} found; auto_update is off", info.target_version);
            report(STATUS_UP_TO_DATE, 100);
            return UpdateOutcome::failed(format!(
                "Nova versão {} disponível",
                info.target_version
            ));
        }

        self.download_and_apply(&info, &mut report)
    }

    /// Installs an update the caller already located and confirmed, without
    /// querying the registry again. `auto_update` does not apply here.
    pub fn install_update(&self, info: &UpdateInfo, mut on_progress: Option<&mut dyn FnMut(&str, u8)>) -> UpdateOutcome {
        let mut report = |status: &str, pct: u8| {
            if let Some(cb) = on_progress.as_deref_mut() {
                cb(status, pct);
            }
        };

        let _lock = match self.lock_or_outcome() {
            Ok(lock) => lock,
            Err(outcome) => return outcome,
        };

        self.download_and_apply(info, &mut report)
    }

    /// Runs [`Updater::update_if_available`] on a worker thread. Both
    /// callbacks are invoked on that worker, never on the caller's thread.
    pub fn spawn_update<P, C>(self: Arc<Self>, mut on_progress: P, on_complete: C) -> std::thread::JoinHandle<()>
    where
        P: FnMut(&str, u8) + Send + 'static,
        C: FnOnce(bool, String) + Send + 'static,
    {
        std::thread::spawn(move || {
            let outcome = self.update_if_available(Some(&mut on_progress));
            on_complete(outcome.success, outcome.message);
        })
    }

    /// [`Updater::install_update`] on a worker thread, same callback rules as
    /// [`Updater::spawn_update`].
    pub fn spawn_install<P, C>(
        self: Arc<Self>,
        info: UpdateInfo,
        mut on_progress: P,
        on_complete: C,
    ) -> std::thread::JoinHandle<()>
    where
        P: FnMut(&str, u8) + Send + 'static,
        C: FnOnce(bool, String) + Send + 'static,
    {
        std::thread::spawn(move || {
            let outcome = self.install_update(&info, Some(&mut on_progress));
            on_complete(outcome.success, outcome.message);
        })
    }

    fn download_and_apply(&self, info: &UpdateInfo, report: &mut dyn FnMut(&str, u8)) -> UpdateOutcome {
        report(STATUS_DOWNLOADING, DOWNLOAD_START);
        let downloaded = {
            let mut on_download = |pct: u8| {
                let scaled = DOWNLOAD_START + (u16::from(pct.min(100)) * u16::from(DOWNLOAD_SPAN) / 100) as u8;
                report(STATUS_DOWNLOADING, scaled);
            };
            self.downloader.download(info, Some(&mut on_download))
        };
        let downloaded = match downloaded {
            Ok(path) => path,
            Err(e) => {
                log::error!("{e}");
                report(STATUS_DOWNLOAD_FAILED, 100);
                return UpdateOutcome::failed(format!("{STATUS_DOWNLOAD_FAILED}: {e}"));
            }
        };

        report(STATUS_APPLYING, APPLY_START);
        if let Err(e) = self.installer.apply(&downloaded, info) {
            log::error!("{e}");
            let _ = std::fs::remove_file(&downloaded);
            report(STATUS_FAILED, 100);
            return UpdateOutcome::failed(format!("{STATUS_FAILED}: {e}"));
        }

        report(STATUS_APPLIED, 100);
        UpdateOutcome::ok(format!("Atualização {} aplicada", info.target_version))
    }

    /// The update lock, or the outcome to return instead: "busy" only when
    /// another holder has it, the real error otherwise.
    fn lock_or_outcome(&self) -> std::result::Result<std::fs::File, UpdateOutcome> {
        match self.acquire_lock() {
            Ok(lock) => Ok(lock),
            Err(UpdaterError::UpdateInProgress) => {
                log::warn!("another update holds {}", self.lock_path.display());
                Err(UpdateOutcome::failed(STATUS_BUSY))
            }
            Err(e) => {
                log::error!("cannot take update lock {}: {e}", self.lock_path.display());
                Err(UpdateOutcome::failed(format!("{STATUS_FAILED}: {e}")))
            }
        }
    }

    fn acquire_lock(&self) -> Result<std::fs::File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if is_contended(&e) => Err(UpdaterError::UpdateInProgress),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    match (e.raw_os_error(), contended.raw_os_error()) {
        (Some(a), Some(b)) => a == b,
        _ => e.kind() == contended.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::HelperJob;
    use crate::install::tests::RecordingHandoff;
    use crate::paths::ExecutablePath;
    use crate::release::tests::{FixedRelease, release};
    use crate::test_support::Registry;
    use std::sync::Mutex;

    struct Fixture {
        dir: tempfile::TempDir,
        exe: PathBuf,
        handoff: RecordingHandoff,
    }

    impl Fixture {
        fn new(installed: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("app")).unwrap();
            std::fs::create_dir(dir.path().join("staging")).unwrap();
            let exe = dir.path().join("app").join("App");
            std::fs::write(&exe, b"old build").unwrap();
            std::fs::write(dir.path().join("app").join("VERSION"), installed).unwrap();
            Self {
                dir,
                exe,
                handoff: RecordingHandoff::default(),
            }
        }

        fn app_dir(&self) -> PathBuf {
            self.dir.path().join("app")
        }

        fn staging(&self) -> PathBuf {
            self.dir.path().join("staging")
        }

        fn updater(&self, config: UpdaterConfig, source: Box<dyn ReleaseSource + Send + Sync>) -> Updater {
            let location = InstallLocation {
                executable: ExecutablePath::Found(self.exe.clone()),
                app_dir: self.app_dir(),
                is_packaged_binary: true,
            };
            Updater::with_parts(
                config,
                location,
                &self.app_dir(),
                &self.staging(),
                source,
                Box::new(self.handoff.clone()),
            )
            .unwrap()
        }

        fn jobs(&self) -> Vec<HelperJob> {
            self.handoff.0.lock().unwrap().clone()
        }
    }

    fn config(api_base: &str) -> UpdaterConfig {
        UpdaterConfig {
            repo_owner: "o".into(),
            repo_name: "r".into(),
            executable_name: "App".into(),
            api_base: api_base.into(),
            check_timeout_secs: 5,
            download_timeout_secs: 5,
            ..UpdaterConfig::default()
        }
    }

    fn registry(asset: Vec<u8>) -> Registry {
        let registry = Registry::start();
        let base = registry.uri();
        registry.latest_release(
            "o",
            "r",
            serde_json::json!({
                "tag_name": "v1.3.0",
                "body": "fixes",
                "published_at": "2024-05-01T12:00:00Z",
                "assets": [{"name": "App", "browser_download_url": format!("{base}/download/App")}]
            }),
        );
        registry.asset("/download/App", asset);
        registry
    }

    #[test]
    fn end_to_end_reports_stages_and_hands_off() {
        let fx = Fixture::new("1.2.0");
        let registry = registry(vec![7u8; 30_000]);
        let source = GithubReleases::new(&registry.uri(), std::time::Duration::from_secs(5)).unwrap();
        let updater = fx.updater(config(&registry.uri()), Box::new(source));
        assert_eq!(updater.current_version(), &Version::parse("1.2.0"));

        let mut events: Vec<(String, u8)> = Vec::new();
        let mut cb = |s: &str, p: u8| events.push((s.to_string(), p));
        let outcome = updater.update_if_available(Some(&mut cb));

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(events.first().unwrap(), &(STATUS_CHECKING.to_string(), 0));
        assert_eq!(events.last().unwrap(), &(STATUS_APPLIED.to_string(), 100));

        let downloading: Vec<u8> = events
            .iter()
            .filter(|(s, _)| s == STATUS_DOWNLOADING)
            .map(|(_, p)| *p)
            .collect();
        assert_eq!(downloading.first(), Some(&20));
        assert_eq!(downloading.last(), Some(&90));
        assert!(downloading.windows(2).all(|w| w[0] <= w[1]));

        let stages: Vec<&str> = events.iter().map(|(s, _)| s.as_str()).collect();
        let applying = stages.iter().position(|s| *s == STATUS_APPLYING).unwrap();
        assert!(stages[..applying].contains(&STATUS_DOWNLOADING));
        assert_eq!(events[applying].1, 90);
        assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));

        let jobs = fx.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].version, "1.3.0");
        assert_eq!(jobs[0].target, fx.exe);
        assert_eq!(std::fs::read(&jobs[0].source).unwrap(), vec![7u8; 30_000]);
        assert_eq!(std::fs::read(&fx.exe).unwrap(), b"old build");
    }

    #[test]
    fn up_to_date_is_not_success() {
        let fx = Fixture::new("1.3.0");
        let updater = fx.updater(config(""), Box::new(FixedRelease::ok(release("v1.3.0", &["App"]))));

        let outcome = updater.update_if_available(None);
        assert_eq!(outcome, UpdateOutcome::failed(STATUS_UP_TO_DATE));
        assert!(fx.jobs().is_empty());
    }

    #[test]
    fn auto_update_off_only_reports() {
        let fx = Fixture::new("1.0.0");
        let mut cfg = config("");
        cfg.auto_update = false;
        let updater = fx.updater(cfg, Box::new(FixedRelease::ok(release("v2.0.0", &["App"]))));

        let outcome = updater.update_if_available(None);
        assert!(!outcome.success);
        assert!(outcome.message.contains("2.0.0"));
        assert!(fx.jobs().is_empty());
    }

    #[test]
    fn download_failure_keeps_app_untouched() {
        let fx = Fixture::new("1.0.0");
        let mut rel = release("v2.0.0", &["App"]);
        rel.assets[0].browser_download_url = "http://127.0.0.1:9/App".into();
        let updater = fx.updater(config(""), Box::new(FixedRelease::ok(rel)));

        let mut last = None;
        let mut cb = |s: &str, p: u8| last = Some((s.to_string(), p));
        let outcome = updater.update_if_available(Some(&mut cb));

        assert!(!outcome.success);
        assert!(outcome.message.starts_with(STATUS_DOWNLOAD_FAILED));
        assert_eq!(last, Some((STATUS_DOWNLOAD_FAILED.to_string(), 100)));
        assert!(fx.jobs().is_empty());
        assert_eq!(std::fs::read(&fx.exe).unwrap(), b"old build");
    }

    #[test]
    fn unresolved_location_refuses_install() {
        let fx = Fixture::new("1.2.0");
        let registry = registry(b"new".to_vec());
        let source = GithubReleases::new(&registry.uri(), std::time::Duration::from_secs(5)).unwrap();
        let location = InstallLocation {
            executable: ExecutablePath::Unresolved {
                guess: fx.app_dir().join("Missing"),
            },
            app_dir: fx.app_dir(),
            is_packaged_binary: false,
        };
        let updater = Updater::with_parts(
            config(&registry.uri()),
            location,
            &fx.app_dir(),
            &fx.staging(),
            Box::new(source),
            Box::new(fx.handoff.clone()),
        )
        .unwrap();

        let outcome = updater.update_if_available(None);
        assert!(!outcome.success);
        assert!(outcome.message.starts_with(STATUS_FAILED));
        assert!(fx.jobs().is_empty());
        assert_eq!(std::fs::read_dir(fx.staging()).unwrap().count(), 1);
    }

    #[test]
    fn held_lock_reports_busy() {
        let fx = Fixture::new("1.0.0");
        let updater = fx.updater(config(""), Box::new(FixedRelease::ok(release("v2.0.0", &["App"]))));

        let held = updater.acquire_lock().unwrap();
        let outcome = updater.update_if_available(None);
        assert_eq!(outcome, UpdateOutcome::failed(STATUS_BUSY));
        assert!(fx.jobs().is_empty());
        drop(held);

        assert!(updater.acquire_lock().is_ok());
    }

    #[test]
    fn sync_rewrites_markers_only() {
        let fx = Fixture::new("1.0.0");
        let mut updater = fx.updater(config(""), Box::new(FixedRelease::ok(release("v1.4.0", &[]))));

        assert!(updater.sync_version_marker_only());
        assert_eq!(updater.current_version(), &Version::parse("1.4.0"));
        assert_eq!(
            std::fs::read_to_string(fx.app_dir().join("VERSION")).unwrap(),
            "1.4.0"
        );
        assert_eq!(std::fs::read(&fx.exe).unwrap(), b"old build");
        assert!(fx.jobs().is_empty());
    }

    #[test]
    fn sync_is_noop_when_current() {
        let fx = Fixture::new("1.4.0");
        let mut updater = fx.updater(config(""), Box::new(FixedRelease::ok(release("1.4", &[]))));
        assert!(!updater.sync_version_marker_only());
    }

    #[test]
    fn lock_io_error_is_reported_not_busy() {
        let fx = Fixture::new("1.0.0");
        let location = InstallLocation {
            executable: ExecutablePath::Found(fx.exe.clone()),
            app_dir: fx.app_dir(),
            is_packaged_binary: true,
        };
        let updater = Updater::with_parts(
            config(""),
            location,
            &fx.app_dir(),
            &fx.dir.path().join("no-such-staging"),
            Box::new(FixedRelease::ok(release("v2.0.0", &["App"]))),
            Box::new(fx.handoff.clone()),
        )
        .unwrap();

        let outcome = updater.update_if_available(None);
        assert!(!outcome.success);
        assert_ne!(outcome.message, STATUS_BUSY);
        assert!(outcome.message.starts_with(STATUS_FAILED), "{outcome:?}");
        assert!(fx.jobs().is_empty());
    }

    #[test]
    fn sync_writes_tag_with_suffix() {
        let fx = Fixture::new("1.0.0");
        let mut updater = fx.updater(config(""), Box::new(FixedRelease::ok(release("v1.4.0-rc1", &[]))));

        assert!(updater.sync_version_marker_only());
        assert_eq!(
            std::fs::read_to_string(fx.app_dir().join("VERSION")).unwrap(),
            "1.4.0-rc1"
        );
    }

    #[test]
    fn confirmed_install_skips_registry_and_auto_update() {
        let fx = Fixture::new("1.2.0");
        let registry = Registry::start();
        registry.asset("/download/App", b"new build".to_vec());

        let mut cfg = config(&registry.uri());
        cfg.auto_update = false;
        // a second registry query would fail: FixedRelease answers once
        let updater = fx.updater(
            cfg,
            Box::new(FixedRelease::ok(release("v1.3.0-rc1", &["App"]))),
        );
        let mut info = updater.check_for_update().unwrap();
        info.download_url = format!("{}/download/App", registry.uri());

        let outcome = updater.install_update(&info, None);
        assert!(outcome.success, "{outcome:?}");

        let jobs = fx.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].version, "1.3.0-rc1");
        assert_eq!(std::fs::read(&jobs[0].source).unwrap(), b"new build");
    }

    #[test]
    fn async_variant_completes_off_thread() {
        let fx = Fixture::new("1.3.0");
        let updater = Arc::new(fx.updater(
            config(""),
            Box::new(FixedRelease::ok(release("v1.3.0", &["App"]))),
        ));

        let caller = std::thread::current().id();
        let result: Arc<Mutex<Option<(bool, String, bool)>>> = Arc::default();
        let slot = Arc::clone(&result);
        let handle = updater.spawn_update(
            |_, _| {},
            move |success, message| {
                let off_thread = std::thread::current().id() != caller;
                *slot.lock().unwrap() = Some((success, message, off_thread));
            },
        );
        handle.join().unwrap();

        let (success, message, off_thread) = result.lock().unwrap().clone().unwrap();
        assert!(!success);
        assert_eq!(message, STATUS_UP_TO_DATE);
        assert!(off_thread);
    }
}
