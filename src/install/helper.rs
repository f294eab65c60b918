use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::script::{self, Flavor};
use super::{Handoff, HelperJob};
use crate::error::Result;

/// Time the parent lingers after spawning so the helper gets going.
const PARENT_SETTLE: Duration = Duration::from_millis(500);

/// Production handoff: stages a copy of this binary, writes a helper script
/// next to it, starts the script detached and exits the process.
pub struct DetachedHelper {
    pub staging_dir: PathBuf,
    pub grace_delay: Duration,
}

impl Handoff for DetachedHelper {
    fn hand_off(&self, job: &HelperJob) -> Result<()> {
        let flavor = Flavor::native();
        let helper = stage_helper_binary(&self.staging_dir)?;

        let job = job.map_paths(short_path);
        let content = script::render(flavor, &short_path(&helper), &job, self.grace_delay);
        let script_path = match write_script(&self.staging_dir, flavor, &content) {
            Ok(path) => path,
            Err(e) => {
                remove_leftovers(&[helper]);
                return Err(e);
            }
        };

        log::info!("starting update helper {}", script_path.display());
        start_or_clean_up(&helper, &script_path, spawn_detached)?;

        log::info!("exiting so the helper can replace {}", job.target.display());
        std::thread::sleep(PARENT_SETTLE);
        std::process::exit(0);
    }
}

fn stage_helper_binary(dir: &Path) -> Result<PathBuf> {
    let current = std::env::current_exe()?;
    let mut tmp = tempfile::Builder::new()
        .prefix("relatorio-helper-")
        .suffix(std::env::consts::EXE_SUFFIX)
        .tempfile_in(dir)?;
    {
        let mut input = std::fs::File::open(&current)?;
        std::io::copy(&mut input, tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
    }
    std::fs::set_permissions(tmp.path(), std::fs::metadata(&current)?.permissions())?;

    let (_file, path) = tmp.keep().map_err(|e| e.error)?;
    Ok(path)
}

fn write_script(dir: &Path, flavor: Flavor, content: &str) -> Result<PathBuf> {
    let mut tmp = tempfile::Builder::new()
        .prefix("update_aplicar_")
        .suffix(flavor.extension())
        .tempfile_in(dir)?;
    tmp.as_file_mut().write_all(content.as_bytes())?;
    tmp.as_file_mut().flush()?;
    let (_file, path) = tmp.keep().map_err(|e| e.error)?;
    Ok(path)
}

/// Runs `spawn`; if it fails nothing will ever delete the staged files, so
/// they are removed here.
fn start_or_clean_up(
    helper: &Path,
    script: &Path,
    spawn: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    spawn(script).inspect_err(|e| {
        log::error!("cannot start update helper: {e}");
        remove_leftovers(&[helper.to_path_buf(), script.to_path_buf(), log_path_for(script)]);
    })
}

fn remove_leftovers(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot remove {}: {e}", path.display()),
        }
    }
}

/// Where the sh helper's output goes; the script deletes it on exit.
fn log_path_for(script: &Path) -> PathBuf {
    script.with_extension("log")
}

#[cfg(windows)]
fn spawn_detached(script: &Path) -> Result<()> {
    use std::os::windows::process::CommandExt;
    use windows_sys::Win32::System::Threading::CREATE_NEW_CONSOLE;

    Command::new("cmd")
        .arg("/C")
        .arg(short_path(script))
        .creation_flags(CREATE_NEW_CONSOLE)
        .stdin(Stdio::null())
        .spawn()?;
    Ok(())
}

#[cfg(not(windows))]
fn spawn_detached(script: &Path) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let log_path = log_path_for(script);
    let log = std::fs::File::create(&log_path)?;
    Command::new("/bin/sh")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log)
        .process_group(0)
        .spawn()?;
    log::debug!("helper output goes to {}", log_path.display());
    Ok(())
}

/// 8.3 form of `path` when the filesystem has one, so cmd never sees spaces
/// or non-ASCII characters. Falls back to the original path.
#[cfg(windows)]
pub fn short_path(path: &Path) -> PathBuf {
    use std::ffi::OsString;
    use std::os::windows::ffi::{OsStrExt, OsStringExt};
    use windows_sys::Win32::Storage::FileSystem::GetShortPathNameW;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let needed = unsafe { GetShortPathNameW(wide.as_ptr(), std::ptr::null_mut(), 0) };
    if needed == 0 {
        return path.to_path_buf();
    }

    let mut buf = vec![0u16; needed as usize];
    let len = unsafe { GetShortPathNameW(wide.as_ptr(), buf.as_mut_ptr(), needed) };
    if len == 0 || len >= needed {
        return path.to_path_buf();
    }
    PathBuf::from(OsString::from_wide(&buf[..len as usize]))
}

#[cfg(not(windows))]
pub fn short_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}

#[cfg(windows)]
pub fn wait_for_pid_exit_best_effort(pid: u32, timeout: Duration) {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, WaitForSingleObject};

    if pid == 0 {
        return;
    }

    const PROCESS_SYNCHRONIZE: u32 = 0x0010_0000;
    let handle = unsafe { OpenProcess(PROCESS_SYNCHRONIZE, 0, pid) };
    if handle.is_null() {
        return;
    }

    let ms = timeout.as_millis().min(u32::MAX as u128) as u32;
    let _ = unsafe { WaitForSingleObject(handle, ms) };
    let _ = unsafe { CloseHandle(handle) };
}

#[cfg(target_os = "linux")]
pub fn wait_for_pid_exit_best_effort(pid: u32, timeout: Duration) {
    if pid == 0 {
        return;
    }

    let proc_dir = Path::new("/proc").join(pid.to_string());
    let deadline = std::time::Instant::now() + timeout;
    while proc_dir.exists() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn wait_for_pid_exit_best_effort(_pid: u32, _timeout: Duration) {}
