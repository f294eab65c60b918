use std::process::Command;
use std::time::Duration;

use crate::error::Result;
use crate::install::swap::{self, StdFs};

const PARENT_EXIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Helper entry point: runs inside the detached helper process after the
/// application has exited.
pub fn run(args: super::args::ApplyUpdateArgs) -> Result<()> {
    let job = args.into_job();
    log::info!("waiting for pid {} to exit", job.parent_pid);
    crate::install::wait_for_pid_exit_best_effort(job.parent_pid, PARENT_EXIT_TIMEOUT);

    let report = swap::run(&job, &StdFs)?;
    println!(
        "updated: {} -> v{} (attempt {})",
        job.target.display(),
        job.version,
        report.attempts_used
    );
    for marker in &report.markers_written {
        println!("marker:  {}", marker.display());
    }

    if job.relaunch {
        let mut cmd = Command::new(&job.target);
        if let Some(dir) = job.target.parent() {
            cmd.current_dir(dir);
        }
        // the new binary stays in place even if it cannot be started
        match cmd.spawn() {
            Ok(_) => println!("restarted: {}", job.target.display()),
            Err(e) => log::error!("cannot restart {}: {e}", job.target.display()),
        }
    }
    Ok(())
}
