mod args;
mod cmd_apply;
mod cmd_check;
mod cmd_sync;
mod cmd_update;
mod cmd_version;

pub use args::Cli;

use std::path::Path;

use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::paths::Probe;
use crate::update::Updater;

pub fn run(cli: Cli) -> Result<()> {
    let updater = || {
        build_updater(
            cli.repo.as_deref(),
            cli.app_dir.as_deref(),
            cli.config.as_deref(),
        )
    };

    match cli.command {
        args::Command::Check(args) => cmd_check::run(&updater()?, args),
        args::Command::Update(args) => cmd_update::run(updater()?, args),
        args::Command::SyncVersion => cmd_sync::run(updater()?),
        args::Command::Version => cmd_version::run(&updater()?),
        args::Command::ApplyUpdate(args) => cmd_apply::run(args),
    }
}

fn build_updater(repo: Option<&str>, app_dir: Option<&Path>, config: Option<&Path>) -> Result<Updater> {
    let cwd = std::env::current_dir()?;
    let current_exe = std::env::current_exe()?;
    let probe_dir = app_dir
        .or_else(|| current_exe.parent())
        .unwrap_or(&cwd)
        .to_path_buf();

    let candidates = crate::config::config_candidates(config, &probe_dir)?;
    let mut config = UpdaterConfig::load(&candidates)?;
    if let Some(repo) = repo {
        config.set_repo(repo)?;
    }

    let location = crate::paths::resolve_install_location(&Probe {
        executable_name: &config.executable_name,
        current_exe: &current_exe,
        app_dir_override: app_dir,
        cwd: &cwd,
    });

    Updater::new(config, location, &cwd)
}
