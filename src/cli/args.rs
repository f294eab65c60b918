use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::install::HelperJob;

#[derive(Debug, Parser)]
#[command(
    name = "relatorio-updater",
    version,
    about = "relatorio-updater - keeps RelatorioTJMS on its latest GitHub release"
)]
pub struct Cli {
    /// GitHub repository as owner/name (overrides the config file)
    #[arg(long, global = true, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// directory holding the installed executable and its VERSION file
    #[arg(long, global = true)]
    pub app_dir: Option<PathBuf>,

    /// config file to use instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// more log output (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// check the release registry for a newer version
    Check(CheckArgs),

    /// download and install the latest release, then restart the app
    Update(UpdateArgs),

    /// rewrite the VERSION files to the latest release without downloading
    SyncVersion,

    /// show the installed version and where the app was found
    Version,

    #[command(hide = true)]
    ApplyUpdate(ApplyUpdateArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// print the release notes of an available update
    #[arg(long)]
    pub notes: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// skip confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ApplyUpdateArgs {
    /// parent pid to wait for
    #[arg(long)]
    pub pid: u32,

    /// downloaded executable to install
    #[arg(long)]
    pub src: PathBuf,

    /// installed executable to replace
    #[arg(long)]
    pub dst: PathBuf,

    /// version written to the markers
    #[arg(long)]
    pub version: String,

    /// version marker to write (repeatable)
    #[arg(long = "marker")]
    pub markers: Vec<PathBuf>,

    #[arg(long, default_value_t = 3)]
    pub attempts: u32,

    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,

    /// start the installed executable afterwards
    #[arg(long)]
    pub relaunch: bool,
}

impl ApplyUpdateArgs {
    pub fn into_job(self) -> HelperJob {
        HelperJob {
            parent_pid: self.pid,
            source: self.src,
            target: self.dst,
            version: self.version,
            markers: self.markers,
            attempts: self.attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            relaunch: self.relaunch,
        }
    }
}
