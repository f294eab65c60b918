mod cli;
mod config;
mod confirm;
mod download;
mod error;
mod install;
mod marker;
mod paths;
mod release;
#[cfg(test)]
mod test_support;
mod update;
mod version;

use clap::Parser;

fn main() -> std::process::ExitCode {
    if let Err(err) = real_main() {
        eprintln!("{err}");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}

fn real_main() -> crate::error::Result<()> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);
    crate::cli::run(cli)
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn,relatorio_updater=info",
        1 => "info,relatorio_updater=debug",
        _ => "debug,relatorio_updater=trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}
