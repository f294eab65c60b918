use std::sync::Arc;
use std::sync::mpsc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::error::{Result, UpdaterError};
use crate::update::{STATUS_UP_TO_DATE, Updater};

enum Event {
    Progress(String, u8),
    Done(bool, String),
}

pub fn run(updater: Updater, args: super::args::UpdateArgs) -> Result<()> {
    let updater = Arc::new(updater);
    let (tx, rx) = mpsc::channel();
    let done_tx = tx.clone();
    let on_progress = move |status: &str, pct: u8| {
        let _ = tx.send(Event::Progress(status.to_string(), pct));
    };
    let on_complete = move |success: bool, message: String| {
        let _ = done_tx.send(Event::Done(success, message));
    };

    let worker = if args.yes {
        Arc::clone(&updater).spawn_update(on_progress, on_complete)
    } else {
        // install exactly what was confirmed, without asking the registry twice
        let Some(info) = updater.check_for_update() else {
            println!("up to date (v{})", updater.current_version());
            return Ok(());
        };
        println!(
            "update available: v{} -> v{}",
            updater.current_version(),
            info.tag_version
        );
        if !crate::confirm::confirm("update now?")? {
            return Ok(());
        }
        Arc::clone(&updater).spawn_install(info, on_progress, on_complete)
    };

    let pb = ProgressBar::new(100);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut outcome = None;
    for event in rx {
        match event {
            Event::Progress(status, pct) => {
                pb.set_message(status);
                pb.set_position(u64::from(pct));
            }
            Event::Done(success, message) => {
                outcome = Some((success, message));
                break;
            }
        }
    }
    pb.finish_and_clear();
    let _ = worker.join();

    match outcome {
        Some((true, message)) => {
            println!("{message}");
            Ok(())
        }
        Some((false, message)) if message == STATUS_UP_TO_DATE => {
            println!("up to date");
            Ok(())
        }
        Some((false, message)) => Err(UpdaterError::UpdateFailed(message)),
        None => Err(UpdaterError::UpdateFailed("update worker stopped".to_string())),
    }
}
