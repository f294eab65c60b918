use crate::error::Result;
use crate::update::Updater;

pub fn run(updater: &Updater, args: super::args::CheckArgs) -> Result<()> {
    let current = updater.current_version();

    // the check is best-effort: a failure reads as "up to date"
    let info = match updater.locate() {
        Ok(info) => info,
        Err(e) => {
            log::warn!("update check failed: {e}");
            None
        }
    };

    let Some(info) = info else {
        println!("up to date (v{current})");
        return Ok(());
    };

    println!(
        "update available: v{current} -> v{} ({})",
        info.target_version, info.asset_name
    );
    if !info.published_at.is_empty() {
        println!("published: {}", info.published_at);
    }
    if args.notes && !info.release_notes.trim().is_empty() {
        println!();
        println!("{}", info.release_notes.trim());
    }
    Ok(())
}
