use crate::error::Result;
use crate::update::Updater;

pub fn run(mut updater: Updater) -> Result<()> {
    let before = updater.current_version().clone();
    if updater.sync_version_marker_only() {
        println!("version: v{before} -> v{}", updater.current_version());
    } else {
        println!("version: no change (v{before})");
    }
    Ok(())
}
