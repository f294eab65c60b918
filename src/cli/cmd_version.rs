use crate::error::Result;
use crate::update::Updater;

pub fn run(updater: &Updater) -> Result<()> {
    let location = updater.location();
    let config = updater.config();

    println!("version:    {}", updater.current_version());
    println!("repo:       {}/{}", config.repo_owner, config.repo_name);
    println!("executable: {}", location.display_executable());
    println!("app dir:    {}", location.app_dir.display());
    println!("packaged:   {}", location.is_packaged_binary);
    Ok(())
}
