use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, UpdaterError};

pub const CONFIG_FILE_NAME: &str = "updater.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    pub repo_owner: String,
    pub repo_name: String,
    pub executable_name: String,
    pub api_base: String,
    pub check_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// apply a found update; when false it is only reported
    pub auto_update: bool,
    pub replace_attempts: u32,
    pub retry_delay_ms: u64,
    pub grace_delay_ms: u64,
    pub relaunch: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repo_owner: "kaoyeoshiro".to_string(),
            repo_name: "analisador_matriculas".to_string(),
            executable_name: default_executable_name().to_string(),
            api_base: "https://api.github.com".to_string(),
            check_timeout_secs: 10,
            download_timeout_secs: 30,
            auto_update: true,
            replace_attempts: 3,
            retry_delay_ms: 2000,
            grace_delay_ms: 2000,
            relaunch: true,
        }
    }
}

fn default_executable_name() -> &'static str {
    if cfg!(windows) {
        "RelatorioTJMS.exe"
    } else {
        "RelatorioTJMS"
    }
}

impl UpdaterConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn set_repo(&mut self, repo: &str) -> Result<()> {
        let (owner, name) = split_repo(repo)?;
        self.repo_owner = owner.to_string();
        self.repo_name = name.to_string();
        Ok(())
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.replace_attempts == 0 {
            return Err(UpdaterError::InvalidArgs(
                "replace_attempts must be at least 1".to_string(),
            ));
        }
        split_repo(&format!("{}/{}", config.repo_owner, config.repo_name))?;
        Ok(config)
    }

    /// Loads the first config file that exists; none at all means defaults.
    pub fn load(candidates: &[PathBuf]) -> Result<Self> {
        for path in candidates {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    log::debug!("config loaded from {}", path.display());
                    return Self::parse(&content);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Self::default())
    }
}

pub fn config_candidates(explicit: Option<&Path>, app_dir: &Path) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(UpdaterError::MissingFile {
                role: "config file",
                path: path.to_path_buf(),
            });
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let mut out = vec![app_dir.join(CONFIG_FILE_NAME)];
    if let Some(dir) = crate::paths::user_config_dir() {
        out.push(dir.join(CONFIG_FILE_NAME));
    }
    Ok(out)
}

pub fn split_repo(repo: &str) -> Result<(&str, &str)> {
    let repo = repo.trim();
    let (owner, name) = repo
        .split_once('/')
        .ok_or_else(|| UpdaterError::InvalidArgs(format!("invalid repo: {repo}")))?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(UpdaterError::InvalidArgs(format!("invalid repo: {repo}")));
    }
    Ok((owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_repo_requires_owner_and_name() {
        assert!(split_repo("a/b").is_ok());
        assert!(split_repo("a/").is_err());
        assert!(split_repo("/b").is_err());
        assert!(split_repo("ab").is_err());
        assert!(split_repo("a/b/c").is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = UpdaterConfig::parse("repo_owner = \"acme\"\nauto_update = false\n").unwrap();
        assert_eq!(config.repo_owner, "acme");
        assert_eq!(config.repo_name, "analisador_matriculas");
        assert!(!config.auto_update);
        assert_eq!(config.check_timeout(), Duration::from_secs(10));
        assert_eq!(config.download_timeout(), Duration::from_secs(30));
        assert_eq!(config.replace_attempts, 3);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_attempts() {
        assert!(matches!(
            UpdaterConfig::parse("silent = true"),
            Err(UpdaterError::Config(_))
        ));
        assert!(UpdaterConfig::parse("replace_attempts = 0").is_err());
    }

    #[test]
    fn load_uses_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join(CONFIG_FILE_NAME);

        assert_eq!(
            UpdaterConfig::load(&[missing.clone()]).unwrap(),
            UpdaterConfig::default()
        );

        std::fs::write(&present, "repo_name = \"other\"").unwrap();
        let config = UpdaterConfig::load(&[missing, present]).unwrap();
        assert_eq!(config.repo_name, "other");
    }

    #[test]
    fn set_repo_overrides_both_parts() {
        let mut config = UpdaterConfig::default();
        config.set_repo("me/tool").unwrap();
        assert_eq!((config.repo_owner.as_str(), config.repo_name.as_str()), ("me", "tool"));
        assert!(config.set_repo("bad").is_err());
    }
}
