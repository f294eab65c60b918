use serde::Deserialize;

use crate::error::{Result, UpdaterError};
use crate::version::{Version, strip_tag_prefix};

pub const USER_AGENT: &str = concat!("relatorio-updater/", env!("CARGO_PKG_VERSION"));
pub(crate) const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone)]
pub struct UpdateInfo {
    pub target_version: Version,
    /// the release tag without its `v`, as written to the version markers
    pub tag_version: String,
    pub download_url: String,
    pub asset_name: String,
    pub release_notes: String,
    pub published_at: String,
}

pub trait ReleaseSource {
    fn latest_release(&self, owner: &str, repo: &str) -> Result<Release>;
}

/// GitHub-compatible "latest release" endpoint.
pub struct GithubReleases {
    client: reqwest::blocking::Client,
    api_base: String,
}

impl GithubReleases {
    pub fn new(api_base: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl ReleaseSource for GithubReleases {
    fn latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{owner}/{repo}/releases/latest", self.api_base);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpdaterError::RegistryStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

pub fn executable_extension() -> &'static str {
    if cfg!(windows) { ".exe" } else { "" }
}

/// First asset ending in the platform executable extension or named exactly
/// like the installed executable.
pub fn select_asset<'a>(assets: &'a [Asset], executable_name: &str) -> Option<&'a Asset> {
    let ext = executable_extension();
    assets.iter().find(|a| {
        let by_ext = !ext.is_empty() && a.name.to_ascii_lowercase().ends_with(ext);
        by_ext || a.name == executable_name
    })
}

pub struct ReleaseLocator {
    source: Box<dyn ReleaseSource + Send + Sync>,
    owner: String,
    repo: String,
    executable_name: String,
}

impl ReleaseLocator {
    pub fn new(
        source: Box<dyn ReleaseSource + Send + Sync>,
        owner: &str,
        repo: &str,
        executable_name: &str,
    ) -> Self {
        Self {
            source,
            owner: owner.to_string(),
            repo: repo.to_string(),
            executable_name: executable_name.to_string(),
        }
    }

    /// Remote version if it is strictly newer than `current`.
    pub fn newer_version(&self, current: &Version) -> Result<Option<(Version, Release)>> {
        let release = self.source.latest_release(&self.owner, &self.repo)?;
        let remote = Version::parse(&release.tag_name);
        log::debug!("remote version {remote}, local version {current}");

        if remote <= *current {
            return Ok(None);
        }
        Ok(Some((remote, release)))
    }

    pub fn locate(&self, current: &Version) -> Result<Option<UpdateInfo>> {
        let Some((remote, release)) = self.newer_version(current)? else {
            return Ok(None);
        };

        let asset = select_asset(&release.assets, &self.executable_name).ok_or_else(|| {
            UpdaterError::NoUsableAsset {
                version: remote.to_string(),
                expected: self.executable_name.clone(),
                extension: executable_extension(),
            }
        })?;

        Ok(Some(UpdateInfo {
            target_version: remote,
            tag_version: strip_tag_prefix(&release.tag_name).to_string(),
            download_url: asset.browser_download_url.clone(),
            asset_name: asset.name.clone(),
            release_notes: release.body.clone().unwrap_or_default(),
            published_at: release.published_at.clone().unwrap_or_default(),
        }))
    }

    /// Best-effort: every failure reads as "no update".
    pub fn check_for_update(&self, current: &Version) -> Option<UpdateInfo> {
        match self.locate(current) {
            Ok(Some(info)) => {
                log::info!("update available: {current} -> {}", info.target_version);
                Some(info)
            }
            Ok(None) => {
                log::info!("already on the latest version ({current})");
                None
            }
            Err(e @ UpdaterError::NoUsableAsset { .. }) => {
                log::warn!("{e}");
                None
            }
            Err(e) => {
                log::warn!("update check failed: {e}");
                None
            }
        }
    }
}
