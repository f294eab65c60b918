use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, UpdaterError};
use crate::release::{USER_AGENT, UpdateInfo};

const CHUNK_SIZE: usize = 8 * 1024;

pub struct Downloader {
    client: reqwest::blocking::Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(dir: &Path, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            dir: dir.to_path_buf(),
        })
    }

    /// Streams the asset into a fresh temp file and returns its path.
    ///
    /// `on_progress` receives whole percents, only when the server announced
    /// a length. The file is kept only after the body arrived complete.
    pub fn download(
        &self,
        info: &UpdateInfo,
        on_progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<PathBuf> {
        log::info!("downloading {} from {}", info.asset_name, info.download_url);
        self.fetch(info, on_progress)
            .map_err(|e| UpdaterError::Download {
                asset: info.asset_name.clone(),
                source: Box::new(e),
            })
    }

    fn fetch(&self, info: &UpdateInfo, mut on_progress: Option<&mut dyn FnMut(u8)>) -> Result<PathBuf> {
        let mut resp = self
            .client
            .get(&info.download_url)
            .send()?
            .error_for_status()?;

        let total = resp.content_length().filter(|&len| len > 0);

        let mut tmp = tempfile::Builder::new()
            .prefix("update_")
            .suffix(&format!("_{}", sanitize(&info.asset_name)))
            .tempfile_in(&self.dir)?;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut received: u64 = 0;
        let mut last: Option<u8> = None;
        loop {
            let read = resp.read(&mut buf)?;
            if read == 0 {
                break;
            }
            tmp.as_file_mut().write_all(&buf[..read])?;
            received += read as u64;

            if let (Some(total), Some(cb)) = (total, on_progress.as_deref_mut()) {
                let pct = percent(received, total);
                if last != Some(pct) {
                    last = Some(pct);
                    cb(pct);
                }
            }
        }

        if let Some(expected) = total {
            if received != expected {
                return Err(UpdaterError::TruncatedDownload {
                    asset: info.asset_name.clone(),
                    received,
                    expected,
                });
            }
        }

        tmp.as_file_mut().flush()?;
        tmp.as_file_mut().sync_all()?;
        let (_file, path) = tmp.keep().map_err(|e| UpdaterError::Io(e.error))?;
        log::info!("downloaded {received} bytes to {}", path.display());
        Ok(path)
    }
}

fn percent(received: u64, total: u64) -> u8 {
    (received.saturating_mul(100) / total).min(100) as u8
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
