use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("release registry returned {status} for {url}")]
    RegistryStatus { status: u16, url: String },

    #[error("release {version} has no asset named {expected} or ending in {extension:?}")]
    NoUsableAsset {
        version: String,
        expected: String,
        extension: &'static str,
    },

    #[error("download of {asset} failed: {source}")]
    Download {
        asset: String,
        #[source]
        source: Box<UpdaterError>,
    },

    #[error("download of {asset} ended early: {received} of {expected} bytes")]
    TruncatedDownload {
        asset: String,
        received: u64,
        expected: u64,
    },

    #[error("{role} not found: {}", path.display())]
    MissingFile { role: &'static str, path: PathBuf },

    #[error("install location unresolved; no executable at {}", guess.display())]
    UnresolvedLocation { guess: PathBuf },

    #[error("replacing {} failed after {attempts} attempts (backup restored: {restored}): {source}", path.display())]
    ReplaceFailed {
        path: PathBuf,
        attempts: u32,
        restored: bool,
        #[source]
        source: std::io::Error,
    },

    #[error("another update is already running")]
    UpdateInProgress,

    #[error("update failed: {0}")]
    UpdateFailed(String),

    #[error("{0}")]
    InvalidArgs(String),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
