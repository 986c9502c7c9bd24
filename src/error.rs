use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no hosted zone found for domain {0}")]
    ZoneNotFound(String),

    #[error("invalid domain {domain}: {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("invalid stack name {name}: {reason}")]
    InvalidStackName { name: String, reason: String },

    #[error("stack {name} failed: {reason}")]
    StackFailed { name: String, reason: String },

    #[error("stack {stack} settled without expected output {key}")]
    MissingOutput { stack: String, key: String },

    #[error("asset path {0} is not a directory")]
    AssetDirMissing(String),

    #[error("AWS api error: {0}")]
    Aws(String),

    #[error("failed to serialize template: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The SDK error types are generic per operation; render them the same
    /// way everywhere and keep the full debug detail.
    pub fn aws<E: Debug>(e: E) -> Self {
        Self::Aws(format!("{:#?}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
