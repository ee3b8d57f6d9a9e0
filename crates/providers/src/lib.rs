//! Clients for the reverse-image-search (SauceNAO) and imageboard metadata
//! (e621) services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

mod de;
pub mod e621;
pub mod http;
pub mod saucenao;
pub mod tags;

pub use tags::PostTagSet;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{service} rejected the credentials")]
    Auth { service: &'static str },
    #[error("{service} did not respond with a valid account, cannot continue")]
    Unavailable { service: &'static str },
    #[error("rate limited by {service} (status {status})")]
    RateLimited { service: &'static str, status: u16 },
    #[error("bad image or other request error: {0}")]
    BadRequest(String),
    #[error("out of attempts after {attempts} tries (last status {last_status:?})")]
    ExhaustedRetries {
        attempts: u32,
        last_status: Option<u16>,
    },
    #[error("post {0} not found")]
    NotFound(PostId),
    #[error("could not parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("could not access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    /// Errors that make every further request pointless for this run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            ProviderError::Auth { .. }
                | ProviderError::Unavailable { .. }
                | ProviderError::ExhaustedRetries { .. }
        )
    }
}

/// Identifier of a post on the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PostId)
    }
}

/// Encoded image ready to be submitted to the similarity service.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[async_trait::async_trait]
pub trait SimilarityProvider: Send + Sync {
    async fn search(&self, upload: ImageUpload)
        -> Result<saucenao::SimilarityResponse, ProviderError>;
}

#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn post_tags(&self, post_id: PostId) -> Result<PostTagSet, ProviderError>;
}

/// Writes a raw response body next to the working directory for later replay.
/// Failures are logged and otherwise ignored.
pub(crate) async fn dump_raw(path: Option<&std::path::Path>, body: &str) {
    let Some(path) = path else {
        return;
    };
    match tokio::fs::write(path, body).await {
        Ok(()) => tracing::debug!("raw response stored at {}", path.display()),
        Err(e) => tracing::warn!("could not store raw response at {}: {}", path.display(), e),
    }
}

pub(crate) fn read_document(path: &std::path::Path) -> Result<String, ProviderError> {
    std::fs::read_to_string(path).map_err(|source| ProviderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
