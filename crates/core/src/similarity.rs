use crate::thumbnail;
use providers::saucenao::{self, ResponseHeader, SimilarityResponse};
use providers::{ProviderError, SimilarityProvider};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const REPLAY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("could not prepare {path:?} for upload: {reason:#}")]
    Image {
        path: std::path::PathBuf,
        reason: anyhow::Error,
    },
}

/// Stored responses are recognised by their extension.
pub fn is_replay_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(REPLAY_EXTENSION))
        .unwrap_or(false)
}

/// Searches for `path`, or parses it when it is a stored response, and checks
/// the account status the service reported.
pub async fn submit(
    provider: &dyn SimilarityProvider,
    path: &Path,
) -> Result<SimilarityResponse, SubmitError> {
    let response = if is_replay_document(path) {
        debug!("replaying stored response {}", path.display());
        saucenao::load_response(path)?
    } else {
        let upload = thumbnail::prepare_upload(path).map_err(|reason| SubmitError::Image {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!("uploading {} ({} bytes)", path.display(), upload.bytes.len());
        provider.search(upload).await?
    };
    check_account(&response.header)?;
    Ok(response)
}

/// A non-positive user id means the service did not accept the request at
/// all. A positive status only means some indexes could not be searched.
pub fn check_account(header: &ResponseHeader) -> Result<(), ProviderError> {
    if header.user_id <= 0 {
        return Err(ProviderError::Unavailable {
            service: "saucenao",
        });
    }
    if header.status < 0 {
        return Err(ProviderError::BadRequest(format!(
            "saucenao status {}",
            header.status
        )));
    }
    if header.status > 0 {
        warn!("index resolution error (status {}), results may be partial", header.status);
    }
    debug!(
        short_remaining = header.short_remaining,
        short_limit = header.short_limit,
        long_remaining = header.long_remaining,
        long_limit = header.long_limit,
        "saucenao rate limits"
    );
    if header.long_limit > 0 && header.long_remaining <= 0 {
        warn!("daily saucenao search limit reached");
    }
    Ok(())
}
