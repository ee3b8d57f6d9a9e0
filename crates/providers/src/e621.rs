//! e621 post metadata client.

use crate::http::{BasicAuth, HttpTransport};
use crate::{dump_raw, read_document, MetadataProvider, PostId, PostTagSet, ProviderError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const POSTS_URL: &str = "https://e621.net/posts";

const SERVICE: &str = "e621";

#[derive(Debug, Clone, Default)]
pub struct E621Config {
    pub username: String,
    pub api_key: String,
    /// Overrides the generated `User-Agent`.
    pub user_agent: Option<String>,
    pub raw_dump: Option<PathBuf>,
}

#[derive(Clone)]
pub struct E621Client {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    auth: Option<BasicAuth>,
    user_agent: String,
    raw_dump: Option<PathBuf>,
}

/// e621 rejects requests without a descriptive agent naming the user.
pub fn default_user_agent(username: &str) -> String {
    let version = env!("CARGO_PKG_VERSION");
    if username.is_empty() {
        format!("imglookup/{}", version)
    } else {
        format!("imglookup/{} (by {} on e621)", version, username)
    }
}

impl E621Client {
    pub fn new(cfg: E621Config, transport: Arc<dyn HttpTransport>) -> Self {
        let user_agent = cfg
            .user_agent
            .clone()
            .unwrap_or_else(|| default_user_agent(&cfg.username));
        let auth = (!cfg.username.is_empty()).then(|| BasicAuth {
            username: cfg.username,
            password: cfg.api_key,
        });
        Self {
            transport,
            base_url: POSTS_URL.to_string(),
            auth,
            user_agent,
            raw_dump: cfg.raw_dump,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn post_url(&self, post_id: PostId) -> String {
        format!("{}/{}.json", self.base_url.trim_end_matches('/'), post_id)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for E621Client {
    async fn post_tags(&self, post_id: PostId) -> Result<PostTagSet, ProviderError> {
        let url = self.post_url(post_id);
        debug!("fetching tags from {}", url);
        let resp = self
            .transport
            .get(&url, self.auth.as_ref(), &self.user_agent)
            .await?;
        match resp.status {
            200 => {
                dump_raw(self.raw_dump.as_deref(), &resp.body).await;
                parse_tags(&resp.body)
            }
            401 | 403 => Err(ProviderError::Auth { service: SERVICE }),
            404 => Err(ProviderError::NotFound(post_id)),
            429 | 503 => Err(ProviderError::RateLimited {
                service: SERVICE,
                status: resp.status,
            }),
            status => Err(ProviderError::RequestFailed(format!(
                "e621 answered {} for post {}",
                status, post_id
            ))),
        }
    }
}

#[derive(Deserialize)]
struct PostEnvelope {
    post: PostBody,
}

#[derive(Deserialize)]
struct PostBody {
    tags: PostTagSet,
}

/// Extracts `post.tags` from a post document.
pub fn parse_tags(text: &str) -> Result<PostTagSet, ProviderError> {
    serde_json::from_str::<PostEnvelope>(text)
        .map(|envelope| envelope.post.tags)
        .map_err(|source| ProviderError::Parse {
            what: "e621 post",
            source,
        })
}

pub fn load_tags(path: &Path) -> Result<PostTagSet, ProviderError> {
    parse_tags(&read_document(path)?)
}
