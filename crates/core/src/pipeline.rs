use crate::config::AppConfig;
use crate::models::{LookupContext, ResolvedMatch};
use crate::similarity::{self, SubmitError};
use crate::{metadata, ranker, resolver};
use providers::e621::{E621Client, E621Config};
use providers::http::ReqwestTransport;
use providers::saucenao::{SauceNaoClient, SauceNaoConfig};
use providers::{MetadataProvider, PostId, ProviderError, SimilarityProvider};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("similarity search failed: {0}")]
    Similarity(#[from] SubmitError),
    #[error("could not fetch tags for post {post_id}: {source}")]
    Metadata {
        post_id: PostId,
        #[source]
        source: ProviderError,
    },
}

impl LookupError {
    /// Whether the whole run has to stop rather than just this image.
    pub fn is_run_fatal(&self) -> bool {
        match self {
            LookupError::Similarity(SubmitError::Provider(e)) => {
                e.is_run_fatal() || matches!(e, ProviderError::Parse { .. })
            }
            LookupError::Similarity(SubmitError::Image { .. }) => false,
            LookupError::Metadata { source, .. } => matches!(source, ProviderError::Auth { .. }),
        }
    }
}

/// Turns one image into its candidate posts and their tags.
pub struct Lookup {
    similarity: Arc<dyn SimilarityProvider>,
    metadata: Arc<dyn MetadataProvider>,
    ctx: LookupContext,
}

impl Lookup {
    pub fn new(
        similarity: Arc<dyn SimilarityProvider>,
        metadata: Arc<dyn MetadataProvider>,
        ctx: LookupContext,
    ) -> Self {
        Self {
            similarity,
            metadata,
            ctx,
        }
    }

    /// Live clients sharing one HTTP transport.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let transport = Arc::new(ReqwestTransport::new());
        let saucenao = SauceNaoClient::new(
            SauceNaoConfig {
                api_key: config.saucenao.api_key.clone(),
                index: config.saucenao.index,
                num_results: config.saucenao.num_results,
                raw_dump: config.raw_dump_path("saucenao"),
            },
            transport.clone(),
        )?;
        let e621 = E621Client::new(
            E621Config {
                username: config.e621.username.clone(),
                api_key: config.e621.api_key.clone(),
                user_agent: config.e621.user_agent.clone(),
                raw_dump: config.raw_dump_path("e621"),
            },
            transport,
        );
        let ctx = LookupContext {
            verbose: config.output.verbose,
            metadata_replay: config.e621.replay.clone(),
        };
        Ok(Self::new(Arc::new(saucenao), Arc::new(e621), ctx))
    }

    pub fn context(&self) -> &LookupContext {
        &self.ctx
    }

    pub async fn resolve_image(&self, path: &Path) -> Result<ResolvedMatch, LookupError> {
        let response = similarity::submit(self.similarity.as_ref(), path).await?;
        let returned = response.results.len();
        let ranked = ranker::rank(response.results);
        debug!(
            "{} of {} results above {}",
            ranked.len(),
            returned,
            ranker::SIMILARITY_THRESHOLD
        );

        let mut resolved = ResolvedMatch::new(path.to_path_buf());
        if ranked.is_empty() {
            warn!("no close matches for {}", path.display());
            return Ok(resolved);
        }
        resolved.post_ids = resolver::resolve(&ranked, &self.ctx);
        let ambiguous = resolved.post_ids.len() > 1;

        for post_id in resolved.post_ids.clone() {
            if resolved.tags.contains_key(&post_id) {
                continue;
            }
            match metadata::fetch_tags(self.metadata.as_ref(), post_id, &self.ctx).await {
                Ok(tags) => {
                    resolved.tags.insert(post_id, tags);
                }
                // ambiguous images are never organized
                Err(source) if ambiguous && !matches!(source, ProviderError::Auth { .. }) => {
                    warn!("no tags for candidate post {}: {}", post_id, source);
                }
                Err(source) => return Err(LookupError::Metadata { post_id, source }),
            }
        }
        info!(
            "{}: {} candidate post(s) {:?}",
            path.display(),
            resolved.post_ids.len(),
            resolved.post_ids.iter().map(|id| id.0).collect::<Vec<_>>()
        );
        Ok(resolved)
    }
}
