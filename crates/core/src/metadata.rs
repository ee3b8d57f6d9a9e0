use crate::models::LookupContext;
use providers::{e621, MetadataProvider, PostId, PostTagSet, ProviderError};
use tracing::debug;

/// Tags of `post_id`, from the stored post document when one is configured.
pub async fn fetch_tags(
    provider: &dyn MetadataProvider,
    post_id: PostId,
    ctx: &LookupContext,
) -> Result<PostTagSet, ProviderError> {
    if let Some(replay) = &ctx.metadata_replay {
        debug!("using stored post {} for post {}", replay.display(), post_id);
        return e621::load_tags(replay);
    }
    provider.post_tags(post_id).await
}
