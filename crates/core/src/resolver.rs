use crate::models::LookupContext;
use providers::saucenao::SimilarityResult;
use providers::PostId;
use tracing::debug;

/// Maps ranked results to post ids, keeping their order. Results that did not
/// come from the metadata service's index are skipped.
pub fn resolve(results: &[SimilarityResult], ctx: &LookupContext) -> Vec<PostId> {
    let mut post_ids = Vec::with_capacity(results.len());
    for result in results {
        match result.data.post_id() {
            Some(id) => post_ids.push(id),
            None => {
                debug!(
                    index_id = result.index_id,
                    similarity = result.similarity,
                    "result has no post id, continuing"
                );
                if ctx.verbose {
                    debug!("result data: {:?}", result.data);
                }
            }
        }
    }
    post_ids
}
