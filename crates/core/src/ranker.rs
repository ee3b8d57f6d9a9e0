use providers::saucenao::SimilarityResult;

/// Minimum similarity (exclusive) a result needs to be considered a match.
/// Older setups used 85.0; this tool settles on 60.0.
pub const SIMILARITY_THRESHOLD: f64 = 60.0;

/// Drops results at or below the threshold and orders the rest by
/// similarity, highest first. Equal scores keep the service's order.
pub fn rank(results: Vec<SimilarityResult>) -> Vec<SimilarityResult> {
    let mut kept: Vec<SimilarityResult> = results
        .into_iter()
        .filter(|r| r.similarity > SIMILARITY_THRESHOLD)
        .collect();
    kept.sort_by(|a, b| sort_key(a).total_cmp(&sort_key(b)));
    kept
}

fn sort_key(result: &SimilarityResult) -> f64 {
    SIMILARITY_THRESHOLD - result.similarity
}
