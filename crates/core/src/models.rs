use providers::{PostId, PostTagSet};
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-run settings handed to every lookup step.
#[derive(Debug, Clone, Default)]
pub struct LookupContext {
    pub verbose: bool,
    /// Stored post document to use instead of live metadata fetches.
    pub metadata_replay: Option<PathBuf>,
}

/// Outcome of looking one image up: its candidate posts, best first, and the
/// tags fetched for each of them.
#[derive(Debug, Clone)]
pub struct ResolvedMatch {
    pub source: PathBuf,
    pub post_ids: Vec<PostId>,
    pub tags: HashMap<PostId, PostTagSet>,
}

impl ResolvedMatch {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            post_ids: Vec::new(),
            tags: HashMap::new(),
        }
    }

    /// The match, if exactly one post survived.
    pub fn unique(&self) -> Option<(PostId, &PostTagSet)> {
        match self.post_ids.as_slice() {
            [only] => self.tags.get(only).map(|tags| (*only, tags)),
            _ => None,
        }
    }
}
