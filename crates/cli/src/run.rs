use crate::fs_apply::{self, Applied};
use anyhow::{Context, Result};
use imglookup_core::organize::{self, OrganizeOptions};
use imglookup_core::pipeline::Lookup;
use imglookup_core::similarity::is_replay_document;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub organized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyTagged,
    NoMatch,
    /// Number of candidate posts that survived.
    Ambiguous(usize),
}

#[derive(Debug)]
pub enum ImageOutcome {
    Organized(Applied),
    Skipped(SkipReason),
    Failed(anyhow::Error),
}

/// Looks up and organizes `inputs` one after another. Per-image failures are
/// counted and the loop moves on; run-fatal ones end the run with an error.
pub async fn run(
    lookup: &Lookup,
    inputs: &[PathBuf],
    opts: &OrganizeOptions,
    interrupted: &AtomicBool,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        scanned: inputs.len(),
        ..Default::default()
    };
    for path in inputs {
        if interrupted.load(Ordering::SeqCst) {
            warn!("interrupted, stopping before {}", path.display());
            summary.interrupted = true;
            break;
        }
        match process_image(lookup, path, opts).await? {
            ImageOutcome::Organized(applied) => {
                info!("{} -> {}", path.display(), applied.image.display());
                summary.organized += 1;
            }
            ImageOutcome::Skipped(reason) => {
                info!("skipped {}: {:?}", path.display(), reason);
                summary.skipped += 1;
            }
            ImageOutcome::Failed(e) => {
                error!("{}: {:#}", path.display(), e);
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Like [`run`], but gives up as soon as `abort` is notified and returns
/// `None`. Files are only written between awaits, so an abandoned run never
/// leaves an image moved without its sidecar.
pub async fn run_until_aborted(
    lookup: &Lookup,
    inputs: &[PathBuf],
    opts: &OrganizeOptions,
    interrupted: &AtomicBool,
    abort: &Notify,
) -> Result<Option<RunSummary>> {
    tokio::select! {
        summary = run(lookup, inputs, opts, interrupted) => summary.map(Some),
        _ = abort.notified() => Ok(None),
    }
}

pub async fn process_image(
    lookup: &Lookup,
    path: &Path,
    opts: &OrganizeOptions,
) -> Result<ImageOutcome> {
    if organize::sidecar_path(path).exists() {
        return Ok(ImageOutcome::Skipped(SkipReason::AlreadyTagged));
    }

    let resolved = match lookup.resolve_image(path).await {
        Ok(m) => m,
        Err(e) if e.is_run_fatal() => {
            return Err(e).with_context(|| format!("looking up {}", path.display()))
        }
        Err(e) => return Ok(ImageOutcome::Failed(e.into())),
    };

    let Some((post_id, tags)) = resolved.unique() else {
        if resolved.post_ids.is_empty() {
            return Ok(ImageOutcome::Skipped(SkipReason::NoMatch));
        }
        for id in &resolved.post_ids {
            if let Some(tags) = resolved.tags.get(id) {
                info!("candidate {}: {}", id, organize::artist_names(tags).join(", "));
            }
        }
        warn!(
            "{} has {} candidate posts, leaving it alone",
            path.display(),
            resolved.post_ids.len()
        );
        return Ok(ImageOutcome::Skipped(SkipReason::Ambiguous(
            resolved.post_ids.len(),
        )));
    };

    let plan = if is_replay_document(path) {
        let replay_opts = OrganizeOptions {
            no_rename: true,
            ..opts.clone()
        };
        organize::plan(path, post_id, tags, &replay_opts)
    } else {
        organize::plan(path, post_id, tags, opts)
    };
    match fs_apply::apply_plan(&plan) {
        Ok(applied) => Ok(ImageOutcome::Organized(applied)),
        Err(e) => Ok(ImageOutcome::Failed(e)),
    }
}
