//! Finds the images to look up under an input path.

use crate::config::ScanSettings;
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// A file input is returned as-is. A directory is walked up to
/// `max_depth` levels, in file-name order, keeping files with an image
/// extension that are neither hidden nor excluded.
pub fn collect_images(root: &Path, settings: &ScanSettings) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        anyhow::bail!("input path {} does not exist", root.display());
    }
    let excludes = build_globset(&settings.exclude)?;

    let mut images = Vec::new();
    for entry in WalkDir::new(root)
        .max_depth(settings.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| should_descend(e, &excludes))
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), &settings.extensions) {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid exclude pattern {:?}", pat))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn should_descend(entry: &DirEntry, excludes: &GlobSet) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    !is_hidden(entry.path()) && !excludes.is_match(entry.path())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}
