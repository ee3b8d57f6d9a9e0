use anyhow::{Context, Result};
use imglookup_core::organize::{OrganizePlan, Transfer};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Where an organized image and its sidecar ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub image: PathBuf,
    pub sidecar: PathBuf,
}

/// Carries out `plan`. The sidecar is staged next to its final location before
/// the image is touched and only persisted once the transfer succeeded; if
/// persisting fails the transfer is undone.
pub fn apply_plan(plan: &OrganizePlan) -> Result<Applied> {
    let dest_dir = match plan.sidecar.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let mut staged = NamedTempFile::new_in(&dest_dir)
        .with_context(|| format!("staging sidecar in {}", dest_dir.display()))?;
    serde_json::to_writer_pretty(&mut staged, &plan.tags)?;
    staged.flush()?;

    let moved = transfer(plan)?;

    if let Err(e) = staged.persist(&plan.sidecar) {
        if let Err(undo) = roll_back(plan, moved) {
            warn!("could not roll back {}: {}", plan.destination.display(), undo);
        }
        return Err(e.error).with_context(|| format!("writing {}", plan.sidecar.display()));
    }
    debug!("wrote {} tags to {}", plan.tags.len(), plan.sidecar.display());

    let image = match plan.transfer {
        Transfer::None => plan.source.clone(),
        Transfer::Rename | Transfer::Copy => plan.destination.clone(),
    };
    Ok(Applied {
        image,
        sidecar: plan.sidecar.clone(),
    })
}

/// Reads the tag list back from a sidecar.
pub fn read_sidecar(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Returns whether the image was actually moved or copied.
fn transfer(plan: &OrganizePlan) -> Result<bool> {
    match plan.transfer {
        Transfer::None => Ok(false),
        Transfer::Rename => {
            if same_file(&plan.source, &plan.destination) {
                debug!("{} already has its name", plan.source.display());
                return Ok(false);
            }
            if plan.destination.exists() {
                fs::remove_file(&plan.destination)
                    .with_context(|| format!("removing {}", plan.destination.display()))?;
            }
            fs::rename(&plan.source, &plan.destination).with_context(|| {
                format!(
                    "renaming {} to {}",
                    plan.source.display(),
                    plan.destination.display()
                )
            })?;
            Ok(true)
        }
        Transfer::Copy => {
            fs::copy(&plan.source, &plan.destination).with_context(|| {
                format!(
                    "copying {} to {}",
                    plan.source.display(),
                    plan.destination.display()
                )
            })?;
            Ok(true)
        }
    }
}

fn roll_back(plan: &OrganizePlan, moved: bool) -> std::io::Result<()> {
    if !moved {
        return Ok(());
    }
    match plan.transfer {
        Transfer::Rename => fs::rename(&plan.destination, &plan.source),
        Transfer::Copy => fs::remove_file(&plan.destination),
        Transfer::None => Ok(()),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
