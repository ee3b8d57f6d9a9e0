//! Derives where an identified image goes and what its sidecar contains.
//! Nothing here touches the filesystem; the plan is carried out by the caller.

use providers::{PostId, PostTagSet};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub const ARTIST_CATEGORY: &str = "artist";
pub const UNKNOWN_ARTIST: &str = "unknown_artist";
const ARTIST_SUFFIX: &str = "_(artist)";
const SIDECAR_SUFFIX: &str = ".json";

/// How the image itself is moved into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Same directory: rename, replacing whatever holds the new name.
    Rename,
    /// Different directory: copy and leave the original alone.
    Copy,
    /// Only the sidecar is written.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizePlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub sidecar: PathBuf,
    pub tags: Vec<String>,
    pub transfer: Transfer,
}

/// Root the inputs were discovered under, and where to mirror it.
#[derive(Debug, Clone, Default)]
pub struct BaseDirs {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
}

impl BaseDirs {
    /// The input directory itself, or the parent of a single input file.
    pub fn discover(input: &Path, alternate: Option<PathBuf>) -> Self {
        let source = if input.is_dir() {
            normalize(input)
        } else {
            parent_dir(input)
        };
        Self {
            source,
            destination: alternate.map(|d| normalize(&d)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub base: BaseDirs,
    pub no_rename: bool,
}

pub fn plan(
    source: &Path,
    post_id: PostId,
    tags: &PostTagSet,
    opts: &OrganizeOptions,
) -> OrganizePlan {
    let source = normalize(source);
    let source_dir = parent_dir(&source);
    let dest_dir = destination_dir(&source_dir, &opts.base);

    let (destination, transfer) = if opts.no_rename {
        let name = source.file_name().map(OsString::from).unwrap_or_default();
        (dest_dir.join(name), Transfer::None)
    } else {
        let ext = source.extension().and_then(|e| e.to_str());
        let name = file_name(&artist_names(tags), post_id, ext);
        let transfer = if dest_dir == source_dir {
            Transfer::Rename
        } else {
            Transfer::Copy
        };
        (dest_dir.join(name), transfer)
    };

    OrganizePlan {
        sidecar: sidecar_path(&destination),
        tags: flatten_tags(tags),
        source,
        destination,
        transfer,
    }
}

/// Artist names with the disambiguation suffix removed, or the placeholder
/// when the post names no artist.
pub fn artist_names(tags: &PostTagSet) -> Vec<String> {
    let artists: Vec<String> = tags
        .get(ARTIST_CATEGORY)
        .unwrap_or_default()
        .iter()
        .map(|a| a.strip_suffix(ARTIST_SUFFIX).unwrap_or(a).to_string())
        .collect();
    if artists.is_empty() {
        vec![UNKNOWN_ARTIST.to_string()]
    } else {
        artists
    }
}

/// Every non-artist tag, category by category, duplicates included.
pub fn flatten_tags(tags: &PostTagSet) -> Vec<String> {
    tags.iter()
        .filter(|(category, _)| *category != ARTIST_CATEGORY)
        .flat_map(|(_, list)| list.iter().cloned())
        .collect()
}

/// `artist1-artist2-POSTID.ext`
pub fn file_name(artists: &[String], post_id: PostId, ext: Option<&str>) -> String {
    let stem = format!("{}-{}", artists.join("-"), post_id);
    match ext {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
        _ => stem,
    }
}

pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Re-roots `source_dir` from the source base onto the alternate base.
pub fn destination_dir(source_dir: &Path, base: &BaseDirs) -> PathBuf {
    let source_dir = normalize(source_dir);
    let Some(dest_base) = &base.destination else {
        return source_dir;
    };
    match source_dir.strip_prefix(&base.source) {
        Ok(rel) if rel.as_os_str().is_empty() => dest_base.clone(),
        Ok(rel) => dest_base.join(rel),
        Err(_) => dest_base.clone(),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => normalize(p),
        _ => PathBuf::from("."),
    }
}

/// Lexically drops `.` components so equal directories compare equal.
fn normalize(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}
