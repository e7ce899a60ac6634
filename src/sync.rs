//! Mirrors non-document assets from the source tree into the output tree,
//! deleting stale destination files along the way (the equivalent of
//! `rsync -rL --delete --exclude=".*"` in earlier tooling). Dotfiles are
//! excluded on both sides; document sources are excluded because the
//! rendering pass turns them into `.html` outputs.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::collect::slash_path;

/// Mirrors `source` into `dest`, skipping dotfiles and files whose lowercase
/// name ends with one of `skip_suffixes`. Destination files without a
/// mirrored counterpart are deleted; the rendering pass then regenerates the
/// documents. Directories left empty by deletion are removed.
pub fn sync(source: &Path, dest: &Path, skip_suffixes: &[String]) -> io::Result<()> {
    let mirrored = mirror_set(source, skip_suffixes)?;

    // Delete stale destination files first so renames don't leave orphans.
    for entry in WalkDir::new(dest).contents_first(true) {
        let entry = entry.map_err(io_error)?;
        // strip_prefix never fails: the walker stays under dest
        let rel = slash_path(entry.path().strip_prefix(dest).unwrap());
        if rel.is_empty() || rel.split('/').any(|s| s.starts_with('.')) {
            continue;
        }
        if entry.file_type().is_file() {
            if !mirrored.contains(&rel) {
                debug!(path = %rel, "deleting stale output");
                fs::remove_file(entry.path())?;
            }
        } else if entry.file_type().is_dir()
            && !source.join(&rel).is_dir()
            && fs::read_dir(entry.path())?.next().is_none()
        {
            fs::remove_dir(entry.path())?;
        }
    }

    for rel in &mirrored {
        let to = {
            let mut path = dest.to_owned();
            path.extend(rel.split('/'));
            path
        };
        // parent exists for root-level files (it's `dest` itself)
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source.join(rel), to)?;
    }
    Ok(())
}

fn mirror_set(source: &Path, skip_suffixes: &[String]) -> io::Result<BTreeSet<String>> {
    let mut mirrored = BTreeSet::new();
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(io_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = slash_path(entry.path().strip_prefix(source).unwrap());
        if rel.split('/').any(|s| s.starts_with('.')) {
            continue;
        }
        let lower = rel.to_lowercase();
        if skip_suffixes.iter().any(|s| lower.ends_with(s.as_str())) {
            continue;
        }
        mirrored.insert(rel);
    }
    Ok(mirrored)
}

fn io_error(err: walkdir::Error) -> io::Error {
    match err.into_io_error() {
        Some(io) => io,
        None => io::Error::new(io::ErrorKind::Other, "walk error"),
    }
}
