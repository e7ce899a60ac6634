//! Writes the build manifest: one absolute URL per generated output, plus a
//! crawl of mirrored binary assets (PDFs), de-duplicated and sorted into
//! `sitemap.txt` at the output root.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;
use url::Url;
use walkdir::WalkDir;

use crate::collect::slash_path;

/// The manifest file name, relative to the output root.
pub const SITEMAP_FILE: &str = "sitemap.txt";

/// Writes `sitemap.txt` under `output_dir`. `rendered` holds the relative
/// paths of every generated output; the output tree is additionally crawled
/// for `.pdf` assets. URLs are rooted at `site_url`, with `.html` suffixes
/// stripped and trailing `index` collapsed to the directory URL.
pub fn write(rendered: &[String], output_dir: &Path, site_url: &Url) -> io::Result<()> {
    let root = site_url.as_str().trim_end_matches('/');

    let mut urls: BTreeSet<String> = rendered
        .iter()
        .map(|rel| format!("{}/{}", root, clean(rel)))
        .collect();

    for entry in WalkDir::new(output_dir) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => io,
            None => io::Error::new(io::ErrorKind::Other, "walk error"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = slash_path(entry.path().strip_prefix(output_dir).unwrap());
        if rel.to_lowercase().ends_with(".pdf") {
            urls.insert(format!("{}/{}", root, rel));
        }
    }

    let mut file = File::create(output_dir.join(SITEMAP_FILE))?;
    for url in &urls {
        writeln!(file, "{}", url)?;
    }
    info!(urls = urls.len(), "wrote sitemap");
    Ok(())
}

/// Strips the `.html` suffix, then a trailing `index`, so
/// `blog/index.html` becomes `blog/` and `about.html` becomes `about`.
/// Non-HTML outputs (feeds) pass through unchanged.
fn clean(rel: &str) -> &str {
    let rel = rel.strip_suffix(".html").unwrap_or(rel);
    rel.strip_suffix("index").unwrap_or(rel)
}
