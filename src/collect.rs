//! Walks a source tree and instantiates [`Page`]s for every recognized
//! document, honoring the visibility rules: hidden path-segment prefixes hide
//! whole subtrees, hidden suffixes skip individual files.

use std::path::{Component, Path};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::page::{self, Page};

/// Enumerates source documents under a root directory. The default
/// configuration recognizes Markdown extensions and hides underscore- and
/// dot-prefixed paths.
pub struct Collector {
    /// Case-insensitive file extensions treated as source documents.
    pub extensions: Vec<String>,

    /// Path-segment prefixes that hide a file or a whole directory subtree.
    pub hidden_prefixes: Vec<String>,

    /// File-name suffixes that hide individual files.
    pub hidden_suffixes: Vec<String>,
}

impl Default for Collector {
    fn default() -> Collector {
        Collector {
            extensions: vec!["md".to_owned(), "mdown".to_owned(), "text".to_owned()],
            hidden_prefixes: vec!["_".to_owned(), ".".to_owned()],
            hidden_suffixes: vec![".draft.md".to_owned()],
        }
    }
}

impl Collector {
    /// Recursively collects [`Page`]s under `source_dir` in lexicographic
    /// order, so that repeated builds construct the collection
    /// deterministically.
    pub fn collect(&self, source_dir: &Path) -> page::Result<Vec<Page>> {
        let mut pages = Vec::new();
        let walker = WalkDir::new(source_dir).sort_by_file_name();
        for result in walker {
            let entry = result.map_err(|e| match e.into_io_error() {
                Some(io) => page::Error::Io(io),
                None => page::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "walk error",
                )),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            // strip_prefix never fails: the walker stays under source_dir
            let rel_path = slash_path(entry.path().strip_prefix(source_dir).unwrap());
            if !self.matches(&rel_path) {
                continue;
            }
            debug!(page = %rel_path, "collecting");
            pages.push(Page::from_file(entry.path(), &rel_path)?);
        }
        info!(pages = pages.len(), "collected source documents");
        Ok(pages)
    }

    fn matches(&self, rel_path: &str) -> bool {
        self.has_recognized_extension(rel_path)
            && !is_hidden(rel_path, &self.hidden_prefixes)
            && !self.has_hidden_suffix(rel_path)
    }

    fn has_recognized_extension(&self, rel_path: &str) -> bool {
        let lower = rel_path.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }

    fn has_hidden_suffix(&self, rel_path: &str) -> bool {
        let lower = rel_path.to_lowercase();
        self.hidden_suffixes.iter().any(|s| lower.ends_with(s))
    }
}

/// True if any segment of `rel_path` starts with one of `prefixes`; a hidden
/// ancestor directory hides all of its descendants.
pub fn is_hidden(rel_path: &str, prefixes: &[String]) -> bool {
    rel_path
        .split('/')
        .any(|segment| prefixes.iter().any(|p| segment.starts_with(p.as_str())))
}

/// Renders a relative [`Path`] as a forward-slash string, the form used for
/// page identity and URLs.
pub fn slash_path(path: &Path) -> String {
    let segments: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    segments.join("/")
}

/// The blog-eligible subset of a collection: pages under the blog prefix,
/// with drafts filtered out unless `include_drafts` is set. Draft pages are
/// still compiled standalone; they are only withheld from the aggregate
/// views.
pub fn blog_posts(pages: &[Page], include_drafts: bool) -> Vec<&Page> {
    pages
        .iter()
        .filter(|p| p.is_blog_post() && (include_drafts || !p.meta.draft))
        .collect()
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_collect_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "blog/b.md", "b");
        write(root, "blog/a.md", "a");
        write(root, "about.MD", "about");
        write(root, "notes.text", "notes");
        write(root, "style.css", "not a page");
        write(root, "_drafts/skip.md", "hidden dir");
        write(root, ".hidden.md", "hidden file");
        write(root, "blog/wip.draft.md", "hidden suffix");

        let pages = Collector::default().collect(root).unwrap();
        let rel: Vec<&str> = pages.iter().map(|p| p.rel_path.as_str()).collect();
        assert_eq!(rel, vec!["about.MD", "blog/a.md", "blog/b.md", "notes.text"]);
    }

    #[test]
    fn test_hidden_ancestor_hides_descendants() {
        assert!(is_hidden("_private/deep/file.md", &["_".to_owned()]));
        assert!(is_hidden("a/.git/file.md", &[".".to_owned()]));
        assert!(!is_hidden("a/b/file.md", &["_".to_owned(), ".".to_owned()]));
    }

    #[test]
    fn test_blog_posts_draft_filtering() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "blog/live.md", "---\ndate: 2023-01-05\n---\nlive");
        write(root, "blog/wip.md", "---\ndraft: true\n---\nwip");
        write(root, "about.md", "about");

        let pages = Collector::default().collect(root).unwrap();
        let posts = blog_posts(&pages, false);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].rel_path, "blog/live.md");
        assert_eq!(blog_posts(&pages, true).len(), 2);
    }

    #[test]
    fn test_collect_fails_on_malformed_page() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.md", "---\ntitle: unclosed");
        assert!(Collector::default().collect(dir.path()).is_err());
    }
}
