//! Exports [`compile_site`], which sequences the high-level steps of a build:
//! mirror static assets, collect pages, render every page through its
//! resolved template, derive the aggregate blog views, and write the sitemap.
//! The build is a single synchronous pass; failure at any step aborts it.

use std::fmt;
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::blog::{self, Step, StepContext};
use crate::collect::{blog_posts, Collector};
use crate::config::Config;
use crate::page::{self, Page};
use crate::sitemap;
use crate::sync::sync;
use crate::template::{self, Registry};

/// A similarity collaborator: maps a page collection to, per page (by index),
/// scored indices of related pages.
pub type RelatedFn = fn(&[Page]) -> Vec<Vec<(f64, usize)>>;

/// Builds the site described by `config`. See [`compile_site_with_related`]
/// for the variant that enriches pages with a similarity collaborator.
pub fn compile_site(config: &Config) -> Result<()> {
    compile_site_with_related(config, None)
}

/// Builds the site, optionally enriching pages with related-page links
/// before rendering. Scores at or below `config.related_threshold` are
/// discarded.
pub fn compile_site_with_related(config: &Config, related: Option<RelatedFn>) -> Result<()> {
    if !config.source_dir.is_dir() {
        return Err(Error::MissingSourceDir(config.source_dir.clone()));
    }
    create_dir_all(&config.output_dir)?;

    let templates = Registry::from_directory(&config.template_dir)?;

    let document_suffixes: Vec<String> = Collector::default()
        .extensions
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect();
    sync(&config.source_dir, &config.output_dir, &document_suffixes)?;

    let mut pages = Collector::default().collect(&config.source_dir)?;
    if let Some(related) = related {
        apply_related(&mut pages, related, config.related_threshold);
    }

    let mut rendered = render_pages(&pages, &config.output_dir, &templates)?;

    let posts = blog_posts(&pages, config.include_drafts);
    let ctx = StepContext {
        output_dir: &config.output_dir,
        templates: &templates,
        names: &config.templates,
    };
    for step in &Step::ALL {
        debug!(step = step.name(), "dispatching aggregation step");
        rendered.extend(step.run(&posts, &ctx)?);
    }

    sitemap::write(&rendered, &config.output_dir, &config.site_url)?;

    if let Some(counter) = &config.build_count_file {
        increment_counter(&config.source_dir.join(counter))?;
    }

    info!(outputs = rendered.len(), "build complete");
    Ok(())
}

/// Renders every individual page through its resolved template, returning
/// the relative paths written.
fn render_pages(pages: &[Page], output_dir: &Path, templates: &Registry) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let template = templates.resolve(page)?;
        let path = page.output_path(output_dir);
        // every output path has a parent: it is rooted at output_dir
        create_dir_all(path.parent().unwrap())?;
        fs::write(&path, page.render(Some(template))?)?;
        debug!(page = %page.rel_path, "rendered");
        written.push(page.url());
    }
    Ok(written)
}

/// Applies the similarity collaborator's output to the collection. Each
/// page's related list is set at most once, score-descending, with entries
/// at or below `threshold` discarded.
fn apply_related(pages: &mut [Page], related: RelatedFn, threshold: f64) {
    let urls: Vec<String> = pages.iter().map(Page::url).collect();
    let scored = related(pages);
    for (page, mut neighbors) in pages.iter_mut().zip(scored) {
        neighbors.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        page.related = neighbors
            .into_iter()
            .filter(|(score, _)| *score > threshold)
            .filter_map(|(score, i)| urls.get(i).map(|url| (score, url.clone())))
            .collect();
    }
}

/// Bumps the integer stored in `path`, creating the file at zero when it does
/// not yet exist. Only successful full builds are counted. A corrupt counter
/// restarts at zero rather than failing an otherwise-successful build.
fn increment_counter(path: &Path) -> Result<()> {
    let count = match fs::read_to_string(path) {
        Ok(contents) => match contents.trim().parse::<u64>() {
            Ok(count) => count,
            Err(_) => {
                warn!(path = %path.display(), "build counter is not an integer, resetting");
                0
            }
        },
        Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => 0,
        Err(err) => return Err(Error::Io(err)),
    };
    let mut file = File::create(path)?;
    writeln!(file, "{}", count + 1)?;
    Ok(())
}

/// Represents the result of a site build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site.
#[derive(Debug)]
pub enum Error {
    /// Returned when the source directory does not exist.
    MissingSourceDir(PathBuf),

    /// Returned for errors constructing or rendering pages.
    Page(page::Error),

    /// Returned for errors loading or resolving templates.
    Template(template::Error),

    /// Returned for errors producing the aggregate blog views.
    Blog(blog::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingSourceDir(path) => {
                write!(f, "source directory '{}' does not exist", path.display())
            }
            Error::Page(err) => err.fmt(f),
            Error::Template(err) => err.fmt(f),
            Error::Blog(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingSourceDir(_) => None,
            Error::Page(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Blog(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<page::Error> for Error {
    /// Converts a [`page::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when collecting and rendering pages.
    fn from(err: page::Error) -> Error {
        Error::Page(err)
    }
}

impl From<template::Error> for Error {
    /// Converts a [`template::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when loading and resolving templates.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<blog::Error> for Error {
    /// Converts a [`blog::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when running aggregation steps.
    fn from(err: blog::Error) -> Error {
        Error::Blog(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use url::Url;

    use super::*;
    use crate::config::TemplateNames;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn fixture() -> (tempfile::TempDir, tempfile::TempDir, tempfile::TempDir) {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let tpl = tempfile::tempdir().unwrap();

        write(
            src.path(),
            "blog/jan.md",
            "---\ntitle: January\ndate: 2023-01-05\ntags: [go]\n---\nFirst",
        );
        write(
            src.path(),
            "blog/feb.md",
            "---\ntitle: February\ndate: 2023-02-10\ntags: [go]\n---\nSecond",
        );
        write(src.path(), "about.md", "---\ntitle: About\n---\nHello");

        write(tpl.path(), "main.html", "{{.title}}: {{.content}}");
        write(tpl.path(), "blog/main.html", "post {{.title}}");
        write(tpl.path(), "blog/home.html", "{{range .posts}}{{.slug}} {{end}}");
        write(
            tpl.path(),
            "blog/archives.html",
            "{{range .posts}}{{.slug}} {{end}}",
        );
        write(
            tpl.path(),
            "blog/tags.html",
            "{{range .tags}}{{.name}}:{{range .posts}}{{.slug}} {{end}}{{end}}",
        );
        write(
            tpl.path(),
            "feeds/feed.json",
            "{{range .posts}}{{.url}} {{end}}",
        );
        write(tpl.path(), "feeds/rss.xml", "{{.build_date}}");
        (src, out, tpl)
    }

    fn config(src: &Path, out: &Path, tpl: &Path) -> Config {
        Config {
            source_dir: src.to_owned(),
            output_dir: out.to_owned(),
            template_dir: tpl.to_owned(),
            site_url: Url::parse("https://example.com").unwrap(),
            include_drafts: false,
            related_threshold: 0.001,
            templates: TemplateNames::default(),
            build_count_file: None,
        }
    }

    #[test]
    fn test_compile_site_end_to_end() {
        let (src, out, tpl) = fixture();
        compile_site(&config(src.path(), out.path(), tpl.path())).unwrap();

        let read = |rel: &str| fs::read_to_string(out.path().join(rel)).unwrap();
        assert_eq!(read("about.html"), "About: <p>Hello</p>\n");
        assert_eq!(read("blog/jan.html"), "post January");
        assert_eq!(read("blog/index.html"), "blog/feb blog/jan ");
        assert_eq!(read("blog/archive/index.html"), "blog/feb blog/jan ");
        assert_eq!(read("blog/2023/index.html"), "blog/feb blog/jan ");
        assert_eq!(read("blog/2023/01/index.html"), "blog/jan ");
        assert_eq!(read("blog/2023/02/index.html"), "blog/feb ");
        assert_eq!(read("blog/tags/index.html"), "go:blog/feb blog/jan ");
        assert!(out.path().join("blog/feed.json").is_file());
        assert!(out.path().join("blog/rss.xml").is_file());

        let sitemap = read("sitemap.txt");
        assert!(sitemap.contains("https://example.com/about\n"));
        assert!(sitemap.contains("https://example.com/blog/\n"));
        assert!(sitemap.contains("https://example.com/blog/2023/01/\n"));
        assert!(sitemap.contains("https://example.com/blog/feed.json\n"));
    }

    #[test]
    fn test_compile_site_missing_source_fails() {
        let (_, out, tpl) = fixture();
        let config = config(Path::new("/does/not/exist"), out.path(), tpl.path());
        match compile_site(&config) {
            Err(Error::MissingSourceDir(_)) => {}
            other => panic!("expected MissingSourceDir, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_site_related_enrichment() {
        let (src, out, tpl) = fixture();
        write(tpl.path(), "blog/main.html", "{{range .related}}{{.url}}{{end}}");

        fn all_related(pages: &[Page]) -> Vec<Vec<(f64, usize)>> {
            // Relate every page to the one after it, below-threshold noise
            // included.
            (0..pages.len())
                .map(|i| vec![(0.9, (i + 1) % pages.len()), (0.0001, i)])
                .collect()
        }
        compile_site_with_related(
            &config(src.path(), out.path(), tpl.path()),
            Some(all_related),
        )
        .unwrap();

        let contents = fs::read_to_string(out.path().join("blog/feb.html")).unwrap();
        // Collection order is lexicographic: about, blog/feb, blog/jan.
        assert_eq!(contents, "blog/jan.html");
    }

    #[test]
    fn test_build_counter_increments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("count");
        increment_counter(&path).unwrap();
        increment_counter(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "2");
    }

    #[test]
    fn test_build_counter_resets_when_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("count");
        fs::write(&path, "not a number\n").unwrap();
        increment_counter(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "1");
    }

    #[test]
    fn test_unclosed_header_aborts_build() {
        let (src, out, tpl) = fixture();
        write(src.path(), "bad.md", "---\ntitle: broken");
        assert!(compile_site(&config(src.path(), out.path(), tpl.path())).is_err());
    }
}
