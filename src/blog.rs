//! The aggregation engine: derives the multi-page blog views (chronological
//! index, year and month archives, tag index, feeds) from the full post
//! collection. The views are an explicit ordered list of named steps, each of
//! which reports the relative paths it wrote so the compiler can accumulate
//! the sitemap.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::{create_dir_all, File};
use std::path::Path;

use chrono::{Datelike, Utc};
use gtmpl::{Context, Value};
use tracing::debug;

use crate::config::TemplateNames;
use crate::page::Page;
use crate::template::{self, Registry};

/// The sentinel tag group for untagged posts. It sorts after every named
/// group regardless of alphabetical order.
pub const UNTAGGED_GROUP: &str = "miscellaneous";

/// Everything a [`Step`] needs besides the posts themselves.
pub struct StepContext<'a> {
    pub output_dir: &'a Path,
    pub templates: &'a Registry,
    pub names: &'a TemplateNames,
}

/// One derived view of the post collection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// All posts, date-descending, at `blog/index.html`.
    Index,

    /// The same list through the archive template, at
    /// `blog/archive/index.html`.
    Archive,

    /// One `blog/<year>/index.html` per distinct post year.
    YearArchives,

    /// One `blog/<year>/<month>/index.html` per distinct (year, month).
    MonthArchives,

    /// Posts grouped by tag at `blog/tags/index.html`.
    Tags,

    /// The JSON feed at `blog/feed.json`.
    JsonFeed,

    /// The RSS feed at `blog/rss.xml`.
    RssFeed,
}

impl Step {
    /// Every step, in the order the compiler runs them.
    pub const ALL: [Step; 7] = [
        Step::Index,
        Step::Archive,
        Step::YearArchives,
        Step::MonthArchives,
        Step::Tags,
        Step::JsonFeed,
        Step::RssFeed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Index => "blog index",
            Step::Archive => "main archive",
            Step::YearArchives => "year archives",
            Step::MonthArchives => "month archives",
            Step::Tags => "tag index",
            Step::JsonFeed => "JSON feed",
            Step::RssFeed => "RSS feed",
        }
    }

    /// Runs the step over the blog-eligible posts, returning the relative
    /// paths it wrote.
    pub fn run(&self, posts: &[&Page], ctx: &StepContext) -> Result<Vec<String>> {
        let posts = sort_posts(posts);
        match self {
            Step::Index => {
                let context = posts_context(&posts);
                render_to(ctx, &ctx.names.blog_home, "blog/index.html", context)
            }
            Step::Archive => {
                let context = posts_context(&posts);
                render_to(ctx, &ctx.names.blog_archives, "blog/archive/index.html", context)
            }
            Step::YearArchives => {
                let mut written = Vec::new();
                for year in years(&posts) {
                    let subset = posts_in_year(&posts, year);
                    let mut context = posts_context(&subset);
                    context.insert("year".to_owned(), i64::from(year).into());
                    written.extend(render_to(
                        ctx,
                        &ctx.names.blog_archives,
                        &format!("blog/{:04}/index.html", year),
                        context,
                    )?);
                }
                Ok(written)
            }
            Step::MonthArchives => {
                let mut written = Vec::new();
                for year in years(&posts) {
                    let year_subset = posts_in_year(&posts, year);
                    for month in months(&year_subset) {
                        let subset = posts_in_month(&year_subset, month);
                        let mut context = posts_context(&subset);
                        context.insert("year".to_owned(), i64::from(year).into());
                        context.insert("month".to_owned(), i64::from(month).into());
                        written.extend(render_to(
                            ctx,
                            &ctx.names.blog_archives,
                            &format!("blog/{:04}/{:02}/index.html", year, month),
                            context,
                        )?);
                    }
                }
                Ok(written)
            }
            Step::Tags => {
                let groups = tag_groups(&posts);
                let mut context: HashMap<String, Value> = HashMap::new();
                context.insert(
                    "tags".to_owned(),
                    Value::Array(
                        groups
                            .iter()
                            .map(|(name, members)| {
                                let mut g: HashMap<String, Value> = HashMap::new();
                                g.insert("name".to_owned(), Value::String(name.clone()));
                                g.insert(
                                    "posts".to_owned(),
                                    Value::Array(members.iter().map(|p| p.to_value()).collect()),
                                );
                                Value::Object(g)
                            })
                            .collect(),
                    ),
                );
                render_to(ctx, &ctx.names.blog_tags, "blog/tags/index.html", context)
            }
            Step::JsonFeed => {
                let context = posts_context(&posts);
                render_to(ctx, &ctx.names.feed_json, "blog/feed.json", context)
            }
            Step::RssFeed => {
                let mut context = posts_context(&posts);
                context.insert(
                    "build_date".to_owned(),
                    Value::String(Utc::now().to_rfc2822()),
                );
                render_to(ctx, &ctx.names.feed_rss, "blog/rss.xml", context)
            }
        }
    }
}

fn posts_context(posts: &[&Page]) -> HashMap<String, Value> {
    let mut context: HashMap<String, Value> = HashMap::new();
    context.insert(
        "posts".to_owned(),
        Value::Array(posts.iter().map(|p| p.to_value()).collect()),
    );
    context
}

fn render_to(
    ctx: &StepContext,
    template_name: &str,
    rel_path: &str,
    context: HashMap<String, Value>,
) -> Result<Vec<String>> {
    let template = ctx.templates.get(template_name)?;
    let mut path = ctx.output_dir.to_owned();
    path.extend(rel_path.split('/'));
    // parent always exists: rel_path carries at least one directory
    create_dir_all(path.parent().unwrap())?;
    let gtmpl_context = Context::from(Value::Object(context)).map_err(Error::Render)?;
    template
        .execute(&mut File::create(&path)?, &gtmpl_context)
        .map_err(Error::Render)?;
    debug!(path = %rel_path, "wrote aggregate page");
    Ok(vec![rel_path.to_owned()])
}

/// Sorts posts date-descending. Ties break on `rel_path` so builds are
/// reproducible.
pub fn sort_posts<'a>(posts: &[&'a Page]) -> Vec<&'a Page> {
    let mut sorted = posts.to_vec();
    sorted.sort_by(|a, b| {
        b.effective_date()
            .cmp(&a.effective_date())
            .then_with(|| a.rel_path.cmp(&b.rel_path))
    });
    sorted
}

/// The distinct years among the posts' effective dates, ascending.
pub fn years(posts: &[&Page]) -> BTreeSet<i32> {
    posts.iter().map(|p| p.effective_date().year()).collect()
}

/// The distinct months among the posts' effective dates, ascending.
pub fn months(posts: &[&Page]) -> BTreeSet<u32> {
    posts.iter().map(|p| p.effective_date().month()).collect()
}

/// The posts whose effective date falls in `year`, preserving input order.
pub fn posts_in_year<'a>(posts: &[&'a Page], year: i32) -> Vec<&'a Page> {
    posts
        .iter()
        .filter(|p| p.effective_date().year() == year)
        .copied()
        .collect()
}

/// The posts whose effective date falls in `month`, preserving input order.
pub fn posts_in_month<'a>(posts: &[&'a Page], month: u32) -> Vec<&'a Page> {
    posts
        .iter()
        .filter(|p| p.effective_date().month() == month)
        .copied()
        .collect()
}

/// Groups posts by tag. A post with N tags appears in N groups; group members
/// keep the date-descending order of the input. Groups are ordered by
/// slugified tag name ascending, except the [`UNTAGGED_GROUP`] bucket for
/// untagged posts, which always sorts last.
pub fn tag_groups<'a>(posts: &[&'a Page]) -> Vec<(String, Vec<&'a Page>)> {
    let mut groups: BTreeMap<String, Vec<&Page>> = BTreeMap::new();
    let mut untagged: Vec<&Page> = Vec::new();
    for post in posts {
        if post.meta.tags.is_empty() {
            untagged.push(post);
            continue;
        }
        for tag in &post.meta.tags {
            groups.entry(slug::slugify(tag)).or_default().push(post);
        }
    }
    let mut result: Vec<(String, Vec<&Page>)> = groups.into_iter().collect();
    if !untagged.is_empty() {
        result.push((UNTAGGED_GROUP.to_owned(), untagged));
    }
    result
}

/// Represents the result of a fallible aggregation step.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error producing a derived blog view.
#[derive(Debug)]
pub enum Error {
    /// Returned when a view's template is missing or unloadable.
    Template(template::Error),

    /// Returned when template execution fails.
    Render(String),

    /// Returned for I/O problems writing output files.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::Render(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<template::Error> for Error {
    /// Converts a [`template::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when fetching view templates.
    fn from(err: template::Error) -> Error {
        Error::Template(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
