//! Defines the [`Page`] type: one compiled source document plus its
//! normalized metadata and derived addressing (slug, URL, output path). Pages
//! are read-only after construction except for the related-pages enrichment,
//! which is applied at most once per build before rendering.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use gtmpl::{Context, Template, Value};

use crate::frontmatter::{self, Metadata};
use crate::markdown;

/// The path prefix marking a page as a member of the blog collection.
pub const BLOG_PREFIX: &str = "blog/";

/// The date assigned to pages without date metadata, so that every page is
/// totally ordered by date.
pub fn default_date() -> NaiveDateTime {
    NaiveDate::from_ymd(2001, 1, 1).and_hms(0, 0, 0)
}

/// A single page of the website.
pub struct Page {
    /// Absolute location of the source document.
    pub source_path: PathBuf,

    /// Path relative to the source root, always forward-slash separated.
    /// This is the page's identity: unique across one build.
    pub rel_path: String,

    /// The original source text.
    pub text: String,

    /// The rendered HTML body.
    pub html: String,

    /// The normalized metadata record.
    pub meta: Metadata,

    /// Related pages as `(score, url)` pairs, score descending. Populated
    /// after construction by the similarity collaborator.
    pub related: Vec<(f64, String)>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Page({})", self.rel_path)
    }
}

impl Page {
    /// Reads and converts a source file. Fails if the file cannot be read or
    /// if its metadata header is malformed.
    pub fn from_file(source_path: &Path, rel_path: &str) -> Result<Page> {
        use std::io::Read;
        let mut text = String::new();
        File::open(source_path)
            .map_err(|e| Error::annotate(rel_path, Error::Io(e)))?
            .read_to_string(&mut text)
            .map_err(|e| Error::annotate(rel_path, Error::Io(e)))?;
        Page::from_text(source_path, rel_path, text)
    }

    /// Converts already-read source text into a [`Page`].
    pub fn from_text(source_path: &Path, rel_path: &str, text: String) -> Result<Page> {
        let (html, mapping) = markdown::convert(&text)
            .map_err(|e| Error::annotate(rel_path, Error::Extract(e)))?;
        Ok(Page {
            source_path: source_path.to_owned(),
            rel_path: rel_path.to_owned(),
            text,
            html,
            meta: Metadata::from_mapping(mapping),
            related: Vec::new(),
        })
    }

    /// The extension-stripped relative path, used as the page's canonical
    /// identifier.
    pub fn slug(&self) -> &str {
        match self.rel_path.rfind('.') {
            Some(i) if !self.rel_path[i..].contains('/') => &self.rel_path[..i],
            _ => &self.rel_path,
        }
    }

    /// The site-relative URL for the rendered page.
    pub fn url(&self) -> String {
        format!("{}.html", self.slug())
    }

    /// The containing directory of the page, relative to the source root.
    /// Empty for pages at the root.
    pub fn top_dir(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(i) => &self.rel_path[..i],
            None => "",
        }
    }

    /// The output location for the rendered page, rooted at `base`. Directory
    /// structure is preserved; the source extension becomes `.html`.
    pub fn output_path(&self, base: &Path) -> PathBuf {
        let mut path = base.to_owned();
        path.extend(self.url().split('/'));
        path
    }

    /// The page's date for sorting and grouping. Total: pages without date
    /// metadata all receive [`default_date`].
    pub fn effective_date(&self) -> NaiveDateTime {
        self.meta.date.unwrap_or_else(default_date)
    }

    /// Whether the page belongs to the blog collection.
    pub fn is_blog_post(&self) -> bool {
        self.rel_path.starts_with(BLOG_PREFIX)
    }

    /// Renders the page. Without a template the rendered HTML is returned
    /// verbatim; with one, the page's fields are exposed to the template as a
    /// context object.
    pub fn render(&self, template: Option<&Template>) -> Result<String> {
        let template = match template {
            None => return Ok(self.html.clone()),
            Some(t) => t,
        };
        let context = Context::from(self.to_value()).map_err(Error::Template)?;
        let mut out: Vec<u8> = Vec::new();
        template.execute(&mut out, &context).map_err(Error::Template)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Converts the page into a template [`Value`]. Metadata fields are
    /// exposed under their header names; unrecognized header keys pass
    /// through unchanged.
    pub fn to_value(&self) -> Value {
        let date = self.effective_date();
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("content".to_owned(), Value::String(self.html.clone()));
        m.insert(
            "escaped_content".to_owned(),
            Value::String(serde_json::to_string(&self.html).unwrap_or_default()),
        );
        m.insert("slug".to_owned(), Value::String(self.slug().to_owned()));
        m.insert("url".to_owned(), Value::String(self.url()));
        m.insert("topdir".to_owned(), Value::String(self.top_dir().to_owned()));
        m.insert(
            "title".to_owned(),
            match &self.meta.title {
                Some(title) => Value::String(title.clone()),
                None => Value::Nil,
            },
        );
        m.insert(
            "date".to_owned(),
            match self.meta.date {
                Some(_) => Value::String(date.format("%Y-%m-%d %H:%M").to_string()),
                None => Value::Nil,
            },
        );
        m.insert(
            "date_rfc2822".to_owned(),
            Value::String(date.format("%a, %d %b %Y %H:%M:%S +0000").to_string()),
        );
        m.insert(
            "date_rfc3339".to_owned(),
            Value::String(date.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(
                self.meta
                    .tags
                    .iter()
                    .map(|t| Value::String(t.clone()))
                    .collect(),
            ),
        );
        m.insert("draft".to_owned(), Value::Bool(self.meta.draft));
        m.insert(
            "related".to_owned(),
            Value::Array(
                self.related
                    .iter()
                    .map(|(score, url)| {
                        let mut r: HashMap<String, Value> = HashMap::new();
                        r.insert("score".to_owned(), (*score).into());
                        r.insert("url".to_owned(), Value::String(url.clone()));
                        Value::Object(r)
                    })
                    .collect(),
            ),
        );
        for (key, value) in self.meta.extra.iter() {
            if let (serde_yaml::Value::String(key), Some(value)) = (key, yaml_to_value(value)) {
                m.entry(key.clone()).or_insert(value);
            }
        }
        Value::Object(m)
    }
}

/// Converts scalar YAML pass-through values into template values. Nested
/// structures are not exposed to templates.
fn yaml_to_value(value: &serde_yaml::Value) -> Option<Value> {
    match value {
        serde_yaml::Value::String(s) => Some(Value::String(s.clone())),
        serde_yaml::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.into())
            } else {
                n.as_f64().map(Into::into)
            }
        }
        _ => None,
    }
}

/// Represents the result of a fallible [`Page`] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error constructing or rendering a [`Page`].
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file cannot be read.
    Io(std::io::Error),

    /// Returned when the metadata header is malformed.
    Extract(frontmatter::Error),

    /// Returned when template execution fails.
    Template(String),

    /// An error with the page it concerns attached.
    Annotated(String, Box<Error>),
}

impl Error {
    fn annotate(rel_path: &str, err: Error) -> Error {
        Error::Annotated(format!("page `{}`", rel_path), Box::new(err))
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Extract(err) => err.fmt(f),
            Error::Template(err) => err.fmt(f),
            Error::Annotated(annotation, err) => write!(f, "{}: {}", annotation, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Extract(err) => Some(err),
            Error::Template(_) => None,
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<frontmatter::Error> for Error {
    /// Converts a [`frontmatter::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when extracting metadata.
    fn from(err: frontmatter::Error) -> Error {
        Error::Extract(err)
    }
}
