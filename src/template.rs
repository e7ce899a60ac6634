//! The template registry and the per-page template resolution search.
//!
//! Every file under the template directory is parsed into a [`Template`] and
//! registered under its slash-separated relative path. Resolution for a page
//! follows a strict priority order: an explicit `template` metadata value
//! wins outright, then the page's output directory is walked from most- to
//! least-specific looking for `<dir>/main.html` or `<dir>.html`, and finally
//! the global default applies.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;

use gtmpl::Template;
use tracing::debug;
use walkdir::WalkDir;

use crate::collect::slash_path;
use crate::page::Page;

/// The global fallback template, applied when no ancestor directory yields a
/// match.
pub const DEFAULT_TEMPLATE: &str = "main.html";

/// A set of named, parsed templates.
pub struct Registry {
    templates: HashMap<String, Template>,
}

impl Registry {
    /// Loads and parses every file under `dir`. Dot-prefixed files and
    /// directories are skipped.
    pub fn from_directory(dir: &Path) -> Result<Registry> {
        let mut templates = HashMap::new();
        for result in WalkDir::new(dir).sort_by_file_name() {
            let entry = result?;
            if !entry.file_type().is_file() {
                continue;
            }
            // strip_prefix never fails: the walker stays under dir
            let name = slash_path(entry.path().strip_prefix(dir).unwrap());
            if name.split('/').any(|segment| segment.starts_with('.')) {
                continue;
            }
            use std::io::Read;
            let mut contents = String::new();
            File::open(entry.path())?.read_to_string(&mut contents)?;
            let mut template = Template::default();
            template.parse(&contents).map_err(|err| Error::Parse {
                name: name.clone(),
                err,
            })?;
            templates.insert(name, template);
        }
        Ok(Registry { templates })
    }

    /// Builds a registry from already-parsed templates. Used by tests and by
    /// callers that assemble templates programmatically.
    pub fn from_templates(templates: HashMap<String, Template>) -> Registry {
        Registry { templates }
    }

    /// Looks up a template by identifier.
    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_owned()))
    }

    /// The set of registered template identifiers.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Determines the template governing `page`. An explicit but unregistered
    /// `template` metadata value is an error; the ambient search is total as
    /// long as [`DEFAULT_TEMPLATE`] is registered.
    pub fn resolve(&self, page: &Page) -> Result<&Template> {
        if let Some(name) = &page.meta.template {
            return self.get(name);
        }
        let name = ancestor_search(page.top_dir(), |name| self.templates.contains_key(name));
        debug!(page = %page.rel_path, template = %name, "resolved template");
        self.get(&name)
    }
}

/// Walks `dir` from most- to least-specific, testing `<dir>/main.html` then
/// `<dir>.html` at every level, falling back to [`DEFAULT_TEMPLATE`].
///
/// A page at `work/physics/index.md` tries, in order:
/// `work/physics/main.html`, `work/physics.html`, `work/main.html`,
/// `work.html`, `main.html`.
pub fn ancestor_search(dir: &str, registered: impl Fn(&str) -> bool) -> String {
    let mut base = dir.to_owned();
    while !base.is_empty() {
        let candidate = format!("{}/main.html", base);
        if registered(&candidate) {
            return candidate;
        }
        let candidate = format!("{}.html", base);
        if registered(&candidate) {
            return candidate;
        }
        match base.rfind('/') {
            Some(i) => base.truncate(i),
            None => break,
        }
    }
    DEFAULT_TEMPLATE.to_owned()
}

/// Represents the result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or resolving templates.
#[derive(Debug)]
pub enum Error {
    /// Returned when a requested template identifier is not registered.
    TemplateNotFound(String),

    /// Returned when a template file fails to parse.
    Parse { name: String, err: String },

    /// Returned for I/O problems reading template files.
    Io(std::io::Error),

    /// Returned for walk errors over the template directory.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::TemplateNotFound(name) => write!(f, "template not found: `{}`", name),
            Error::Parse { name, err } => {
                write!(f, "parsing template `{}`: {}", name, err)
            }
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TemplateNotFound(_) => None,
            Error::Parse { name: _, err: _ } => None,
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
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

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for directory walks.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
