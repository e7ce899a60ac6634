//! Build configuration: directory locations, the site URL, the template
//! identifiers used by the aggregate views, and the optional project file
//! (`scrivener.yaml`) that can supply any of them. Command-line flags take
//! precedence over the project file.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

/// The template identifiers the aggregation steps render with.
#[derive(Clone, Debug, Deserialize)]
pub struct TemplateNames {
    #[serde(default = "default_blog_home")]
    pub blog_home: String,

    #[serde(default = "default_blog_archives")]
    pub blog_archives: String,

    #[serde(default = "default_blog_tags")]
    pub blog_tags: String,

    #[serde(default = "default_feed_json")]
    pub feed_json: String,

    #[serde(default = "default_feed_rss")]
    pub feed_rss: String,
}

fn default_blog_home() -> String {
    "blog/home.html".to_owned()
}
fn default_blog_archives() -> String {
    "blog/archives.html".to_owned()
}
fn default_blog_tags() -> String {
    "blog/tags.html".to_owned()
}
fn default_feed_json() -> String {
    "feeds/feed.json".to_owned()
}
fn default_feed_rss() -> String {
    "feeds/rss.xml".to_owned()
}

impl Default for TemplateNames {
    fn default() -> TemplateNames {
        TemplateNames {
            blog_home: default_blog_home(),
            blog_archives: default_blog_archives(),
            blog_tags: default_blog_tags(),
            feed_json: default_feed_json(),
            feed_rss: default_feed_rss(),
        }
    }
}

/// The optional project file. Every field may be omitted and supplied on the
/// command line instead.
#[derive(Debug, Default, Deserialize)]
pub struct Project {
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub site_url: Option<Url>,

    #[serde(default)]
    pub include_drafts: bool,

    pub related_threshold: Option<f64>,

    pub templates: Option<TemplateNames>,

    /// When set, the integer in this file (relative to the source directory)
    /// is bumped after every successful build.
    pub build_count_file: Option<PathBuf>,
}

impl Project {
    /// Reads and parses a project file.
    pub fn from_file(path: &Path) -> Result<Project> {
        let file = File::open(path).map_err(|err| Error::Open {
            path: path.to_owned(),
            err,
        })?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

/// The fully-resolved build configuration.
#[derive(Debug)]
pub struct Config {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
    pub site_url: Url,
    pub include_drafts: bool,

    /// Related-page scores at or below this threshold are discarded.
    pub related_threshold: f64,

    pub templates: TemplateNames,
    pub build_count_file: Option<PathBuf>,
}

impl Config {
    /// Merges a project file with command-line overrides. Each required
    /// setting must come from one of the two.
    pub fn resolve(
        project: Project,
        source_dir: Option<PathBuf>,
        output_dir: Option<PathBuf>,
        template_dir: Option<PathBuf>,
        site_url: Option<Url>,
        include_drafts: bool,
    ) -> Result<Config> {
        Ok(Config {
            source_dir: source_dir
                .or(project.source_dir)
                .ok_or(Error::Missing("source directory"))?,
            output_dir: output_dir
                .or(project.output_dir)
                .ok_or(Error::Missing("output directory"))?,
            template_dir: template_dir
                .or(project.template_dir)
                .ok_or(Error::Missing("template directory"))?,
            site_url: site_url
                .or(project.site_url)
                .ok_or(Error::Missing("site URL"))?,
            include_drafts: include_drafts || project.include_drafts,
            related_threshold: project.related_threshold.unwrap_or(0.001),
            templates: project.templates.unwrap_or_default(),
            build_count_file: project.build_count_file,
        })
    }
}

/// Represents the result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or resolving configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when the project file cannot be opened.
    Open { path: PathBuf, err: std::io::Error },

    /// Returned when the project file is not valid YAML.
    Yaml(serde_yaml::Error),

    /// Returned when a required setting is supplied neither on the command
    /// line nor in the project file.
    Missing(&'static str),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => {
                write!(f, "opening project file '{}': {}", path.display(), err)
            }
            Error::Yaml(err) => err.fmt(f),
            Error::Missing(setting) => write!(f, "missing required setting: {}", setting),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Missing(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_resolve_cli_overrides_project() {
        let project = Project {
            source_dir: Some(PathBuf::from("/project/src")),
            site_url: Some(Url::parse("https://project.example").unwrap()),
            ..Project::default()
        };
        let config = Config::resolve(
            project,
            Some(PathBuf::from("/cli/src")),
            Some(PathBuf::from("/cli/out")),
            Some(PathBuf::from("/cli/templates")),
            None,
            false,
        )
        .unwrap();
        assert_eq!(config.source_dir, PathBuf::from("/cli/src"));
        assert_eq!(config.site_url.as_str(), "https://project.example/");
        assert_eq!(config.related_threshold, 0.001);
    }

    #[test]
    fn test_resolve_missing_setting_fails() {
        match Config::resolve(Project::default(), None, None, None, None, false) {
            Err(Error::Missing(setting)) => assert_eq!(setting, "source directory"),
            other => panic!("expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn test_project_file_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrivener.yaml");
        std::fs::write(
            &path,
            "site_url: https://example.com\ninclude_drafts: true\nrelated_threshold: 0.05\n",
        )
        .unwrap();
        let project = Project::from_file(&path).unwrap();
        assert!(project.include_drafts);
        assert_eq!(project.related_threshold, Some(0.05));
        assert_eq!(
            project.site_url.as_ref().map(Url::as_str),
            Some("https://example.com/")
        );
    }
}
