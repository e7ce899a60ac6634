//! Extracts the optional metadata header from the top of a source document
//! and normalizes it into a [`Metadata`] record. A header is fenced by lines
//! consisting solely of `---` or `...` (each fence matched independently);
//! the interior is parsed as a YAML mapping whose keys are lowercased on
//! ingestion.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Splits `text` into its body and its metadata mapping. Documents without a
/// header pass through unchanged with an empty mapping. A header that opens
/// but never closes is a malformed document and fails with
/// [`Error::UnclosedHeader`].
pub fn extract(text: &str) -> Result<(String, Mapping)> {
    let lines: Vec<&str> = text.lines().collect();

    let mut start: Option<usize> = None;
    let mut end: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fence = trimmed == "---" || trimmed == "...";
        match (fence, start) {
            // Body text began without a header ever opening.
            (false, None) => break,
            (true, None) => start = Some(i),
            (true, Some(_)) => {
                end = Some(i);
                break;
            }
            // Header content line.
            (false, Some(_)) => {}
        }
    }

    match (start, end) {
        (None, _) => Ok((text.to_owned(), Mapping::new())),
        (Some(_), None) => Err(Error::UnclosedHeader),
        (Some(s), Some(e)) => {
            let body = lines[e + 1..].join("\n");
            let mapping = parse_mapping(&lines[s + 1..e].join("\n"))?;
            Ok((body, lowercase_keys(mapping)))
        }
    }
}

fn parse_mapping(interior: &str) -> Result<Mapping> {
    if interior.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str(interior)? {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => Err(Error::HeaderNotAMapping),
    }
}

fn lowercase_keys(mapping: Mapping) -> Mapping {
    let mut lowered = Mapping::new();
    for (k, v) in mapping {
        match k {
            Value::String(s) => lowered.insert(Value::String(s.to_lowercase()), v),
            other => lowered.insert(other, v),
        };
    }
    lowered
}

/// The recognized metadata fields, each defaulted when absent from the
/// source. Unrecognized keys are preserved verbatim in `extra` and logged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub tags: Vec<String>,
    pub template: Option<String>,
    pub draft: bool,
    pub extra: Mapping,
}

impl Metadata {
    /// Normalizes a raw header mapping into a [`Metadata`] record. This never
    /// fails: malformed values are dropped with a warning and replaced by the
    /// field default.
    pub fn from_mapping(mapping: Mapping) -> Metadata {
        let mut meta = Metadata::default();
        for (key, value) in mapping {
            let key = match &key {
                Value::String(s) => s.as_str().to_owned(),
                other => {
                    warn!(?other, "non-string metadata key will not be parsed");
                    continue;
                }
            };
            match key.as_str() {
                "title" => meta.title = string_value(&key, &value),
                "date" => {
                    meta.date = string_value(&key, &value).and_then(|s| parse_date(&s));
                }
                "tags" => meta.tags = tag_values(&value),
                "template" => meta.template = string_value(&key, &value),
                "draft" => match value.as_bool() {
                    Some(b) => meta.draft = b,
                    None => warn!(%key, "metadata value is not a boolean"),
                },
                _ => {
                    warn!(%key, "unexpected metadata key will not be parsed");
                    meta.extra.insert(Value::String(key), value);
                }
            }
        }
        meta
    }
}

fn string_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => {
            warn!(%key, "metadata value is not a string");
            None
        }
    }
}

fn tag_values(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| string_value("tags", v))
            .collect(),
        // A bare scalar is treated as a single tag.
        Value::String(s) => vec![s.clone()],
        _ => {
            warn!("metadata tags are not a sequence");
            Vec::new()
        }
    }
}

/// Parses a header date. The accepted formats are tried most- to
/// least-specific; anything else normalizes to "no date".
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %I:%M %p"];
    for format in &FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(d.and_hms(0, 0, 0)),
        Err(_) => {
            warn!(date = %s, "unparseable date in metadata");
            None
        }
    }
}

/// Represents the result of a header-extraction operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error extracting a document's metadata header.
#[derive(Debug)]
pub enum Error {
    /// Returned when a header fence was opened but never closed.
    UnclosedHeader,

    /// Returned when the header interior is valid YAML but not a mapping.
    HeaderNotAMapping,

    /// Returned when there was an error parsing the header as YAML.
    Yaml(serde_yaml::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnclosedHeader => {
                write!(f, "did not find the end of the metadata header block")
            }
            Error::HeaderNotAMapping => {
                write!(f, "metadata header is not a key/value mapping")
            }
            Error::Yaml(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnclosedHeader => None,
            Error::HeaderNotAMapping => None,
            Error::Yaml(err) => Some(err),
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

    fn str_key(mapping: &Mapping, key: &str) -> Option<String> {
        mapping
            .get(&Value::String(key.to_owned()))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    #[test]
    fn test_extract_well_formed_header() {
        let (body, mapping) = extract("---\ntitle: Hi\n---\nBody").unwrap();
        assert_eq!(body, "Body");
        assert_eq!(str_key(&mapping, "title"), Some("Hi".to_owned()));
    }

    #[test]
    fn test_extract_dot_fence() {
        let (body, mapping) = extract("...\ntitle: Hi\n...\nBody").unwrap();
        assert_eq!(body, "Body");
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_extract_no_header_is_identity() {
        let input = "Just some text\n\nwith paragraphs";
        let (body, mapping) = extract(input).unwrap();
        assert_eq!(body, input);
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_extract_leading_blank_lines_skipped() {
        let (body, mapping) = extract("\n\n---\ntitle: Hi\n---\nBody").unwrap();
        assert_eq!(body, "Body");
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_extract_unclosed_header_fails() {
        match extract("---\ntitle: Hi\nBody") {
            Err(Error::UnclosedHeader) => {}
            other => panic!("expected UnclosedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_lowercases_keys() {
        let (_, mapping) = extract("---\nTitle: Hi\nTAGS: [a]\n---\n").unwrap();
        assert!(str_key(&mapping, "title").is_some());
        assert!(mapping.contains_key(&Value::String("tags".to_owned())));
        assert!(!mapping.contains_key(&Value::String("Title".to_owned())));
    }

    #[test]
    fn test_extract_empty_header() {
        let (body, mapping) = extract("---\n---\nBody").unwrap();
        assert_eq!(body, "Body");
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_metadata_defaults() {
        let meta = Metadata::from_mapping(Mapping::new());
        assert_eq!(meta.title, None);
        assert_eq!(meta.date, None);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.template, None);
        assert!(!meta.draft);
    }

    #[test]
    fn test_metadata_normalization() {
        let (_, mapping) = extract(
            "---\ntitle: Post\ndate: 2023-01-05\ntags: [a, b]\ndraft: true\ntemplate: t.html\n---\n",
        )
        .unwrap();
        let meta = Metadata::from_mapping(mapping);
        assert_eq!(meta.title, Some("Post".to_owned()));
        assert_eq!(
            meta.date,
            Some(NaiveDate::from_ymd(2023, 1, 5).and_hms(0, 0, 0))
        );
        assert_eq!(meta.tags, vec!["a".to_owned(), "b".to_owned()]);
        assert!(meta.draft);
        assert_eq!(meta.template, Some("t.html".to_owned()));
    }

    #[test]
    fn test_metadata_unrecognized_keys_pass_through() {
        let (_, mapping) = extract("---\nauthor: someone\n---\n").unwrap();
        let meta = Metadata::from_mapping(mapping);
        assert_eq!(
            meta.extra.get(&Value::String("author".to_owned())),
            Some(&Value::String("someone".to_owned()))
        );
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date("2023-02-10 09:30"),
            Some(NaiveDate::from_ymd(2023, 2, 10).and_hms(9, 30, 0))
        );
        assert_eq!(
            parse_date("2023-02-10 09:30 PM"),
            Some(NaiveDate::from_ymd(2023, 2, 10).and_hms(21, 30, 0))
        );
        assert_eq!(parse_date("not a date"), None);
    }
}
