//! Markdown-to-HTML conversion. A fresh [`Parser`] is constructed for every
//! document, so no parser state can leak between files.

use pulldown_cmark::{html, Options, Parser};
use serde_yaml::Mapping;

use crate::frontmatter;

/// Converts a source document into rendered HTML plus its raw metadata
/// mapping. The body handed to the Markdown parser has already had the
/// metadata header stripped by [`frontmatter::extract`].
pub fn convert(text: &str) -> frontmatter::Result<(String, Mapping)> {
    let (body, mapping) = frontmatter::extract(text)?;

    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut html_out = String::new();
    html::push_html(&mut html_out, Parser::new_ext(&body, options));
    Ok((html_out, mapping))
}
