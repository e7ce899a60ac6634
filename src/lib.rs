//! The library code for the `scrivener` static site generator. A build is a
//! single sequential pass with three distinct steps:
//!
//! 1. Collecting pages from source files on disk ([`crate::collect`]),
//!    extracting each document's metadata header ([`crate::frontmatter`]) and
//!    converting its body to HTML ([`crate::markdown`])
//! 2. Rendering every page through the template resolved for it
//!    ([`crate::template`])
//! 3. Deriving the aggregate blog views from the full collection
//!    ([`crate::blog`]): the chronological index, the year and month
//!    archives, the tag index, and the feeds
//!
//! Of the three, the third is the most involved: the aggregate views are an
//! ordered list of named steps, each of which groups and sorts the post
//! collection its own way and reports the paths it wrote. The orchestrator
//! ([`crate::compile`]) accumulates those paths, together with the
//! individually-rendered pages and the mirrored binary assets, into the
//! sitemap ([`crate::sitemap`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod blog;
pub mod collect;
pub mod compile;
pub mod config;
pub mod frontmatter;
pub mod markdown;
pub mod page;
pub mod sitemap;
pub mod sync;
pub mod template;
