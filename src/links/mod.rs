//! Link harvesting: turn anything link-shaped into canonical article links.
//!
//! The scrape service is inconsistent about where links end up. Depending on
//! the call they arrive as a `links` array of strings, an array of objects,
//! anchors inside `html`, markdown inside `summary`, or bare URLs in plain
//! text. This module mines all of them and merges the results:
//!
//! - [`extract`]: HTML, markdown and free-text extraction passes
//! - [`canonical`]: URL canonicalization, site validation and derived titles
//! - [`harvest`]: the fixed set of passes run over one scrape
//! - [`LinkAggregator`]: the dedup-stable collector all passes feed into

pub mod canonical;
pub mod extract;
pub mod harvest;

use std::collections::HashSet;

use serde_json::Value;

use crate::models::CanonicalLink;
use crate::normalize::resolve_alias;
use canonical::{DEFAULT_TITLE, canonical_article_url, title_from_url};

pub use harvest::harvest_scrape;

/// Keys a link object may carry its target under, in priority order.
pub const URL_ALIASES: &[&str] = &["url", "href", "link", "permalink", "sourceURL"];

/// Keys a link object may carry its label under, in priority order.
pub const TITLE_ALIASES: &[&str] = &["title", "text", "name", "heading", "label", "description"];

/// Nesting deeper than this is not followed when walking unknown JSON.
///
/// Matches serde_json's parser recursion limit, so any payload that came off
/// the wire is walked in full; only hand-built values can exceed it.
const MAX_WALK_DEPTH: usize = 128;

/// A raw, unvalidated link as found by one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub url: String,
    pub title: String,
}

impl LinkCandidate {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// The recognised shapes link data arrives in.
enum LinkShape<'a> {
    Absent,
    /// A single link-like string.
    Text(&'a str),
    /// A flat list: each entry is a string or a link object.
    List(&'a [Value]),
    /// Any other object graph; walked generically.
    Tree(&'a Value),
}

impl<'a> LinkShape<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => LinkShape::Text(s),
            Value::Array(items) => LinkShape::List(items),
            Value::Object(_) => LinkShape::Tree(value),
            _ => LinkShape::Absent,
        }
    }
}

/// Resolve url and title from a link object's alias keys.
fn candidate_from_object(value: &Value) -> Option<LinkCandidate> {
    let object = value.as_object()?;
    Some(LinkCandidate::new(
        resolve_alias(&[object], URL_ALIASES),
        resolve_alias(&[object], TITLE_ALIASES),
    ))
}

/// Flatten an unknown object graph into candidates.
///
/// Every string becomes an untitled candidate; every object with a url or a
/// title becomes one and its children are walked as well.
fn walk_tree(value: &Value, depth: usize, out: &mut Vec<LinkCandidate>) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(LinkCandidate::new(s.as_str(), "")),
        Value::Array(items) => {
            for item in items {
                walk_tree(item, depth + 1, out);
            }
        }
        Value::Object(object) => {
            if let Some(candidate) = candidate_from_object(value) {
                if !candidate.url.is_empty() || !candidate.title.is_empty() {
                    out.push(candidate);
                }
            }
            for child in object.values() {
                walk_tree(child, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Turn arbitrary link data into flat candidates.
pub fn candidates_from_value(value: &Value) -> Vec<LinkCandidate> {
    match LinkShape::classify(value) {
        LinkShape::Absent => Vec::new(),
        LinkShape::Text(s) => vec![LinkCandidate::new(s, "")],
        LinkShape::List(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(LinkCandidate::new(s.as_str(), "")),
                Value::Object(_) => candidate_from_object(item),
                _ => None,
            })
            .collect(),
        LinkShape::Tree(root) => {
            let mut out = Vec::new();
            walk_tree(root, 0, &mut out);
            out
        }
    }
}

/// Canonicalize a candidate for The Hacker News, or reject it.
pub fn hacker_news_link(candidate: LinkCandidate) -> Option<CanonicalLink> {
    let url = canonical_article_url(&candidate.url)?;
    let title = match candidate.title.trim() {
        "" => title_from_url(&url, DEFAULT_TITLE),
        title => title.to_string(),
    };
    Some(CanonicalLink { title, url })
}

/// Collects canonical links from any number of passes.
///
/// Dedup is by canonical URL and first-seen wins: a later duplicate never
/// replaces the title of an earlier one and never changes the order.
pub struct LinkAggregator {
    normalize: fn(LinkCandidate) -> Option<CanonicalLink>,
    seen: HashSet<String>,
    links: Vec<CanonicalLink>,
}

impl LinkAggregator {
    pub fn new(normalize: fn(LinkCandidate) -> Option<CanonicalLink>) -> Self {
        Self {
            normalize,
            seen: HashSet::new(),
            links: Vec::new(),
        }
    }

    /// An aggregator for The Hacker News article permalinks.
    pub fn hacker_news() -> Self {
        Self::new(hacker_news_link)
    }

    pub fn add<I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = LinkCandidate>,
    {
        for link in candidates.into_iter().filter_map(self.normalize) {
            if self.seen.insert(link.url.clone()) {
                self.links.push(link);
            }
        }
    }

    /// Add link data of unknown shape.
    pub fn add_value(&mut self, value: &Value) {
        self.add(candidates_from_value(value));
    }

    pub fn all(&self) -> Vec<CanonicalLink> {
        self.links.clone()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl std::fmt::Debug for LinkAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkAggregator")
            .field("links", &self.links.len())
            .finish()
    }
}
