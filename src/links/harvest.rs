//! The fixed set of extraction passes run over one scrape.
//!
//! Which field carries the links changes from call to call, so every field
//! that might is mined on its own and the aggregator merges the results.

use serde_json::Value;
use url::Url;

use super::canonical::SITE_ROOT;
use super::extract::{anchors_from_html, bare_site_urls, markdown_links};
use super::LinkAggregator;
use crate::models::NormalizedDocument;
use crate::normalize::resolve_alias;
use crate::utils::pick_first_non_empty;

/// Feed every link-bearing field of `scrape` and its sub-documents into `aggregator`.
///
/// Top level, in order: explicit links, metadata, HTML anchors, markdown
/// links, then bare site URLs in the HTML, the markdown and the raw text.
/// Each sub-document then gets its links, metadata, anchors, bare URLs in raw
/// text and markdown links.
pub fn harvest_scrape(scrape: &NormalizedDocument, aggregator: &mut LinkAggregator) {
    let Ok(base) = Url::parse(SITE_ROOT) else {
        return;
    };

    let markdown = pick_first_non_empty([
        Some(scrape.summary.as_str()),
        Some(scrape.markdown.as_str()),
        Some(scrape.raw_text.as_str()),
    ]);
    let raw_text =
        pick_first_non_empty([Some(scrape.raw_text.as_str()), Some(scrape.summary.as_str())]);

    aggregator.add_value(&Value::Array(scrape.links.clone()));
    if let Some(metadata) = &scrape.metadata {
        aggregator.add_value(metadata);
    }
    aggregator.add(anchors_from_html(&scrape.html));
    aggregator.add(markdown_links(&markdown, &base));
    aggregator.add(bare_site_urls(&scrape.html));
    aggregator.add(bare_site_urls(&markdown));
    aggregator.add(bare_site_urls(&raw_text));

    for doc in scrape.documents.iter().filter_map(Value::as_object) {
        let doc_markdown = resolve_alias(&[doc], &["summary", "markdown", "rawText"]);
        let doc_html = resolve_alias(&[doc], &["html"]);
        let doc_raw = resolve_alias(&[doc], &["rawText", "summary", "markdown"]);

        if let Some(links) = doc.get("links") {
            aggregator.add_value(links);
        }
        if let Some(metadata) = doc.get("metadata") {
            aggregator.add_value(metadata);
        }
        aggregator.add(anchors_from_html(&doc_html));
        aggregator.add(bare_site_urls(&doc_raw));
        aggregator.add(markdown_links(&doc_markdown, &base));
    }
}
