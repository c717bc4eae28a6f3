//! Best-effort link extraction from HTML, markdown and free text.
//!
//! None of these passes validate anything; they only turn a blob of content
//! into [`LinkCandidate`]s. Canonicalization and filtering happen once, in the
//! aggregator, so every pass is held to the same rules.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::LinkCandidate;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

static BARE_SITE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://(?:www\.)?thehackernews\.com/[^\s"'()]+"#).unwrap()
});

/// Every `<a href>` in `html`, titled with the anchor's visible text.
pub fn anchors_from_html(html: &str) -> Vec<LinkCandidate> {
    if html.trim().is_empty() {
        return Vec::new();
    }
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let text = element.text().collect::<Vec<_>>().join(" ");
            Some(LinkCandidate::new(
                href,
                text.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        })
        .collect()
}

/// Every `[text](target)` pair in `markdown`, targets resolved against `base`.
///
/// Pairs with a blank text or target, or whose target doesn't resolve, are
/// skipped.
pub fn markdown_links(markdown: &str, base: &Url) -> Vec<LinkCandidate> {
    MARKDOWN_LINK
        .captures_iter(markdown)
        .filter_map(|caps| {
            let text = caps.get(1)?.as_str().trim();
            let href = caps.get(2)?.as_str().trim();
            if text.is_empty() || href.is_empty() {
                return None;
            }
            let absolute = base.join(href).ok()?;
            Some(LinkCandidate::new(absolute.as_str(), text))
        })
        .collect()
}

/// Every bare site URL appearing anywhere in `text`, untitled.
pub fn bare_site_urls(text: &str) -> Vec<LinkCandidate> {
    BARE_SITE_URL
        .find_iter(text)
        .map(|m| LinkCandidate::new(m.as_str(), ""))
        .collect()
}
