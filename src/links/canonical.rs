//! Canonical article URLs for The Hacker News.
//!
//! A permalink on the site looks like
//! `https://thehackernews.com/2024/05/some-slug.html`. Everything the
//! harvesting passes find is pushed through [`canonical_article_url`] so the
//! dedup key is identical no matter which pass (or which spelling: `http`,
//! `www.`, trailing `?utm=`) discovered it.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::utils::title_case;

/// Site root every relative link is resolved against.
pub const SITE_ROOT: &str = "https://thehackernews.com/";

/// Registrable domain an article must live on.
pub const SITE_DOMAIN: &str = "thehackernews.com";

/// Title used when neither the page nor the URL yields one.
pub const DEFAULT_TITLE: &str = "The Hacker News Article";

static FIRST_HTTP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://[^\s"'()]+"#).unwrap());

static DATED_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}/\d{2}/").unwrap());

static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.[a-z]+$").unwrap());

static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]+").unwrap());

/// Resolve a link-like string to an absolute URL against `base`.
///
/// Surrounding prose is dropped by keeping only the first `http(s)://` token
/// when there is one. With `require_html`, everything after the first
/// `.html` is cut (query, fragment, trailing text) and strings without one
/// are rejected.
pub fn absolute_article_url(raw: &str, base: &Url, require_html: bool) -> Option<Url> {
    let mut working = raw.trim();
    if working.is_empty() {
        return None;
    }

    if let Some(m) = FIRST_HTTP_TOKEN.find(working) {
        working = m.as_str();
    }

    if require_html {
        // ASCII lowercasing keeps byte offsets aligned with `working`.
        let html_at = working.to_ascii_lowercase().find(".html")?;
        working = &working[..html_at + ".html".len()];
    }

    let absolute = base.join(working).ok()?;
    if require_html && !absolute.as_str().to_ascii_lowercase().ends_with(".html") {
        return None;
    }
    Some(absolute)
}

/// True when `host` is the site's domain or one of its subdomains.
fn on_site(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == SITE_DOMAIN || host.ends_with(&format!(".{SITE_DOMAIN}"))
}

/// True when the path carries the `YYYY/MM/` segment every permalink has.
pub fn is_dated_article_path(path: &str) -> bool {
    DATED_PATH.is_match(&path.to_ascii_lowercase())
}

/// Canonicalize and validate a candidate article URL for the target site.
///
/// Returns `None` for anything that is not a dated `.html` permalink on the
/// site. The scheme is forced to `https` and a leading `www.` dropped so the
/// result can be used directly as a dedup key.
pub fn canonical_article_url(raw: &str) -> Option<String> {
    let base = Url::parse(SITE_ROOT).ok()?;
    let mut url = absolute_article_url(raw, &base, true)?;

    let host = url.host_str()?.to_ascii_lowercase();
    if !on_site(&host) || !is_dated_article_path(url.path()) {
        return None;
    }

    if url.scheme() != "https" {
        url.set_scheme("https").ok()?;
    }
    if let Some(bare) = host.strip_prefix("www.") {
        url.set_host(Some(bare)).ok()?;
    }
    Some(url.to_string())
}

/// Build a readable title from the last path segment of `url`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     title_from_url("https://thehackernews.com/2024/05/new_zero-day-found.html", DEFAULT_TITLE),
///     "New Zero Day Found"
/// );
/// ```
pub fn title_from_url(url: &str, fallback: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return fallback.to_string();
    };
    let Some(last) = parsed.path().split('/').filter(|s| !s.is_empty()).last() else {
        return fallback.to_string();
    };
    let stem = EXTENSION.replace(last, "");
    let words = SEPARATOR_RUNS.replace_all(&stem, " ");
    let title = title_case(&words);
    if title.is_empty() {
        fallback.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tracking_and_prose() {
        assert_eq!(
            canonical_article_url(
                "http://thehackernews.com/2024/05/example-post.html?utm=1 trailing text"
            )
            .as_deref(),
            Some("https://thehackernews.com/2024/05/example-post.html")
        );
    }

    #[test]
    fn test_extracts_url_from_surrounding_text() {
        assert_eq!(
            canonical_article_url("Read more: https://thehackernews.com/2023/11/x.html#comments")
                .as_deref(),
            Some("https://thehackernews.com/2023/11/x.html")
        );
    }

    #[test]
    fn test_resolves_relative_paths() {
        assert_eq!(
            canonical_article_url("/2024/01/relative-story.html").as_deref(),
            Some("https://thehackernews.com/2024/01/relative-story.html")
        );
    }

    #[test]
    fn test_www_and_http_collapse_to_one_key() {
        let a = canonical_article_url("http://www.thehackernews.com/2024/05/a.html");
        let b = canonical_article_url("https://thehackernews.com/2024/05/a.html");
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_undated_paths() {
        assert_eq!(canonical_article_url("https://thehackernews.com/search/label/Malware"), None);
        assert_eq!(canonical_article_url("https://thehackernews.com/p/about.html"), None);
        assert_eq!(canonical_article_url("https://thehackernews.com/"), None);
    }

    #[test]
    fn test_rejects_other_hosts() {
        assert_eq!(canonical_article_url("https://example.com/2024/05/a.html"), None);
        assert_eq!(
            canonical_article_url("https://evil.com/thehackernews.com/2024/05/a.html"),
            None
        );
        assert_eq!(canonical_article_url("https://notthehackernews.com/2024/05/a.html"), None);
    }

    #[test]
    fn test_rejects_blank_and_extensionless() {
        assert_eq!(canonical_article_url(""), None);
        assert_eq!(canonical_article_url("   "), None);
        assert_eq!(canonical_article_url("https://thehackernews.com/2024/05/a"), None);
    }

    #[test]
    fn test_uppercase_html_suffix_is_accepted() {
        assert_eq!(
            canonical_article_url("https://thehackernews.com/2024/05/Loud.HTML?x=1").as_deref(),
            Some("https://thehackernews.com/2024/05/Loud.HTML")
        );
    }

    #[test]
    fn test_absolute_article_url_without_html_requirement() {
        let base = Url::parse("https://example.org/").unwrap();
        let url = absolute_article_url("docs/page?q=1", &base, false).unwrap();
        assert_eq!(url.as_str(), "https://example.org/docs/page?q=1");
    }

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url(
                "https://thehackernews.com/2024/05/new_zero-day--found.html",
                DEFAULT_TITLE
            ),
            "New Zero Day Found"
        );
        assert_eq!(title_from_url("https://thehackernews.com/", DEFAULT_TITLE), DEFAULT_TITLE);
        assert_eq!(title_from_url("not a url", "Fallback"), "Fallback");
    }
}
