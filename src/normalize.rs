//! Reduce any scrape response to one [`NormalizedDocument`].
//!
//! Firecrawl answers in several shapes depending on the operation: `/scrape`
//! wraps a single document in `data`, a finished crawl returns `data` as an
//! array, and some proxies flatten everything onto the top level. Rather than
//! trusting one key, the payload is first classified into an [`UpstreamShape`]
//! and every field is then resolved from an ordered alias list, primary
//! document first, envelope second.
//!
//! Nothing here fails. Absent fields come back as empty strings, empty lists
//! or `None`; only empty *output* is an error, and that is for callers to decide.

use serde_json::{Map, Value};

use crate::models::NormalizedDocument;
use crate::utils::pick_first_non_empty;

/// Keys that may hold one document or a list of documents, in priority order.
const CONTAINER_KEYS: &[&str] = &["data", "documents", "results", "items", "records"];

/// Key that only ever holds a single document.
const SINGLE_DOCUMENT_KEY: &str = "document";

const RAW_TEXT_ALIASES: &[&str] = &["rawText", "raw_text", "raw", "content", "text"];

/// The recognised top-level shapes of a scrape response.
#[derive(Debug)]
pub enum UpstreamShape<'a> {
    /// An envelope with documents under one or more container keys.
    Envelope {
        envelope: &'a Map<String, Value>,
        documents: Vec<&'a Map<String, Value>>,
    },
    /// An object with no container keys; it is its own document.
    Bare(&'a Map<String, Value>),
    /// Anything that isn't a JSON object.
    Unrecognized,
}

impl<'a> UpstreamShape<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        let Some(envelope) = payload.as_object() else {
            return UpstreamShape::Unrecognized;
        };

        let mut documents = Vec::new();
        for key in CONTAINER_KEYS {
            match envelope.get(*key) {
                Some(Value::Array(items)) => {
                    documents.extend(items.iter().filter_map(Value::as_object));
                }
                Some(Value::Object(doc)) => documents.push(doc),
                _ => {}
            }
        }
        if let Some(Value::Object(doc)) = envelope.get(SINGLE_DOCUMENT_KEY) {
            documents.push(doc);
        }

        if documents.is_empty() {
            UpstreamShape::Bare(envelope)
        } else {
            UpstreamShape::Envelope {
                envelope,
                documents,
            }
        }
    }
}

/// First non-blank string among `aliases` looked up in each source in turn.
///
/// Sources are tried in order and, within a source, aliases in order. Only
/// exact, case-sensitive key matches count and non-string values are skipped.
pub fn resolve_alias(sources: &[&Map<String, Value>], aliases: &[&str]) -> String {
    pick_first_non_empty(
        sources
            .iter()
            .flat_map(|source| aliases.iter().map(move |key| source.get(*key)))
            .map(|value| value.and_then(Value::as_str)),
    )
}

/// Normalize an arbitrary scrape payload.
pub fn normalize(payload: &Value) -> NormalizedDocument {
    let (envelope, documents) = match UpstreamShape::classify(payload) {
        UpstreamShape::Unrecognized => return NormalizedDocument::default(),
        UpstreamShape::Bare(doc) => (doc, vec![doc]),
        UpstreamShape::Envelope {
            envelope,
            documents,
        } => (envelope, documents),
    };

    let primary = documents[0];
    let sources = [primary, envelope];

    let links = [primary, envelope]
        .iter()
        .find_map(|source| source.get("links").and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    let metadata = [primary, envelope]
        .iter()
        .filter_map(|source| source.get("metadata"))
        .find(|value| is_truthy(value))
        .cloned();

    NormalizedDocument {
        summary: resolve_alias(&sources, &["summary"]),
        markdown: resolve_alias(&sources, &["markdown"]),
        html: resolve_alias(&sources, &["html"]),
        title: resolve_alias(&sources, &["title"]),
        description: resolve_alias(&sources, &["description"]),
        raw_text: resolve_alias(&sources, RAW_TEXT_ALIASES),
        metadata,
        links,
        documents: documents
            .into_iter()
            .map(|doc| Value::Object(doc.clone()))
            .collect(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_document_under_data() {
        let payload = json!({
            "success": true,
            "data": {
                "summary": "  A summary  ",
                "html": "<p>hi</p>",
                "links": ["https://thehackernews.com/2024/05/a.html"],
                "metadata": { "title": "Front page" }
            }
        });
        let doc = normalize(&payload);
        assert_eq!(doc.summary, "A summary");
        assert_eq!(doc.html, "<p>hi</p>");
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.metadata, Some(json!({ "title": "Front page" })));
        assert_eq!(doc.documents.len(), 1);
        assert_eq!(doc.markdown, "");
    }

    #[test]
    fn test_document_array_takes_first_as_primary() {
        let payload = json!({
            "status": "completed",
            "data": [
                { "markdown": "first" },
                { "markdown": "second", "links": ["x"] }
            ]
        });
        let doc = normalize(&payload);
        assert_eq!(doc.markdown, "first");
        assert_eq!(doc.documents.len(), 2);
        // Primary has no links and neither does the envelope.
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_falls_back_to_envelope_fields() {
        let payload = json!({
            "title": "Envelope title",
            "links": [{ "url": "https://thehackernews.com/2024/05/b.html" }],
            "documents": [{ "summary": "" }]
        });
        let doc = normalize(&payload);
        assert_eq!(doc.title, "Envelope title");
        assert_eq!(doc.links.len(), 1);
    }

    #[test]
    fn test_bare_payload_is_its_own_document() {
        let payload = json!({ "raw_text": "plain body", "description": "desc" });
        let doc = normalize(&payload);
        assert_eq!(doc.raw_text, "plain body");
        assert_eq!(doc.description, "desc");
        assert_eq!(doc.documents, vec![payload.clone()]);
    }

    #[test]
    fn test_raw_text_alias_order() {
        let payload = json!({
            "data": { "text": "from text", "content": "  " },
            "rawText": "envelope raw"
        });
        // Primary aliases win over envelope aliases, blank values are skipped.
        assert_eq!(normalize(&payload).raw_text, "from text");
    }

    #[test]
    fn test_collects_from_every_container_key() {
        let payload = json!({
            "results": [{ "html": "<a>1</a>" }],
            "items": { "html": "<a>2</a>" },
            "document": { "html": "<a>3</a>" }
        });
        let doc = normalize(&payload);
        assert_eq!(doc.documents.len(), 3);
        assert_eq!(doc.html, "<a>1</a>");
    }

    #[test]
    fn test_non_object_payloads_degrade_to_empty() {
        for payload in [json!(null), json!("text"), json!([1, 2, 3]), json!(7)] {
            assert_eq!(normalize(&payload), NormalizedDocument::default());
        }
    }

    #[test]
    fn test_non_string_fields_are_ignored() {
        let payload = json!({ "data": { "summary": 12, "title": ["a"] }, "summary": "ok" });
        let doc = normalize(&payload);
        assert_eq!(doc.summary, "ok");
        assert_eq!(doc.title, "");
    }

    #[test]
    fn test_resolve_alias_prefers_earlier_sources() {
        let a = json!({ "b": "from a" });
        let b = json!({ "a": "from b" });
        let sources = [a.as_object().unwrap(), b.as_object().unwrap()];
        assert_eq!(resolve_alias(&sources, &["a", "b"]), "from a");
    }
}
