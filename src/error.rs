//! Error taxonomy shared by every stage of the publish pipeline.
//!
//! Each variant maps to one failure class the HTTP layer reports back to the
//! caller. The scheduler only logs them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required credential or setting is missing or blank.
    #[error("Missing required environment variable {0}")]
    Config(&'static str),

    /// Bad explicit input, no usable candidates, or an incomplete model response.
    #[error("{0}")]
    Validation(String),

    /// A collaborator answered with a non-success HTTP status.
    #[error("{service} {status} {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// A collaborator answered 2xx but reported an error in its body.
    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error(
        "Groq model '{model}' has been decommissioned. Update GROQ_MODEL. Snippet: {snippet}"
    )]
    ModelDecommissioned { model: String, snippet: String },

    #[error(
        "WP create 403 (possible firewall or auth block) {snippet}. Verify WordPress application password access for this automation."
    )]
    Forbidden { snippet: String },

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Publish already in progress")]
    Lock,

    /// The pipeline panicked; the payload message is kept when it has one.
    #[error("Publish pipeline panicked: {0}")]
    Panicked(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for 5xx answers, the only failures the model client retries.
    pub fn is_server_error(&self) -> bool {
        matches!(self, PipelineError::Upstream { status, .. } if *status >= 500)
    }
}
