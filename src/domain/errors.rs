//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Habitica answered with a non-success status.
    #[error("Habitica API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Network-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Still rate limited after sleeping and retrying.
    #[error("rate limited: gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Question file error: {0}")]
    Questions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// User input (a command body) did not make sense.
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous: {0}")]
    Ambiguous(String),

    #[error("cannot find a legal split location in an outgoing message part of {length} characters")]
    UnsplittableMessage { length: usize },

    #[error("sending {parts} messages at once is not supported")]
    Spam { parts: usize },

    /// The challenge exists on Habitica but some of its tasks are missing.
    #[error("Created challenge {url} but adding its tasks failed ({cause}). Add the missing tasks on Habitica.")]
    IncompleteChallenge { url: String, cause: String },

    /// Watch mode stopped after too many failing runs in a row.
    #[error("{runs} consecutive runs failed")]
    GaveUp { runs: u32 },
}
