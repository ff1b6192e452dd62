//! Typed errors for the sync and query paths.
//!
//! Decoding problems are deliberately absent: malformed MIME or unknown
//! encodings are always resolved by lossy fallback in the normalizer and
//! never become errors.

use thiserror::Error;

/// Errors produced by a mail source adapter.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider rejected the account's credentials. Fatal to the
    /// current sync attempt for that account.
    #[error("authentication failed for {account}: {reason}")]
    Auth { account: String, reason: String },

    /// A single message could not be retrieved. Whether this aborts the
    /// sync is decided by the configured fetch-error policy.
    #[error("failed to fetch message {id}: {reason}")]
    Fetch { id: String, reason: String },

    /// Connection or listing failure outside of auth. Fatal to the
    /// current sync attempt.
    #[error("{0}")]
    Protocol(String),
}

/// Errors produced by the retrieval-augmented answerer.
///
/// On any of these the conversation log is left untouched; a half-formed
/// turn is never recorded.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("failed to embed question: {0}")]
    Embed(String),

    #[error("retrieval failed: {0}")]
    Retrieve(String),

    #[error("language model request failed: {0}")]
    Model(String),
}
