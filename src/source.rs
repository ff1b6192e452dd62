//! Mail source adapter interface.
//!
//! A [`MailSource`] produces the set of message native ids in a mailbox
//! and fetches individual raw messages on demand. The ingestion pipeline
//! drives the lifecycle: `connect`, `list_ids`, repeated `fetch`, and a
//! `close` that runs on every exit path, success or failure.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::models::{Provider, RawMessage};

#[async_trait]
pub trait MailSource: Send {
    /// Caller-supplied account label; the first half of every document id.
    fn label(&self) -> &str;

    fn provider(&self) -> Provider;

    /// Authenticate and open the provider session.
    ///
    /// Credential rejection surfaces as [`SourceError::Auth`].
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Enumerate every message native id in the configured mailbox.
    async fn list_ids(&mut self) -> Result<Vec<String>, SourceError>;

    /// Fetch one raw message by native id.
    ///
    /// A per-message failure surfaces as [`SourceError::Fetch`]; whether
    /// that aborts the sync is the pipeline's policy decision, not the
    /// adapter's.
    async fn fetch(&mut self, native_id: &str) -> Result<RawMessage, SourceError>;

    /// Release the provider session. Must not fail the sync.
    async fn close(&mut self);
}
