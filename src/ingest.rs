//! Ingestion pipeline orchestration.
//!
//! Coordinates the full sync flow for one account: adapter → normalizer →
//! embedding → index. Sync is incremental, idempotent, and append-only:
//! every message id is checked against the index before any fetch happens,
//! so interrupting and re-running a sync converges on the same index state
//! as one uninterrupted run.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::FetchErrorPolicy;
use crate::embedding::Embedder;
use crate::error::SourceError;
use crate::index::EmbeddingIndex;
use crate::models::compose_doc_id;
use crate::normalize::normalize;
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::source::MailSource;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Cap on the number of message ids to process.
    pub limit: Option<usize>,
    /// List and count without fetching, embedding, or writing.
    pub dry_run: bool,
    /// Policy for per-message fetch and embed failures, shared by all
    /// adapters.
    pub on_fetch_error: FetchErrorPolicy,
}

#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    /// Message ids enumerated (after the limit cap).
    pub listed: usize,
    /// Newly indexed messages. In a dry run: messages that would be indexed.
    pub indexed: u64,
    /// Messages skipped because their id was already in the index.
    pub already_indexed: u64,
    /// Messages skipped under the skip policy after a fetch/embed failure.
    pub skipped_failed: u64,
}

/// Sync one account into the index.
///
/// The adapter session is closed on every exit path, success or failure.
pub async fn sync_account(
    index: &EmbeddingIndex,
    embedder: &dyn Embedder,
    source: &mut dyn MailSource,
    opts: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncReport> {
    let result = sync_connected(index, embedder, source, opts, progress).await;
    source.close().await;
    result
}

async fn sync_connected(
    index: &EmbeddingIndex,
    embedder: &dyn Embedder,
    source: &mut dyn MailSource,
    opts: &SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<SyncReport> {
    let account = source.label().to_string();
    let provider = source.provider();

    source
        .connect()
        .await
        .with_context(|| format!("connecting account '{}'", account))?;

    progress.report(SyncProgressEvent::Listing {
        account: account.clone(),
    });

    let mut ids = source.list_ids().await?;
    if let Some(limit) = opts.limit {
        ids.truncate(limit);
    }

    let mut report = SyncReport {
        listed: ids.len(),
        ..Default::default()
    };

    if opts.dry_run {
        for native_id in &ids {
            let doc_id = compose_doc_id(&account, native_id);
            if index.exists(&doc_id).await? {
                report.already_indexed += 1;
            } else {
                report.indexed += 1;
            }
        }
        return Ok(report);
    }

    let total = ids.len() as u64;

    for (n, native_id) in ids.iter().enumerate() {
        progress.report(SyncProgressEvent::Fetching {
            account: account.clone(),
            n: n as u64 + 1,
            total,
        });

        let doc_id = compose_doc_id(&account, native_id);
        if index.exists(&doc_id).await? {
            report.already_indexed += 1;
            continue;
        }

        let raw = match source.fetch(native_id).await {
            Ok(raw) => raw,
            Err(e @ SourceError::Auth { .. }) => return Err(e.into()),
            Err(e) => match opts.on_fetch_error {
                FetchErrorPolicy::Skip => {
                    warn!(account = %account, "skipping message {}: {}", native_id, e);
                    report.skipped_failed += 1;
                    continue;
                }
                FetchErrorPolicy::Abort => return Err(e.into()),
            },
        };

        let content = normalize(&raw).render();

        let embedding = match embedder.embed(&content).await {
            Ok(vec) => vec,
            Err(e) => match opts.on_fetch_error {
                FetchErrorPolicy::Skip => {
                    warn!(account = %account, "skipping message {}: embedding failed: {}", native_id, e);
                    report.skipped_failed += 1;
                    continue;
                }
                FetchErrorPolicy::Abort => {
                    return Err(e.context(format!("embedding message {}", native_id)))
                }
            },
        };

        index
            .insert(&doc_id, provider, &account, &content, &embedding)
            .await?;
        report.indexed += 1;
    }

    info!(
        account = %account,
        indexed = report.indexed,
        already = report.already_indexed,
        skipped = report.skipped_failed,
        "sync complete"
    );

    Ok(report)
}
