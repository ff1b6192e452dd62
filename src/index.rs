//! Persistent embedding index.
//!
//! A SQLite-backed store mapping stable document ids to their serialized
//! text and embedding vector. Entries are written once and never updated
//! or deleted; re-running a sync converges on the same index state because
//! every insert is gated by an existence check.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Provider, SearchHit};

pub struct EmbeddingIndex {
    pool: SqlitePool,
}

impl EmbeddingIndex {
    /// Create or open the index under the given directory.
    pub async fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("mailrag.sqlite");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.migrate().await?;
        Ok(index)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                account TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_account ON messages(account)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// True if a document with this id is already stored.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Add a new entry. Callers gate with [`exists`](Self::exists) first;
    /// an id collision is ignored rather than overwriting the stored entry.
    pub async fn insert(
        &self,
        id: &str,
        provider: Provider,
        account: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let blob = vec_to_blob(embedding);
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages (id, provider, account, content, embedding, dims, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(provider.to_string())
        .bind(account)
        .bind(content)
        .bind(&blob)
        .bind(embedding.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return up to `k` entries nearest to the query vector by cosine
    /// similarity, best first. No ordering guarantee among exact ties.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query("SELECT id, content, embedding FROM messages")
            .fetch_all(&self.pool)
            .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                SearchHit {
                    id: row.get("id"),
                    text: row.get("content"),
                    score: cosine_similarity(query, &vec),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Total number of indexed entries.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Number of indexed entries for one account label.
    pub async fn count_account(&self, account: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE account = ?")
            .bind(account)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, EmbeddingIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let index = EmbeddingIndex::open(tmp.path()).await.unwrap();
        (tmp, index)
    }

    #[tokio::test]
    async fn exists_insert_roundtrip() {
        let (_tmp, index) = open_temp().await;

        assert!(!index.exists("alice:1").await.unwrap());
        index
            .insert("alice:1", Provider::Yahoo, "alice", "hello", &[1.0, 0.0])
            .await
            .unwrap();
        assert!(index.exists("alice:1").await.unwrap());
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_does_not_overwrite() {
        let (_tmp, index) = open_temp().await;

        index
            .insert("alice:1", Provider::Yahoo, "alice", "original", &[1.0, 0.0])
            .await
            .unwrap();
        index
            .insert("alice:1", Provider::Yahoo, "alice", "changed", &[0.0, 1.0])
            .await
            .unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "original");
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let (_tmp, index) = open_temp().await;

        index
            .insert("a:1", Provider::Yahoo, "a", "east", &[1.0, 0.0])
            .await
            .unwrap();
        index
            .insert("a:2", Provider::Yahoo, "a", "north", &[0.0, 1.0])
            .await
            .unwrap();
        index
            .insert("a:3", Provider::Yahoo, "a", "northeast", &[0.7, 0.7])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "east");
        assert_eq!(hits[1].text, "northeast");
    }

    #[tokio::test]
    async fn search_truncates_to_k() {
        let (_tmp, index) = open_temp().await;

        for i in 0..10 {
            index
                .insert(
                    &format!("a:{}", i),
                    Provider::Yahoo,
                    "a",
                    &format!("doc {}", i),
                    &[i as f32, 1.0],
                )
                .await
                .unwrap();
        }

        let hits = index.search(&[1.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn count_by_account() {
        let (_tmp, index) = open_temp().await;

        index
            .insert("alice:1", Provider::Yahoo, "alice", "x", &[1.0])
            .await
            .unwrap();
        index
            .insert("bob:1", Provider::Gmail, "bob", "y", &[1.0])
            .await
            .unwrap();

        assert_eq!(index.count_account("alice").await.unwrap(), 1);
        assert_eq!(index.count_account("bob").await.unwrap(), 1);
        assert_eq!(index.count_account("carol").await.unwrap(), 0);
    }
}
