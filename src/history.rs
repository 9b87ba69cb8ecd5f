//! Persistent question/answer history.
//!
//! A SQLite database that outlives every session. Each answered question is
//! appended as one [`HistoryEntry`] together with an embedding of
//! `"Q: ...\nA: ..."`, so past exchanges can be listed in order or searched
//! by similarity.
//!
//! Opening never silently discards data. A file that exists but cannot be
//! used is moved aside to `<path>.corrupt-<unix_ts>` before a fresh store is
//! created, and the caller is told which of the three cases happened via
//! [`OpenOutcome`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, Embedder};
use crate::error::QaError;
use crate::models::{HistoryEntry, HISTORY_KIND_QA};
use crate::{db, migrate};

/// How [`HistoryStore::open`] found the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// An existing store was opened.
    Opened,
    /// No file existed; an empty store was created.
    CreatedFresh,
    /// The existing file was unreadable. It was renamed to `moved_to` and an
    /// empty store was created in its place.
    Recovered { moved_to: PathBuf, reason: String },
}

pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn open(path: &Path) -> Result<(Self, OpenOutcome)> {
        let existed = path.exists();

        let first_err = match Self::connect(path).await {
            Ok(store) => {
                let outcome = if existed {
                    OpenOutcome::Opened
                } else {
                    OpenOutcome::CreatedFresh
                };
                tracing::debug!(path = %path.display(), ?outcome, "history store open");
                return Ok((store, outcome));
            }
            Err(e) => e,
        };

        if !existed {
            return Err(QaError::StorageOpenFailure {
                path: path.to_path_buf(),
                reason: first_err.to_string(),
            }
            .into());
        }

        let moved_to = quarantine(path).map_err(|e| QaError::StorageOpenFailure {
            path: path.to_path_buf(),
            reason: format!("{}; moving it aside also failed: {}", first_err, e),
        })?;
        tracing::warn!(
            path = %path.display(),
            moved_to = %moved_to.display(),
            error = %first_err,
            "history store unreadable, starting a new one"
        );

        match Self::connect(path).await {
            Ok(store) => Ok((
                store,
                OpenOutcome::Recovered {
                    moved_to,
                    reason: first_err.to_string(),
                },
            )),
            Err(e) => Err(QaError::StorageOpenFailure {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    async fn connect(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        if let Err(e) = migrate::create_history_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(Self { pool })
    }

    /// Embed and persist one exchange. Durable once this returns.
    pub async fn append(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        answer: &str,
    ) -> Result<HistoryEntry> {
        let vector = embed_query(embedder, &HistoryEntry::embedding_text(query, answer)).await?;
        self.append_with_vector(query, answer, &vector).await
    }

    pub async fn append_with_vector(
        &self,
        query: &str,
        answer: &str,
        vector: &[f32],
    ) -> Result<HistoryEntry> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO history_entries (query, answer, created_at, kind, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(query)
        .bind(answer)
        .bind(created_at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(HISTORY_KIND_QA)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(id, "history entry appended");

        Ok(HistoryEntry {
            id,
            query: query.to_string(),
            answer: answer.to_string(),
            created_at,
            kind: HISTORY_KIND_QA.to_string(),
        })
    }

    /// Up to `limit` entries, most recent first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, query, answer, created_at, kind FROM history_entries ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Past exchanges most similar to `vector`, best first.
    pub async fn similar(&self, vector: &[f32], k: usize) -> Result<Vec<(HistoryEntry, f32)>> {
        let rows = sqlx::query(
            "SELECT id, query, answer, created_at, kind, embedding FROM history_entries ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(vector, &blob_to_vec(&blob));
            scored.push((row_to_entry(row)?, score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryEntry> {
    let raw_ts: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&raw_ts)
        .map_err(|e| anyhow::anyhow!("bad timestamp {:?} in history: {}", raw_ts, e))?
        .with_timezone(&Utc);
    Ok(HistoryEntry {
        id: row.get("id"),
        query: row.get("query"),
        answer: row.get("answer"),
        created_at,
        kind: row.get("kind"),
    })
}

/// Rename `path` (and any WAL sidecars) to `<path>.corrupt-<unix_ts>`.
fn quarantine(path: &Path) -> std::io::Result<PathBuf> {
    let moved_to = suffixed(path, &format!(".corrupt-{}", Utc::now().timestamp()));
    std::fs::rename(path, &moved_to)?;
    for sidecar in ["-wal", "-shm"] {
        let from = suffixed(path, sidecar);
        if from.exists() {
            let to = suffixed(&moved_to, sidecar);
            if let Err(e) = std::fs::rename(&from, &to) {
                tracing::warn!(path = %from.display(), error = %e, "could not move sidecar");
            }
        }
    }
    Ok(moved_to)
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeEmbedder;

    #[tokio::test]
    async fn fresh_then_reopened() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.sqlite");

        let (store, outcome) = HistoryStore::open(&path).await.unwrap();
        assert_eq!(outcome, OpenOutcome::CreatedFresh);
        store
            .append(&FakeEmbedder::default(), "q1", "a1")
            .await
            .unwrap();
        store.close().await;

        let (store, outcome) = HistoryStore::open(&path).await.unwrap();
        assert_eq!(outcome, OpenOutcome::Opened);
        assert_eq!(store.count().await.unwrap(), 1);
        let entries = store.recent(10).await.unwrap();
        assert_eq!(entries[0].query, "q1");
        assert_eq!(entries[0].answer, "a1");
        assert_eq!(entries[0].kind, "qa");
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_capped() {
        let dir = tempfile::TempDir::new().unwrap();
        let (store, _) = HistoryStore::open(&dir.path().join("h.sqlite")).await.unwrap();
        for i in 0..12 {
            store
                .append_with_vector(&format!("q{}", i), &format!("a{}", i), &[1.0])
                .await
                .unwrap();
        }
        let entries = store.recent(10).await.unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].query, "q11");
        assert_eq!(entries[9].query, "q2");
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[tokio::test]
    async fn similar_finds_related_exchange() {
        let dir = tempfile::TempDir::new().unwrap();
        let (store, _) = HistoryStore::open(&dir.path().join("h.sqlite")).await.unwrap();
        let embedder = FakeEmbedder::default();
        store
            .append(&embedder, "what is the capital of kazakhstan", "astana")
            .await
            .unwrap();
        store
            .append(&embedder, "how many legs does a spider have", "eight")
            .await
            .unwrap();

        let query = embed_query(&embedder, "spider legs").await.unwrap();
        let hits = store.similar(&query, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.answer, "eight");
    }

    #[tokio::test]
    async fn corrupt_file_is_moved_aside() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("history.sqlite");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();

        let (store, outcome) = HistoryStore::open(&path).await.unwrap();
        let moved_to = match outcome {
            OpenOutcome::Recovered { moved_to, .. } => moved_to,
            other => panic!("expected recovery, got {:?}", other),
        };
        assert!(moved_to
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("history.sqlite.corrupt-"));
        assert_eq!(std::fs::read(&moved_to).unwrap(), vec![0xAB; 4096]);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unusable_location_is_storage_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = match HistoryStore::open(&blocker.join("history.sqlite")).await {
            Ok(_) => panic!("open should fail"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<QaError>(),
            Some(QaError::StorageOpenFailure { .. })
        ));
    }
}
