use anyhow::Result;
use sqlx::SqlitePool;

/// Schema for the per-session chunk collection.
pub async fn create_session_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_chunks (
            seq INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            source TEXT NOT NULL,
            source_index INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            first_page INTEGER NOT NULL,
            last_page INTEGER NOT NULL,
            start_char INTEGER NOT NULL,
            end_char INTEGER NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Schema for the persistent question/answer log.
///
/// `id` is AUTOINCREMENT so insertion order is never reused, even if rows
/// were ever removed by hand.
pub async fn create_history_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            answer TEXT NOT NULL,
            created_at TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'qa',
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Fails on a foreign or damaged file even when the CREATE above was a no-op.
    sqlx::query("SELECT id, query, answer, created_at, kind, embedding FROM history_entries LIMIT 1")
        .fetch_optional(pool)
        .await?;

    Ok(())
}
