use rusqlite::Connection;

use crate::error::Result;

/// Initialise the query_cache table and its indexes.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS query_cache (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            question_text       TEXT NOT NULL,
            question_normalized TEXT NOT NULL,
            question_hash       TEXT NOT NULL,
            response_text       TEXT NOT NULL,
            tools_used          TEXT NOT NULL,
            sql_queries         TEXT NOT NULL,
            progress_events     TEXT NOT NULL,
            hit_count           INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            last_hit_at         TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_query_cache_hash
            ON query_cache(question_hash);
        CREATE INDEX IF NOT EXISTS idx_query_cache_normalized
            ON query_cache(question_normalized);
        CREATE INDEX IF NOT EXISTS idx_query_cache_created_at
            ON query_cache(created_at);",
    )?;
    Ok(())
}
