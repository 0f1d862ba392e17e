use rusqlite::Connection;

use crate::error::Result;

/// Initialise the thread_contexts table and its index.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS thread_contexts (
            thread_key TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            thread_ts  TEXT NOT NULL,
            user_id    TEXT NOT NULL,
            messages   TEXT NOT NULL,
            metadata   TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_thread_contexts_updated_at
            ON thread_contexts(updated_at);",
    )?;
    Ok(())
}
