use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::types::ThreadContext;

/// Statistics reported on the Slack home-tab view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextStats {
    pub total_contexts: u64,
    pub newest_update: Option<String>,
    pub oldest_update: Option<String>,
}

/// SQLite-backed storage for thread contexts.
///
/// All mutating operations take the store-wide lock so concurrent
/// background tasks working on different threads cannot interleave writes
/// to the same row.
pub struct ThreadContextStore {
    db: Mutex<Connection>,
}

impl ThreadContextStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self), fields(channel_id = %channel_id, thread_ts = %thread_ts))]
    pub fn get_or_create(&self, channel_id: &str, thread_ts: &str, user_id: &str) -> Result<ThreadContext> {
        let thread_key = format!("{channel_id}:{thread_ts}");
        let conn = self.db.lock().unwrap();

        if let Some(ctx) = Self::fetch(&conn, &thread_key)? {
            return Ok(ctx);
        }

        let now = Utc::now().to_rfc3339();
        let context = ThreadContext::new(channel_id, thread_ts, user_id, &now);
        conn.execute(
            "INSERT INTO thread_contexts
                (thread_key, channel_id, thread_ts, user_id, messages, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                thread_key,
                context.channel_id,
                context.thread_ts,
                context.user_id,
                serde_json::to_string(&context.messages)?,
                serde_json::to_string(&context.metadata)?,
                context.created_at,
                context.updated_at,
            ],
        )?;

        debug!(thread_key = %thread_key, "created new thread context");
        Ok(context)
    }

    #[instrument(skip(self), fields(channel_id = %channel_id, thread_ts = %thread_ts))]
    pub fn get(&self, channel_id: &str, thread_ts: &str) -> Result<Option<ThreadContext>> {
        let thread_key = format!("{channel_id}:{thread_ts}");
        let conn = self.db.lock().unwrap();
        Self::fetch(&conn, &thread_key)
    }

    #[instrument(skip(self, context), fields(thread_key = %context.thread_key()))]
    pub fn save(&self, context: &mut ThreadContext) -> Result<()> {
        context.updated_at = Utc::now().to_rfc3339();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE thread_contexts
             SET messages = ?1, metadata = ?2, updated_at = ?3
             WHERE thread_key = ?4",
            params![
                serde_json::to_string(&context.messages)?,
                serde_json::to_string(&context.metadata)?,
                context.updated_at,
                context.thread_key(),
            ],
        )?;
        debug!(thread_key = %context.thread_key(), messages = context.messages.len(), "saved context");
        Ok(())
    }

    pub fn delete(&self, channel_id: &str, thread_ts: &str) -> Result<()> {
        let thread_key = format!("{channel_id}:{thread_ts}");
        let conn = self.db.lock().unwrap();
        conn.execute("DELETE FROM thread_contexts WHERE thread_key = ?1", params![thread_key])?;
        Ok(())
    }

    /// Remove contexts whose `updated_at` is older than `max_age_seconds`.
    /// Returns the number of rows deleted.
    pub fn cleanup_old_contexts(&self, max_age_seconds: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(max_age_seconds)).to_rfc3339();
        let conn = self.db.lock().unwrap();
        let deleted = conn.execute("DELETE FROM thread_contexts WHERE updated_at < ?1", params![cutoff])?;
        if deleted > 0 {
            debug!(deleted, "cleaned up old thread contexts");
        }
        Ok(deleted)
    }

    pub fn get_stats(&self) -> Result<ContextStats> {
        let conn = self.db.lock().unwrap();
        let total_contexts: u64 = conn.query_row("SELECT COUNT(*) FROM thread_contexts", [], |r| r.get(0))?;
        let (newest, oldest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MAX(updated_at), MIN(updated_at) FROM thread_contexts",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(ContextStats {
            total_contexts,
            newest_update: newest,
            oldest_update: oldest,
        })
    }

    fn fetch(conn: &Connection, thread_key: &str) -> Result<Option<ThreadContext>> {
        conn.query_row(
            "SELECT channel_id, thread_ts, user_id, messages, metadata, created_at, updated_at
             FROM thread_contexts WHERE thread_key = ?1",
            params![thread_key],
            row_to_context,
        )
        .optional()
        .map_err(Into::into)
    }
}

fn row_to_context(row: &Row) -> rusqlite::Result<ThreadContext> {
    let messages_json: String = row.get(3)?;
    let metadata_json: String = row.get(4)?;
    Ok(ThreadContext {
        channel_id: row.get(0)?,
        thread_ts: row.get(1)?,
        user_id: row.get(2)?,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ThreadContextStore {
        let conn = Connection::open_in_memory().unwrap();
        ThreadContextStore::new(conn).unwrap()
    }

    #[test]
    fn get_returns_none_for_unknown_thread() {
        let store = store();
        assert!(store.get("C1", "111.222").unwrap().is_none());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = store();
        let first = store.get_or_create("C1", "111.222", "U1").unwrap();
        let second = store.get_or_create("C1", "111.222", "U1").unwrap();
        assert_eq!(first.thread_key(), second.thread_key());
        assert_eq!(second.messages.len(), 0);
    }

    #[test]
    fn save_then_get_roundtrips_messages() {
        let store = store();
        let mut ctx = store.get_or_create("C1", "111.222", "U1").unwrap();
        let now = Utc::now().to_rfc3339();
        ctx.add_user_message("how many merchants?", Some("U1".to_string()), &now);
        ctx.add_assistant_message("let me check", None, &now);
        store.save(&mut ctx).unwrap();

        let reloaded = store.get("C1", "111.222").unwrap().expect("context must exist");
        assert_eq!(reloaded.messages.len(), 2);
        assert_eq!(reloaded.messages[0].role(), "user");
        assert_eq!(reloaded.messages[1].role(), "assistant");
    }

    #[test]
    fn tool_message_preserves_tool_call_id() {
        let store = store();
        let mut ctx = store.get_or_create("C1", "t1", "U1").unwrap();
        let now = Utc::now().to_rfc3339();
        ctx.add_tool_result("call_123", "{\"rows\": []}", &now);
        store.save(&mut ctx).unwrap();

        let reloaded = store.get("C1", "t1").unwrap().unwrap();
        assert_eq!(reloaded.messages[0].tool_call_id(), Some("call_123"));
    }

    #[test]
    fn cleanup_old_contexts_respects_max_age() {
        let store = store();
        store.get_or_create("C1", "old", "U1").unwrap();

        // A day-long cutoff keeps a just-created context.
        assert_eq!(store.cleanup_old_contexts(24 * 60 * 60).unwrap(), 0);
        assert!(store.get("C1", "old").unwrap().is_some());

        // A zero-second cutoff deletes anything not created in this instant.
        let deleted = store.cleanup_old_contexts(0).unwrap();
        assert!(deleted >= 1);
        assert!(store.get("C1", "old").unwrap().is_none());
    }

    #[test]
    fn get_messages_for_llm_keeps_only_trailing_window() {
        let mut ctx = ThreadContext::new("C1", "t", "U1", "2026-01-01T00:00:00Z");
        for i in 0..25 {
            ctx.add_user_message(format!("msg {i}"), None, "2026-01-01T00:00:00Z");
        }
        let trailing = ctx.get_messages_for_llm(20);
        assert_eq!(trailing.len(), 20);
        assert_eq!(trailing[0].content, "msg 5");
        assert_eq!(trailing[19].content, "msg 24");
    }

    #[test]
    fn get_messages_for_llm_extends_back_to_keep_a_straddled_tool_pairing() {
        let mut ctx = ThreadContext::new("C1", "t", "U1", "2026-01-01T00:00:00Z");
        for i in 0..17 {
            ctx.add_user_message(format!("filler {i}"), None, "2026-01-01T00:00:00Z");
        }
        // Index 17: assistant message with two tool calls, followed by their
        // two tool-result messages at indices 18 and 19. A naive tail cut of
        // the last 2 messages would land start=18, inside the tool-result
        // run, separating it from the assistant message that owns it.
        ctx.add_assistant_message(
            "",
            Some(vec![
                tribal_context_tool_call("call_1"),
                tribal_context_tool_call("call_2"),
            ]),
            "2026-01-01T00:00:00Z",
        );
        ctx.add_tool_result("call_1", "{\"rows\": []}", "2026-01-01T00:00:00Z");
        ctx.add_tool_result("call_2", "{\"rows\": []}", "2026-01-01T00:00:00Z");

        let trailing = ctx.get_messages_for_llm(2);

        assert_eq!(trailing.len(), 3, "must extend back to include the owning assistant message");
        assert_eq!(trailing[0].role, "assistant");
        assert!(trailing[0].tool_calls.is_some());
        assert_eq!(trailing[1].role, "tool");
        assert_eq!(trailing[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(trailing[2].role, "tool");
        assert_eq!(trailing[2].tool_call_id.as_deref(), Some("call_2"));
    }

    fn tribal_context_tool_call(id: &str) -> crate::types::ToolCall {
        crate::types::ToolCall {
            id: id.to_string(),
            name: "postgres-mcp__execute_query".to_string(),
            arguments: "{}".to_string(),
        }
    }
}
