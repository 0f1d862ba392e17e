use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::normalize::{fuzzy_match_score, hash_question, normalize_question};
use crate::types::{CacheStats, CachedResponse, ToolUsage};

/// Number of most-recently-created entries scanned for a fuzzy match.
const FUZZY_SCAN_LIMIT: i64 = 100;

/// SQLite-backed question → answer cache with hash / exact / fuzzy lookup.
pub struct QueryCacheStore {
    db: Mutex<Connection>,
    ttl_seconds: u64,
    fuzzy_threshold: f64,
}

impl QueryCacheStore {
    pub fn new(conn: Connection, ttl_seconds: u64, fuzzy_threshold: f64) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            ttl_seconds,
            fuzzy_threshold,
        })
    }

    /// Three-tier lookup: hash, then exact normalized match, then fuzzy
    /// scan over the most recently created entries. Returns on the first
    /// non-expired hit.
    #[instrument(skip(self), fields(question_len = question.len()))]
    pub fn find_match(&self, question: &str) -> Result<Option<CachedResponse>> {
        let normalized = normalize_question(question);
        let hash = hash_question(&normalized);
        let conn = self.db.lock().unwrap();

        if let Some(row) = Self::fetch_by_hash(&conn, &hash)? {
            if !self.is_expired(&row) {
                return Ok(Some(Self::record_hit(&conn, row)?));
            }
        }

        if let Some(row) = Self::fetch_by_normalized(&conn, &normalized)? {
            if !self.is_expired(&row) {
                return Ok(Some(Self::record_hit(&conn, row)?));
            }
        }

        let candidates = Self::fetch_recent(&conn, FUZZY_SCAN_LIMIT)?;
        let mut best: Option<(f64, CachedResponse)> = None;
        for candidate in candidates {
            if self.is_expired(&candidate) {
                continue;
            }
            let score = fuzzy_match_score(&normalized, &candidate.question_normalized);
            if score > self.fuzzy_threshold {
                if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                    best = Some((score, candidate));
                }
            }
        }

        match best {
            Some((_, row)) => Ok(Some(Self::record_hit(&conn, row)?)),
            None => Ok(None),
        }
    }

    /// Upsert on `question_hash`. Replacing a row resets `hit_count` and
    /// `last_hit_at` — the UNIQUE index is best-effort, not a guarantee,
    /// so `save` is always an upsert, never a plain insert.
    #[instrument(skip(self, response_text, tools_used, sql_queries, progress_events))]
    pub fn save(
        &self,
        question: &str,
        response_text: &str,
        tools_used: &[ToolUsage],
        sql_queries: &[String],
        progress_events: &[String],
    ) -> Result<()> {
        let normalized = normalize_question(question);
        let hash = hash_question(&normalized);
        let now = Utc::now().to_rfc3339();

        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO query_cache
                (question_text, question_normalized, question_hash, response_text,
                 tools_used, sql_queries, progress_events, hit_count, created_at, last_hit_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, NULL)
             ON CONFLICT(question_hash) DO UPDATE SET
                question_text = excluded.question_text,
                response_text = excluded.response_text,
                tools_used = excluded.tools_used,
                sql_queries = excluded.sql_queries,
                progress_events = excluded.progress_events,
                hit_count = 0,
                last_hit_at = NULL",
            params![
                question,
                normalized,
                hash,
                response_text,
                serde_json::to_string(tools_used)?,
                serde_json::to_string(sql_queries)?,
                serde_json::to_string(progress_events)?,
                now,
            ],
        )?;
        debug!(hash = %hash, "saved cache entry");
        Ok(())
    }

    pub fn delete_by_question(&self, question: &str) -> Result<bool> {
        let hash = hash_question(&normalize_question(question));
        let conn = self.db.lock().unwrap();
        let deleted = conn.execute("DELETE FROM query_cache WHERE question_hash = ?1", params![hash])?;
        Ok(deleted > 0)
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute("DELETE FROM query_cache", [])?;
        Ok(())
    }

    /// Remove entries older than the configured TTL, measured from `created_at`.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(self.ttl_seconds as i64)).to_rfc3339();
        let conn = self.db.lock().unwrap();
        let deleted = conn.execute("DELETE FROM query_cache WHERE created_at < ?1", params![cutoff])?;
        if deleted > 0 {
            debug!(deleted, "cleaned up expired cache entries");
        }
        Ok(deleted)
    }

    pub fn get_stats(&self) -> Result<CacheStats> {
        let conn = self.db.lock().unwrap();
        let total_entries: u64 = conn.query_row("SELECT COUNT(*) FROM query_cache", [], |r| r.get(0))?;
        let total_hits: u64 = conn.query_row("SELECT COALESCE(SUM(hit_count), 0) FROM query_cache", [], |r| r.get(0))?;
        let avg_hit_count = if total_entries > 0 {
            total_hits as f64 / total_entries as f64
        } else {
            0.0
        };
        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM query_cache",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(CacheStats {
            total_entries,
            total_hits,
            avg_hit_count,
            oldest_entry: oldest,
            newest_entry: newest,
        })
    }

    fn is_expired(&self, row: &CachedResponse) -> bool {
        match DateTime::parse_from_rfc3339(&row.created_at) {
            Ok(created) => {
                let age = Utc::now().signed_duration_since(created.with_timezone(&Utc));
                age.num_seconds() > self.ttl_seconds as i64
            }
            Err(_) => false,
        }
    }

    fn record_hit(conn: &Connection, mut row: CachedResponse) -> Result<CachedResponse> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE query_cache SET hit_count = hit_count + 1, last_hit_at = ?1 WHERE id = ?2",
            params![now, row.id],
        )?;
        row.hit_count += 1;
        row.last_hit_at = Some(now);
        Ok(row)
    }

    fn fetch_by_hash(conn: &Connection, hash: &str) -> Result<Option<CachedResponse>> {
        conn.query_row(
            "SELECT id, question_text, question_normalized, question_hash, response_text,
                    tools_used, sql_queries, progress_events, hit_count, created_at, last_hit_at
             FROM query_cache WHERE question_hash = ?1",
            params![hash],
            row_to_cached_response,
        )
        .optional()
        .map_err(Into::into)
    }

    fn fetch_by_normalized(conn: &Connection, normalized: &str) -> Result<Option<CachedResponse>> {
        conn.query_row(
            "SELECT id, question_text, question_normalized, question_hash, response_text,
                    tools_used, sql_queries, progress_events, hit_count, created_at, last_hit_at
             FROM query_cache WHERE question_normalized = ?1",
            params![normalized],
            row_to_cached_response,
        )
        .optional()
        .map_err(Into::into)
    }

    fn fetch_recent(conn: &Connection, limit: i64) -> Result<Vec<CachedResponse>> {
        let mut stmt = conn.prepare(
            "SELECT id, question_text, question_normalized, question_hash, response_text,
                    tools_used, sql_queries, progress_events, hit_count, created_at, last_hit_at
             FROM query_cache ORDER BY last_hit_at DESC NULLS LAST, created_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_cached_response)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_to_cached_response(row: &Row) -> rusqlite::Result<CachedResponse> {
    let tools_used: String = row.get(5)?;
    let sql_queries: String = row.get(6)?;
    let progress_events: String = row.get(7)?;
    Ok(CachedResponse {
        id: row.get(0)?,
        question_text: row.get(1)?,
        question_normalized: row.get(2)?,
        question_hash: row.get(3)?,
        response_text: row.get(4)?,
        tools_used: serde_json::from_str(&tools_used).unwrap_or_default(),
        sql_queries: serde_json::from_str(&sql_queries).unwrap_or_default(),
        progress_events: serde_json::from_str(&progress_events).unwrap_or_default(),
        hit_count: row.get(8)?,
        created_at: row.get(9)?,
        last_hit_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QueryCacheStore {
        let conn = Connection::open_in_memory().unwrap();
        QueryCacheStore::new(conn, 7 * 24 * 60 * 60, 0.99).unwrap()
    }

    #[test]
    fn save_then_find_match_increments_hit_count() {
        let store = store();
        store
            .save("How many merchants do we have?", "42 merchants", &[], &[], &[])
            .unwrap();

        let hit = store.find_match("how many merchants do we have?").unwrap().expect("should hit");
        assert_eq!(hit.response_text, "42 merchants");
        assert_eq!(hit.hit_count, 1);
        assert!(hit.last_hit_at.is_some());

        let second_hit = store.find_match("How many merchants do we have?").unwrap().unwrap();
        assert_eq!(second_hit.hit_count, 2);
    }

    #[test]
    fn find_match_returns_none_on_miss() {
        let store = store();
        assert!(store.find_match("nonexistent question").unwrap().is_none());
    }

    #[test]
    fn save_upserts_on_hash_collision() {
        let store = store();
        store.save("same question", "first answer", &[], &[], &[]).unwrap();
        store.save("same question", "second answer", &[], &[], &[]).unwrap();

        let hit = store.find_match("same question").unwrap().unwrap();
        assert_eq!(hit.response_text, "second answer");
        // hit_count was reset by the upsert, then incremented once by this find_match.
        assert_eq!(hit.hit_count, 1);
    }

    #[test]
    fn delete_by_question_removes_entry() {
        let store = store();
        store.save("to delete", "answer", &[], &[], &[]).unwrap();
        assert!(store.delete_by_question("to delete").unwrap());
        assert!(store.find_match("to delete").unwrap().is_none());
        assert!(!store.delete_by_question("to delete").unwrap());
    }

    #[test]
    fn expired_entries_are_never_returned() {
        let conn = Connection::open_in_memory().unwrap();
        let store = QueryCacheStore::new(conn, 1, 0.99).unwrap();
        store.save("old question", "stale answer", &[], &[], &[]).unwrap();

        {
            let conn = store.db.lock().unwrap();
            let cutoff = (Utc::now() - chrono::Duration::seconds(10)).to_rfc3339();
            conn.execute("UPDATE query_cache SET created_at = ?1", params![cutoff]).unwrap();
        }

        assert!(store.find_match("old question").unwrap().is_none());
    }

    #[test]
    fn fuzzy_match_finds_near_duplicate_long_question() {
        let store = store();
        store
            .save(
                "how many merchants do we currently have registered",
                "a lot",
                &[],
                &[],
                &[],
            )
            .unwrap();
        // Exact match only below threshold 0.99 won't trigger; use a threshold
        // tolerant enough to demonstrate the fuzzy tier independent of the
        // hash/normalized tiers by slightly perturbing word order.
        let conn = Connection::open_in_memory().unwrap();
        let loose = QueryCacheStore::new(conn, 7 * 24 * 60 * 60, 0.7).unwrap();
        loose
            .save(
                "how many merchants do we currently have registered",
                "a lot",
                &[],
                &[],
                &[],
            )
            .unwrap();
        let hit = loose
            .find_match("how many merchants do we have currently registered")
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn cleanup_expired_removes_old_entries() {
        let conn = Connection::open_in_memory().unwrap();
        let store = QueryCacheStore::new(conn, 5, 0.99).unwrap();
        store.save("q1", "a1", &[], &[], &[]).unwrap();
        {
            let conn = store.db.lock().unwrap();
            let cutoff = (Utc::now() - chrono::Duration::seconds(100)).to_rfc3339();
            conn.execute("UPDATE query_cache SET created_at = ?1", params![cutoff]).unwrap();
        }
        let deleted = store.cleanup_expired().unwrap();
        assert_eq!(deleted, 1);
    }
}
