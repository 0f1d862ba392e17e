use dashmap::DashMap;
use tribal_agent::ProcessingResult;

/// One entry the reaction handlers need to recover: the question that
/// produced a bot response, the result itself, and the thread it lives in.
#[derive(Clone)]
pub struct IndexedAnswer {
    pub question: String,
    pub result: ProcessingResult,
    pub thread_ts: String,
}

/// Process-local map from `(channel_id, message_ts)` — the bot's own
/// posted message — to the inputs that produced it. No durability
/// requirement: it's fine for entries to not outlive the process, per
/// spec.md §4.6.
#[derive(Default)]
pub struct MessageIndex {
    entries: DashMap<(String, String), IndexedAnswer>,
}

impl MessageIndex {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn record(&self, channel_id: impl Into<String>, message_ts: impl Into<String>, answer: IndexedAnswer) {
        self.entries.insert((channel_id.into(), message_ts.into()), answer);
    }

    pub fn lookup(&self, channel_id: &str, message_ts: &str) -> Option<IndexedAnswer> {
        self.entries.get(&(channel_id.to_string(), message_ts.to_string())).map(|e| e.clone())
    }

    pub fn remove(&self, channel_id: &str, message_ts: &str) {
        self.entries.remove(&(channel_id.to_string(), message_ts.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(question: &str) -> IndexedAnswer {
        IndexedAnswer {
            question: question.to_string(),
            result: ProcessingResult {
                response_text: "ok".to_string(),
                used_fallback: false,
                actual_model: String::new(),
                tools_used: vec![],
                iterations: 1,
                sql_queries: vec![],
                progress_events: vec![],
                from_cache: false,
                error: None,
            },
            thread_ts: "100.1".to_string(),
        }
    }

    #[test]
    fn records_and_looks_up_by_channel_and_ts() {
        let index = MessageIndex::new();
        index.record("C1", "200.1", answer("how many merchants?"));
        let found = index.lookup("C1", "200.1").unwrap();
        assert_eq!(found.question, "how many merchants?");
    }

    #[test]
    fn unknown_message_returns_none() {
        let index = MessageIndex::new();
        assert!(index.lookup("C1", "999.9").is_none());
    }

    #[test]
    fn removed_entry_is_no_longer_found() {
        let index = MessageIndex::new();
        index.record("C1", "200.1", answer("q"));
        index.remove("C1", "200.1");
        assert!(index.lookup("C1", "200.1").is_none());
    }
}
