use async_trait::async_trait;

/// Receives rendered progress updates from the agent loop. Implemented by
/// the event dispatcher (`tribal-slack`) to edit a "thinking" placeholder
/// message in place; a no-op implementation is used where progress isn't
/// observed (e.g. tests, the reaction-triggered refresh path before a
/// placeholder exists).
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(&self, message: String);
}

/// Discards every update. Useful in tests and for callers that only care
/// about the final [`crate::ProcessingResult`].
pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn send(&self, _message: String) {}
}

/// Collects updates in order, for assertions in tests.
#[cfg(test)]
pub struct RecordingProgressSink {
    pub events: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingProgressSink {
    pub fn new() -> Self {
        Self { events: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn send(&self, message: String) {
        self.events.lock().unwrap().push(message);
    }
}
