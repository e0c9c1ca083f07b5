use ahash::AHashSet;
use parking_lot::Mutex;

/// Process-wide record of conversations already claimed for reconstruction.
/// Share one instance (behind `Arc`) across every export run in the process;
/// a conversation claimed once is never rebuilt or exported again.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    seen: Mutex<AHashSet<String>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `conversation_id`. Returns `true` only for the first caller.
    pub fn claim(&self, conversation_id: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(conversation_id) {
            return false;
        }
        seen.insert(conversation_id.to_string())
    }

    /// Give back a claim whose conversation was never exported (e.g. the run writing
    /// it failed). Returns whether `conversation_id` was claimed.
    pub fn release(&self, conversation_id: &str) -> bool {
        self.seen.lock().remove(conversation_id)
    }

    #[inline]
    pub fn is_claimed(&self, conversation_id: &str) -> bool {
        self.seen.lock().contains(conversation_id)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
