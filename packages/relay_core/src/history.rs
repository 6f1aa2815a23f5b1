//! Chat history replayed to newly admitted connections.
//!
//! Only chat lines are kept; voice and signal never reach this buffer. With no
//! capacity the buffer grows for the life of the process. With a capacity the
//! oldest line is evicted once it is full.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::message::ChatMessage;

#[derive(Debug, Default)]
pub struct HistoryBuffer {
    entries: VecDeque<ChatMessage>,
    capacity: Option<NonZeroUsize>,
}

impl HistoryBuffer {
    /// Unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn append(&mut self, message: ChatMessage) {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap.get() {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(message);
    }

    /// Independent, insertion-ordered copy of the current history.
    pub fn snapshot(&self) -> Arc<[ChatMessage]> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
