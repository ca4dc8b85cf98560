//! Bounded chat history shared by all sessions.

use shared::{unix_millis, ChatEntry, CHAT_HISTORY_CAP};
use std::collections::VecDeque;

/// Append-only chat log with FIFO trimming. Retention (how much the server
/// remembers) is larger than the broadcast tail (how much one snapshot
/// shows).
#[derive(Debug)]
pub struct ChatHistory {
    entries: VecDeque<ChatEntry>,
    cap: usize,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            cap: CHAT_HISTORY_CAP,
        }
    }

    /// Appends a timestamped entry, dropping the oldest entries once the
    /// retention cap is exceeded.
    pub fn append(&mut self, text: String, is_system: bool) {
        self.entries.push_back(ChatEntry {
            text,
            is_system,
            timestamp: unix_millis(),
        });
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// The most recent `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<ChatEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::CHAT_BROADCAST_TAIL;

    #[test]
    fn append_and_tail_order() {
        let mut chat = ChatHistory::new();
        chat.append("first".to_string(), false);
        chat.append("second".to_string(), true);

        let tail = chat.tail(CHAT_BROADCAST_TAIL);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "first");
        assert_eq!(tail[1].text, "second");
        assert!(tail[1].is_system);
    }

    #[test]
    fn history_never_exceeds_retention_cap() {
        let mut chat = ChatHistory::new();
        for i in 0..(CHAT_HISTORY_CAP + 25) {
            chat.append(format!("msg {}", i), false);
        }

        assert_eq!(chat.len(), CHAT_HISTORY_CAP);
        // Oldest entries were the ones trimmed.
        let tail = chat.tail(CHAT_HISTORY_CAP);
        assert_eq!(tail[0].text, "msg 25");
    }

    #[test]
    fn tail_is_smaller_than_retention() {
        let mut chat = ChatHistory::new();
        for i in 0..CHAT_HISTORY_CAP {
            chat.append(format!("msg {}", i), false);
        }

        let tail = chat.tail(CHAT_BROADCAST_TAIL);
        assert_eq!(tail.len(), CHAT_BROADCAST_TAIL);
        assert_eq!(
            tail.last().unwrap().text,
            format!("msg {}", CHAT_HISTORY_CAP - 1)
        );
    }

    #[test]
    fn tail_on_short_history_returns_everything() {
        let mut chat = ChatHistory::new();
        chat.append("only".to_string(), false);
        assert_eq!(chat.tail(CHAT_BROADCAST_TAIL).len(), 1);
    }
}
