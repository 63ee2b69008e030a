//! Conversation memory replayed into every agent prompt.

use crate::provider::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of a past exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub role: TurnRole,
    pub content: String,
    /// Strictly increasing across the lifetime of the memory, including after truncation
    pub ordinal: u64,
    pub timestamp: DateTime<Utc>,
}

impl MemoryTurn {
    pub fn to_message(&self) -> Message {
        match self.role {
            TurnRole::User => Message::user(self.content.clone()),
            TurnRole::Assistant => Message::assistant(self.content.clone()),
        }
    }
}

/// Ordered log of prior turns for one session.
///
/// Memory is owned by the caller and handed to the agent loop by `&mut`. With
/// `max_turns` set, the oldest turns are dropped in user/assistant pairs once
/// the log grows past the limit.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<MemoryTurn>,
    next_ordinal: u64,
    max_turns: Option<usize>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: Option<usize>) -> Self {
        Self {
            max_turns,
            ..Self::default()
        }
    }

    /// Appends a single turn.
    pub fn append(&mut self, role: TurnRole, content: impl Into<String>) {
        self.push(role, content.into());
        self.truncate();
    }

    /// Appends a completed user/assistant exchange.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.push(TurnRole::User, user.into());
        self.push(TurnRole::Assistant, assistant.into());
        self.truncate();
    }

    pub fn history(&self) -> &[MemoryTurn] {
        &self.turns
    }

    /// History as chat messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.turns.iter().map(MemoryTurn::to_message).collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, role: TurnRole, content: String) {
        self.turns.push(MemoryTurn {
            role,
            content,
            ordinal: self.next_ordinal,
            timestamp: Utc::now(),
        });
        self.next_ordinal += 1;
    }

    fn truncate(&mut self) {
        let Some(max_turns) = self.max_turns else {
            return;
        };
        if self.turns.len() <= max_turns {
            return;
        }
        let excess = self.turns.len() - max_turns;
        // Round up to whole pairs so history never starts with an orphaned reply.
        let drop_count = (excess + 1) / 2 * 2;
        self.turns.drain(..drop_count.min(self.turns.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_exchange_is_chronological() {
        let mut memory = ConversationMemory::new();
        memory.record_exchange("hi", "hello");
        memory.record_exchange("how are you?", "fine");

        let history = memory.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].role, TurnRole::Assistant);
        assert_eq!(history[3].content, "fine");
        assert!(history.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_messages_map_roles() {
        let mut memory = ConversationMemory::new();
        memory.record_exchange("q", "a");
        let messages = memory.messages();
        assert_eq!(messages, vec![Message::user("q"), Message::assistant("a")]);
    }

    #[test]
    fn test_clear_keeps_ordinals_increasing() {
        let mut memory = ConversationMemory::new();
        memory.record_exchange("a", "b");
        memory.clear();
        assert!(memory.is_empty());

        memory.append(TurnRole::User, "c");
        assert_eq!(memory.history()[0].ordinal, 2);
    }

    #[test]
    fn test_truncation_drops_oldest_pairs() {
        let mut memory = ConversationMemory::with_max_turns(Some(4));
        for i in 0..3 {
            memory.record_exchange(format!("q{}", i), format!("a{}", i));
        }

        let contents: Vec<&str> = memory.history().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn test_odd_limit_still_drops_pairs() {
        let mut memory = ConversationMemory::with_max_turns(Some(3));
        memory.record_exchange("q0", "a0");
        memory.record_exchange("q1", "a1");

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.history()[0].role, TurnRole::User);
        assert_eq!(memory.history()[0].content, "q1");
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut memory = ConversationMemory::new();
        for i in 0..50 {
            memory.record_exchange(format!("q{}", i), "a");
        }
        assert_eq!(memory.len(), 100);
    }
}
