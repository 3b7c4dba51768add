//! Sliding-window conversation memory.
//!
//! [`WindowMemory`] keeps the last `k` user/agent exchanges of a session and
//! hands them to the agent as short-term context. The oldest exchange is
//! evicted first. Nothing is persisted; the window lives as long as the
//! session that owns it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Default number of exchanges kept in the window.
pub const DEFAULT_WINDOW: usize = 5;

/// One completed exchange: the user's request and the agent's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user asked (including the image path reference).
    pub user: String,
    /// What the agent answered.
    pub agent: String,
}

impl ConversationTurn {
    /// Create a new turn.
    #[must_use]
    pub fn new(user: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            agent: agent.into(),
        }
    }

    /// The turn as a `user` message followed by an `assistant` message.
    #[must_use]
    pub fn to_messages(&self) -> [Message; 2] {
        [Message::user(&self.user), Message::assistant(&self.agent)]
    }
}

/// Fixed-capacity FIFO log of the most recent exchanges.
#[derive(Debug, Clone)]
pub struct WindowMemory {
    turns: VecDeque<ConversationTurn>,
    k: usize,
}

impl WindowMemory {
    /// Creates an empty window holding at most `k` turns.
    ///
    /// A window of zero keeps nothing.
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(k),
            k,
        }
    }

    /// Maximum number of turns kept.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.k
    }

    /// Appends a turn, evicting the oldest ones once the window is full.
    pub fn push(&mut self, turn: ConversationTurn) {
        if self.k == 0 {
            return;
        }
        while self.turns.len() >= self.k {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Records a user/agent exchange.
    pub fn record(&mut self, user: impl Into<String>, agent: impl Into<String>) {
        self.push(ConversationTurn::new(user, agent));
    }

    /// Turns currently held, oldest first.
    pub fn turns(&self) -> impl ExactSizeIterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Flattens the window into alternating user/assistant messages.
    #[must_use]
    pub fn to_messages(&self) -> Vec<Message> {
        self.turns.iter().flat_map(ConversationTurn::to_messages).collect()
    }

    /// Number of turns held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drops every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for WindowMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn filled(k: usize, n: usize) -> WindowMemory {
        let mut memory = WindowMemory::new(k);
        for i in 1..=n {
            memory.record(format!("question-{i}"), format!("answer-{i}"));
        }
        memory
    }

    #[test]
    fn keeps_turns_below_capacity() {
        let memory = filled(5, 3);
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.turns().next().unwrap().user, "question-1");
    }

    #[test]
    fn sixth_turn_evicts_the_first() {
        let memory = filled(5, 6);

        assert_eq!(memory.len(), 5);
        let users: Vec<&str> = memory.turns().map(|t| t.user.as_str()).collect();
        assert_eq!(
            users,
            ["question-2", "question-3", "question-4", "question-5", "question-6"]
        );
    }

    #[test]
    fn never_exceeds_capacity() {
        for n in 0..20 {
            assert!(filled(5, n).len() <= 5);
        }
    }

    #[test]
    fn zero_window_keeps_nothing() {
        let memory = filled(0, 3);
        assert!(memory.is_empty());
        assert!(memory.to_messages().is_empty());
    }

    #[test]
    fn to_messages_alternates_roles() {
        let messages = filled(5, 2).to_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(messages[3].content_text(), Some("answer-2"));
    }

    #[test]
    fn clear_empties_window() {
        let mut memory = filled(5, 4);
        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.capacity(), 5);
    }
}
