use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

struct Conversation {
    messages: VecDeque<ChatMessage>,
    touched: Instant,
}

/// Per-user chat history for the AI commands.
#[derive(Default)]
pub struct Conversations {
    by_user: Mutex<AHashMap<Arc<str>, Conversation>>,
}

impl Conversations {
    /// The user's history followed by `prompt`, ready to send.
    pub fn prompt_with_history(&self, user: &str, prompt: &str) -> Vec<ChatMessage> {
        let by_user = self.by_user.lock();
        by_user
            .get(user)
            .map(|c| c.messages.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .chain(std::iter::once(ChatMessage::new(Role::User, prompt)))
            .collect()
    }

    /// Stores one exchange, keeping at most `max_messages` entries.
    pub fn record(&self, user: &str, prompt: &str, answer: &str, max_messages: usize, now: Instant) {
        let mut by_user = self.by_user.lock();
        let conversation = by_user.entry(Arc::from(user)).or_insert_with(|| Conversation {
            messages: VecDeque::new(),
            touched: now,
        });
        conversation.messages.push_back(ChatMessage::new(Role::User, prompt));
        conversation.messages.push_back(ChatMessage::new(Role::Assistant, answer));
        while conversation.messages.len() > max_messages {
            conversation.messages.pop_front();
        }
        conversation.touched = now;
    }

    /// Returns `true` if there was anything to forget.
    pub fn clear(&self, user: &str) -> bool {
        self.by_user.lock().remove(user).is_some()
    }

    pub fn expire(&self, ttl: Duration, now: Instant) -> usize {
        let mut by_user = self.by_user.lock();
        let before = by_user.len();
        by_user.retain(|_, c| now.saturating_duration_since(c.touched) < ttl);
        before - by_user.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn history_is_capped() {
        let conversations = Conversations::default();
        let now = Instant::now();

        for i in 0..4 {
            conversations.record("alice", &format!("q{i}"), &format!("a{i}"), 4, now);
        }

        let prompt = conversations.prompt_with_history("alice", "q4");
        assert_eq!(prompt.len(), 5);
        assert_eq!(prompt[0], ChatMessage::new(Role::User, "q2"));
        assert_eq!(prompt[4], ChatMessage::new(Role::User, "q4"));
    }

    #[test]
    fn clear_and_expire() {
        let conversations = Conversations::default();
        let now = Instant::now();
        conversations.record("alice", "q", "a", 10, now);
        conversations.record("bob", "q", "a", 10, now + Duration::from_secs(30));

        assert!(conversations.clear("alice"));
        assert!(!conversations.clear("alice"));
        assert_eq!(conversations.expire(Duration::from_secs(60), now + Duration::from_secs(90)), 1);
        assert_eq!(conversations.prompt_with_history("bob", "x").len(), 1);
    }
}
