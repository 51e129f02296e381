//! Session & Message (§3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A client-generated conversation. Created lazily on first message (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub title: String,
    pub last_message: String,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new_lazy(id: impl Into<String>, user_id: Uuid) -> Self {
        let now = Utc::now();
        Session {
            id: id.into(),
            user_id,
            title: String::new(),
            last_message: String::new(),
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh derived fields after a message write (§4.10).
    pub fn refresh_after_message(&mut self, first_user_message: Option<&str>, latest_message: &str, message_count: u64) {
        if self.title.is_empty() {
            if let Some(first) = first_user_message {
                self.title = truncate_chars(first, 50);
            }
        }
        self.last_message = truncate_chars(latest_message, 100);
        self.message_count = message_count;
        self.updated_at = Utc::now();
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub confidence: Option<f64>,
    pub escalated: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Message {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            confidence: None,
            escalated: false,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_set_only_once() {
        let mut session = Session::new_lazy("s1", Uuid::new_v4());
        session.refresh_after_message(Some("first question"), "first question", 1);
        session.refresh_after_message(None, "second message", 2);
        assert_eq!(session.title, "first question");
        assert_eq!(session.last_message, "second message");
        assert_eq!(session.message_count, 2);
    }

    #[test]
    fn truncation_respects_caps() {
        let long = "x".repeat(200);
        let mut session = Session::new_lazy("s1", Uuid::new_v4());
        session.refresh_after_message(Some(&long), &long, 1);
        assert_eq!(session.title.chars().count(), 50);
        assert_eq!(session.last_message.chars().count(), 100);
    }
}
