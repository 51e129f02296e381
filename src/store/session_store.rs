//! Session & History Store (§4.10). Sessions are created lazily; every
//! message write refreshes the session's derived fields under a
//! per-session lock so `message_count`/`last_message` stay consistent
//! under concurrent writers (§5).

use crate::domain::{Message, MessageRole, Session};
use crate::error::{Error, Result};
use crate::token_budget::estimate_history_tokens;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SessionPage {
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct SessionListing {
    pub items: Vec<Session>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryWindowLimits {
    pub message_cap: usize,
    pub token_cap: usize,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append_message(&self, user_id: Uuid, session_id: &str, message: Message) -> Result<Session>;
    async fn get_session(&self, user_id: Uuid, session_id: &str) -> Result<Session>;
    async fn list_sessions(&self, user_id: Uuid, page: SessionPage) -> Result<SessionListing>;
    async fn history(&self, user_id: Uuid, session_id: &str) -> Result<Vec<Message>>;
    async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<()>;

    /// Sliding window of recent `{user, assistant}` turns, newest-first
    /// accumulation then reversed to chronological order (§4.10).
    async fn conversation_window(
        &self,
        user_id: Uuid,
        session_id: &str,
        limits: HistoryWindowLimits,
    ) -> Result<Vec<(String, String)>> {
        let history = self.history(user_id, session_id).await?;
        let turns: Vec<(String, String)> = history
            .into_iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::System => "system",
                };
                (role.to_string(), m.content)
            })
            .collect();

        let mut window = Vec::new();
        let mut tokens = 0usize;
        for turn in turns.iter().rev() {
            if window.len() >= limits.message_cap {
                break;
            }
            let turn_tokens = estimate_history_tokens(std::slice::from_ref(turn));
            if !window.is_empty() && tokens + turn_tokens > limits.token_cap {
                break;
            }
            tokens += turn_tokens;
            window.push(turn.clone());
        }
        window.reverse();
        Ok(window)
    }
}

struct SessionEntry {
    session: Session,
    messages: Vec<Message>,
}

/// In-process session store: a `DashMap` of sessions keyed by id, each
/// protected by its own `tokio::sync::Mutex` so writes to different
/// sessions never block each other (§4.10, §5).
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        InMemorySessionStore { sessions: DashMap::new(), locks: DashMap::new() }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn check_ownership(&self, user_id: Uuid, session_id: &str) -> Result<()> {
        match self.sessions.get(session_id) {
            Some(entry) if entry.session.user_id == user_id => Ok(()),
            Some(_) => Err(Error::authz("session does not belong to this user")),
            None => Err(Error::not_found("session not found")),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_message(&self, user_id: Uuid, session_id: &str, message: Message) -> Result<Session> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        if let Some(entry) = self.sessions.get(session_id) {
            if entry.session.user_id != user_id {
                return Err(Error::authz("session does not belong to this user"));
            }
        }

        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry { session: Session::new_lazy(session_id, user_id), messages: Vec::new() });

        let first_user_message =
            entry.messages.iter().find(|m| m.role == MessageRole::User).map(|m| m.content.clone());
        let first_user_message = first_user_message.or_else(|| {
            (message.role == MessageRole::User).then(|| message.content.clone())
        });

        entry.messages.push(message.clone());
        let count = entry.messages.len() as u64;
        entry.session.refresh_after_message(first_user_message.as_deref(), &message.content, count);
        Ok(entry.session.clone())
    }

    async fn get_session(&self, user_id: Uuid, session_id: &str) -> Result<Session> {
        self.check_ownership(user_id, session_id)?;
        self.sessions.get(session_id).map(|e| e.session.clone()).ok_or_else(|| Error::not_found("session not found"))
    }

    async fn list_sessions(&self, user_id: Uuid, page: SessionPage) -> Result<SessionListing> {
        let page_size = page.page_size.clamp(1, 100);
        let page_num = page.page.max(1);
        let mut items: Vec<Session> = self
            .sessions
            .iter()
            .filter(|e| e.session.user_id == user_id)
            .map(|e| e.session.clone())
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let total = items.len();
        let start = ((page_num - 1) * page_size) as usize;
        let page_items: Vec<Session> = items.into_iter().skip(start).take(page_size as usize).collect();
        let total_pages = ((total as u32) + page_size - 1) / page_size.max(1);
        Ok(SessionListing { items: page_items, total, page: page_num, page_size, total_pages: total_pages.max(1) })
    }

    async fn history(&self, user_id: Uuid, session_id: &str) -> Result<Vec<Message>> {
        self.check_ownership(user_id, session_id)?;
        Ok(self.sessions.get(session_id).map(|e| e.messages.clone()).unwrap_or_default())
    }

    async fn delete_session(&self, user_id: Uuid, session_id: &str) -> Result<()> {
        self.check_ownership(user_id, session_id)?;
        self.sessions.remove(session_id);
        self.locks.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_message_sets_title_from_first_user_message() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.append_message(user, "s1", Message::new("s1", MessageRole::User, "what is the refund policy")).await.unwrap();
        let session = store.append_message(user, "s1", Message::new("s1", MessageRole::Assistant, "here it is")).await.unwrap();
        assert_eq!(session.title, "what is the refund policy");
        assert_eq!(session.message_count, 2);
    }

    #[tokio::test]
    async fn cross_user_access_is_forbidden() {
        let store = InMemorySessionStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.append_message(owner, "s1", Message::new("s1", MessageRole::User, "hi")).await.unwrap();

        let err = store.get_session(other, "s1").await.unwrap_err();
        assert!(matches!(err, Error::Authz(_)));

        let err = store.delete_session(other, "s1").await.unwrap_err();
        assert!(matches!(err, Error::Authz(_)));
    }

    #[tokio::test]
    async fn delete_then_listing_omits_session() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.append_message(user, "s1", Message::new("s1", MessageRole::User, "hi")).await.unwrap();
        store.delete_session(user, "s1").await.unwrap();
        let listing = store.list_sessions(user, SessionPage { page: 1, page_size: 20 }).await.unwrap();
        assert_eq!(listing.total, 0);
    }

    #[tokio::test]
    async fn conversation_window_respects_message_cap() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        for i in 0..30 {
            store
                .append_message(user, "s1", Message::new("s1", MessageRole::User, format!("message {i}")))
                .await
                .unwrap();
        }
        let window = store
            .conversation_window(user, "s1", HistoryWindowLimits { message_cap: 5, token_cap: 4000 })
            .await
            .unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window.last().unwrap().1, "message 29");
    }
}
