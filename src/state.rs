//! Shared runtime state: per-chat transcripts, granted users, personality.
//!
//! Everything handlers touch concurrently lives behind one [`AppState`]
//! handed out through the dispatcher's dependency map. Each chat's transcript
//! sits behind its own `Arc<Mutex<_>>` so a generation exchange can hold the
//! conversation lock across the API call while other chats proceed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use teloxide::types::{ChatId, UserId};
use tokio::sync::{Mutex, RwLock};

use crate::llm::Turn;

/// Ordered conversation history for one chat.
///
/// The first turn is always the personality seed, authored as a user turn;
/// the model never sees the personality any other way.
#[derive(Debug)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// A fresh transcript holding only the personality seed turn
    #[must_use]
    pub fn seeded(personality: &str) -> Self {
        Self {
            turns: vec![Turn::user_text(personality)],
        }
    }

    /// Append a turn at the end
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full ordered history, seed turn first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

/// Handle to one chat's transcript
pub type Conversation = Arc<Mutex<Transcript>>;

/// Process-wide mutable state shared by every handler.
pub struct AppState {
    conversations: RwLock<HashMap<ChatId, Conversation>>,
    granted: RwLock<HashMap<ChatId, HashSet<UserId>>>,
    personality: RwLock<String>,
}

impl AppState {
    /// Create empty state with the startup personality
    #[must_use]
    pub fn new(personality: String) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            granted: RwLock::new(HashMap::new()),
            personality: RwLock::new(personality),
        }
    }

    /// The current personality text
    pub async fn personality(&self) -> String {
        self.personality.read().await.clone()
    }

    /// Fetch the chat's conversation, seeding a new one on first contact.
    ///
    /// The map lock is released before returning; callers lock the returned
    /// conversation themselves for the duration of an exchange.
    pub async fn conversation(&self, chat_id: ChatId) -> Conversation {
        let mut conversations = self.conversations.write().await;
        if let Some(conversation) = conversations.get(&chat_id) {
            return conversation.clone();
        }
        // Seed under the map lock; a concurrent style change either waits
        // here or has already reseeded.
        let personality = self.personality.read().await.clone();
        let conversation = Arc::new(Mutex::new(Transcript::seeded(&personality)));
        conversations.insert(chat_id, conversation.clone());
        conversation
    }

    /// Drop the chat's conversation; the next message reseeds it with the
    /// personality current at that moment.
    ///
    /// An exchange already holding the old conversation finishes against the
    /// orphaned transcript.
    pub async fn clear_conversation(&self, chat_id: ChatId) {
        self.conversations.write().await.remove(&chat_id);
    }

    /// Install a new personality and reseed every known conversation with it.
    pub async fn set_personality(&self, personality: String) {
        // Lock order matches conversation(): conversations, then personality.
        let mut conversations = self.conversations.write().await;
        {
            let mut current = self.personality.write().await;
            *current = personality.clone();
        }
        for conversation in conversations.values_mut() {
            *conversation = Arc::new(Mutex::new(Transcript::seeded(&personality)));
        }
    }

    /// Add a user to the chat's granted set.
    ///
    /// Returns `false` when the user was already granted there. Grants are
    /// scoped to one chat and there is no revocation; they last until the
    /// process exits.
    pub async fn grant(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.granted
            .write()
            .await
            .entry(chat_id)
            .or_default()
            .insert(user_id)
    }

    /// Whether the user holds an explicit grant in this chat
    pub async fn is_granted(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.granted
            .read()
            .await
            .get(&chat_id)
            .is_some_and(|users| users.contains(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Part, Role};

    fn seed_text(transcript: &Transcript) -> String {
        match &transcript.turns()[0].parts[0] {
            Part::Text { text } => text.clone(),
            Part::InlineData { .. } => panic!("seed turn must be text"),
        }
    }

    #[tokio::test]
    async fn test_first_contact_seeds_personality() {
        let state = AppState::new("злой дух".to_string());
        let conversation = state.conversation(ChatId(1)).await;
        let transcript = conversation.lock().await;

        assert_eq!(transcript.turns().len(), 1);
        assert_eq!(transcript.turns()[0].role, Role::User);
        assert_eq!(seed_text(&transcript), "злой дух");
    }

    #[tokio::test]
    async fn test_same_chat_gets_same_conversation() {
        let state = AppState::new("seed".to_string());
        let first = state.conversation(ChatId(7)).await;
        let second = state.conversation(ChatId(7)).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_clear_replaces_history_with_seed() {
        let state = AppState::new("seed".to_string());
        let conversation = state.conversation(ChatId(3)).await;
        {
            let mut transcript = conversation.lock().await;
            transcript.push(Turn::user_text("вопрос"));
            transcript.push(Turn::model_text("ответ"));
        }

        state.clear_conversation(ChatId(3)).await;
        let fresh = state.conversation(ChatId(3)).await;
        let transcript = fresh.lock().await;
        assert_eq!(transcript.turns().len(), 1);
        assert_eq!(seed_text(&transcript), "seed");
    }

    #[tokio::test]
    async fn test_style_change_reseeds_every_chat() {
        let state = AppState::new("старый".to_string());
        for id in [1, 2] {
            let conversation = state.conversation(ChatId(id)).await;
            conversation.lock().await.push(Turn::user_text("история"));
        }

        state.set_personality("новый стиль".to_string()).await;

        assert_eq!(state.personality().await, "новый стиль");
        for id in [1, 2] {
            let conversation = state.conversation(ChatId(id)).await;
            let transcript = conversation.lock().await;
            assert_eq!(transcript.turns().len(), 1);
            assert_eq!(seed_text(&transcript), "новый стиль");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_style_change_racing_first_contact_seeds_new_style() {
        for _ in 0..50 {
            let state = Arc::new(AppState::new("старый".to_string()));

            let writer = {
                let state = state.clone();
                tokio::spawn(async move { state.set_personality("новый".to_string()).await })
            };
            let reader = {
                let state = state.clone();
                tokio::spawn(async move { state.conversation(ChatId(1)).await })
            };
            writer.await.expect("style task");
            reader.await.expect("first-contact task");

            // Whichever side won, the surviving seed is the new style.
            let conversation = state.conversation(ChatId(1)).await;
            let transcript = conversation.lock().await;
            assert_eq!(seed_text(&transcript), "новый");
        }
    }

    #[tokio::test]
    async fn test_grants_are_monotonic() {
        let state = AppState::new("seed".to_string());
        let chat = ChatId(-100);
        let user = UserId(42);

        assert!(!state.is_granted(chat, user).await);
        assert!(state.grant(chat, user).await);
        assert!(!state.grant(chat, user).await);
        assert!(state.is_granted(chat, user).await);
    }

    #[tokio::test]
    async fn test_grants_are_scoped_to_their_chat() {
        let state = AppState::new("seed".to_string());
        let user = UserId(42);

        state.grant(ChatId(-100), user).await;
        assert!(state.is_granted(ChatId(-100), user).await);
        assert!(!state.is_granted(ChatId(-200), user).await);
    }
}
