use std::sync::Arc;

use crate::config::HISTORY_KEY;
use crate::models::{Message, Role};
use crate::providers::ChatMessage;
use crate::services::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Usage {
    pub chars: usize,
    pub ceiling: usize,
    pub percent: f64,
    pub level: UsageLevel,
}

/// Ordered message history, capped at `ceiling` characters of content.
///
/// Index 0 is always the seed (welcome) message. Every mutation is persisted
/// on a best-effort basis: storage errors are logged and the in-memory
/// history stays authoritative.
pub struct ConversationStore {
    messages: Vec<Message>,
    storage: Arc<dyn KeyValueStore>,
    welcome_message: String,
    ceiling: usize,
}

impl ConversationStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        welcome_message: impl Into<String>,
        ceiling: usize,
    ) -> Self {
        let welcome_message = welcome_message.into();
        Self {
            messages: vec![Message::new(Role::Assistant, welcome_message.clone())],
            storage,
            welcome_message,
            ceiling,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(role, content);
        self.messages.push(message.clone());
        self.save();
        message
    }

    /// Replace the content of the last message without persisting.
    ///
    /// Used for the in-progress assistant reply while fragments arrive.
    pub fn update_last(&mut self, content: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.clear();
            last.content.push_str(content);
        }
    }

    /// Replace the content of the last message and persist.
    pub fn finalize_last(&mut self, content: &str) {
        self.update_last(content);
        self.save();
    }

    /// Evict the oldest non-seed messages until the total fits the ceiling.
    /// Returns the number of evicted messages.
    pub fn enforce_limit(&mut self) -> usize {
        let mut total = self.char_count();
        let mut evicted = 0;
        while total > self.ceiling && self.messages.len() > 1 {
            let removed = self.messages.remove(1);
            total -= removed.char_len();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                "Evicted {} message(s) to fit {} chars (now {})",
                evicted,
                self.ceiling,
                total
            );
            self.save();
        }
        evicted
    }

    pub fn to_api_format(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ChatMessage::from).collect()
    }

    pub fn char_count(&self) -> usize {
        self.messages.iter().map(Message::char_len).sum()
    }

    pub fn usage(&self) -> Usage {
        let chars = self.char_count();
        let percent = if self.ceiling == 0 {
            100.0
        } else {
            (chars as f64 / self.ceiling as f64 * 100.0).min(100.0)
        };
        let level = if percent > 90.0 {
            UsageLevel::Critical
        } else if percent > 70.0 {
            UsageLevel::Warning
        } else {
            UsageLevel::Normal
        };
        Usage {
            chars,
            ceiling: self.ceiling,
            percent,
            level,
        }
    }

    /// Start over with a fresh seed message.
    pub fn reset(&mut self) {
        self.messages = vec![self.seed()];
        self.save();
    }

    /// Drop the persisted history entirely, then reset.
    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove(HISTORY_KEY) {
            tracing::warn!("Failed to remove saved history: {}", e);
        }
        self.reset();
    }

    pub fn load(&mut self) -> &[Message] {
        self.messages = match self.storage.get(HISTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Message>>(&json) {
                Ok(messages) if !messages.is_empty() => messages,
                Ok(_) => vec![self.seed()],
                Err(e) => {
                    tracing::warn!("Failed to parse saved history: {}", e);
                    vec![self.seed()]
                }
            },
            Ok(None) => vec![self.seed()],
            Err(e) => {
                tracing::warn!("Failed to read saved history: {}", e);
                vec![self.seed()]
            }
        };
        tracing::debug!("Loaded {} message(s)", self.messages.len());
        &self.messages
    }

    pub fn save(&self) {
        let json = match serde_json::to_string(&self.messages) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize history: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(HISTORY_KEY, &json) {
            tracing::warn!("Failed to save history: {}", e);
        }
    }

    fn seed(&self) -> Message {
        Message::new(Role::Assistant, self.welcome_message.clone())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};

    use super::*;
    use crate::services::storage::MemoryStore;

    const WELCOME: &str = "Welcome!";

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("disk on fire")
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("disk on fire")
        }
        fn remove(&self, _key: &str) -> Result<()> {
            bail!("disk on fire")
        }
    }

    fn store_with_ceiling(ceiling: usize) -> (ConversationStore, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        (
            ConversationStore::new(storage.clone(), WELCOME, ceiling),
            storage,
        )
    }

    fn contents(store: &ConversationStore) -> Vec<&str> {
        store.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_starts_with_seed() {
        let (store, _) = store_with_ceiling(100);
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].role, Role::Assistant);
        assert_eq!(store.messages()[0].content, WELCOME);
    }

    #[test]
    fn test_append_persists() {
        let (mut store, storage) = store_with_ceiling(100);
        let msg = store.append(Role::User, "Hi");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hi");
        let saved = storage.get(HISTORY_KEY).unwrap().unwrap();
        let saved: Vec<Message> = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].content, "Hi");
    }

    #[test]
    fn test_enforce_limit_evicts_oldest_non_seed_first() {
        // Seed is 8 chars
        let (mut store, _) = store_with_ceiling(20);
        store.append(Role::User, "aaaaa");
        store.append(Role::Assistant, "bbbbb");
        store.append(Role::User, "ccccc");
        assert_eq!(store.char_count(), 23);

        assert_eq!(store.enforce_limit(), 1);
        assert_eq!(contents(&store), vec![WELCOME, "bbbbb", "ccccc"]);
        assert!(store.char_count() <= 20);
    }

    #[test]
    fn test_enforce_limit_keeps_seed_when_seed_alone_exceeds() {
        let (mut store, _) = store_with_ceiling(3);
        store.append(Role::User, "hello");
        store.append(Role::Assistant, "world");
        store.enforce_limit();
        assert_eq!(contents(&store), vec![WELCOME]);
    }

    #[test]
    fn test_enforce_limit_is_idempotent() {
        let (mut store, _) = store_with_ceiling(15);
        for text in ["one", "two", "three", "four"] {
            store.append(Role::User, text);
        }
        store.enforce_limit();
        let once: Vec<String> = contents(&store).into_iter().map(String::from).collect();
        assert_eq!(store.enforce_limit(), 0);
        let twice: Vec<String> = contents(&store).into_iter().map(String::from).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_enforce_limit_counts_chars_not_bytes() {
        let (mut store, _) = store_with_ceiling(12);
        store.append(Role::User, "你好你好");
        assert_eq!(store.char_count(), 12);
        assert_eq!(store.enforce_limit(), 0);
    }

    #[test]
    fn test_to_api_format_preserves_order() {
        let (mut store, _) = store_with_ceiling(100);
        store.append(Role::User, "Hi");
        store.append(Role::Assistant, "Hello");
        assert_eq!(
            store.to_api_format(),
            vec![
                ChatMessage::new(Role::Assistant, WELCOME),
                ChatMessage::new(Role::User, "Hi"),
                ChatMessage::new(Role::Assistant, "Hello"),
            ]
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let (mut store, storage) = store_with_ceiling(100);
        store.append(Role::User, "question");
        store.append(Role::Assistant, "answer");

        let mut restored = ConversationStore::new(storage, WELCOME, 100);
        restored.load();
        let pairs = |s: &ConversationStore| {
            s.messages()
                .iter()
                .map(|m| (m.role, m.content.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(pairs(&restored), pairs(&store));
    }

    #[test]
    fn test_load_falls_back_to_seed() {
        let storage = Arc::new(MemoryStore::new());
        let mut store = ConversationStore::new(storage.clone(), WELCOME, 100);
        assert_eq!(store.load().len(), 1);

        storage.set(HISTORY_KEY, "not json").unwrap();
        assert_eq!(store.load()[0].content, WELCOME);

        storage.set(HISTORY_KEY, "[]").unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_load_accepts_entries_without_timestamp() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                HISTORY_KEY,
                r#"[{"role":"assistant","content":"hey"},{"role":"user","content":"yo"}]"#,
            )
            .unwrap();
        let mut store = ConversationStore::new(storage, WELCOME, 100);
        assert_eq!(store.load().len(), 2);
        assert_eq!(store.messages()[1].role, Role::User);
    }

    #[test]
    fn test_persistence_failures_are_swallowed() {
        let mut store = ConversationStore::new(Arc::new(FailingStore), WELCOME, 100);
        store.append(Role::User, "still here");
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.load().len(), 1);
        store.clear();
        assert_eq!(contents(&store), vec![WELCOME]);
    }

    #[test]
    fn test_reset_and_clear() {
        let (mut store, storage) = store_with_ceiling(100);
        store.append(Role::User, "Hi");
        store.reset();
        assert_eq!(contents(&store), vec![WELCOME]);
        let saved: Vec<Message> =
            serde_json::from_str(&storage.get(HISTORY_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(saved.len(), 1);

        store.append(Role::User, "again");
        store.clear();
        assert_eq!(contents(&store), vec![WELCOME]);
    }

    #[test]
    fn test_update_and_finalize_last() {
        let (mut store, storage) = store_with_ceiling(100);
        store.append(Role::Assistant, "");
        store.update_last("partial");
        assert_eq!(store.messages()[1].content, "partial");
        let saved = storage.get(HISTORY_KEY).unwrap().unwrap();
        assert!(!saved.contains("partial"));

        store.finalize_last("done");
        let saved = storage.get(HISTORY_KEY).unwrap().unwrap();
        assert!(saved.contains("done"));
    }

    #[test]
    fn test_usage_levels() {
        let (mut store, _) = store_with_ceiling(10);
        assert_eq!(store.usage().level, UsageLevel::Warning); // 8 of 10
        store.append(Role::User, "abc");
        let usage = store.usage();
        assert_eq!(usage.chars, 11);
        assert_eq!(usage.percent, 100.0);
        assert_eq!(usage.level, UsageLevel::Critical);

        let (store, _) = store_with_ceiling(100);
        assert_eq!(store.usage().level, UsageLevel::Normal);
    }
}
