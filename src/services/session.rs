use crate::models::{Message, Role};
use crate::services::chat::{ChatError, CompletionStreamReader, StreamResult};
use crate::services::conversation::{ConversationStore, Usage};

/// One user-facing chat: the stored conversation plus the reader that extends it.
pub struct ChatSession {
    store: ConversationStore,
    reader: CompletionStreamReader,
}

impl ChatSession {
    pub fn new(store: ConversationStore, reader: CompletionStreamReader) -> Self {
        Self { store, reader }
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn usage(&self) -> Usage {
        self.store.usage()
    }

    pub fn is_generating(&self) -> bool {
        self.reader.is_busy()
    }

    pub fn load(&mut self) -> &[Message] {
        self.store.load()
    }

    pub fn new_chat(&mut self) {
        self.store.reset();
    }

    pub fn clear_history(&mut self) {
        self.store.clear();
    }

    /// Run one turn: record the user's text, trim history, stream the reply.
    ///
    /// The assistant placeholder is appended after the history snapshot, so the
    /// request never contains it. On failure the placeholder is replaced by the
    /// error text.
    pub async fn send_message<F>(&mut self, text: &str, mut on_event: F) -> Result<String, ChatError>
    where
        F: FnMut(StreamResult),
    {
        if self.is_generating() {
            return Err(ChatError::Busy);
        }

        self.store.append(Role::User, text);
        self.store.enforce_limit();
        let history = self.store.to_api_format();
        self.store.append(Role::Assistant, "");

        let store = &mut self.store;
        let result = self
            .reader
            .run(history, |event| {
                if let StreamResult::Fragment { accumulated } = &event {
                    store.update_last(accumulated);
                }
                on_event(event);
            })
            .await;

        match &result {
            Ok(full_content) => self.store.finalize_last(full_content),
            Err(e) => self.store.finalize_last(&format!("Error: {}", e)),
        }
        result
    }
}
