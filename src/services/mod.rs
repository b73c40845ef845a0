pub mod chat;
pub mod conversation;
pub mod database;
pub mod export;
pub mod session;
pub mod settings;
pub mod storage;

pub use chat::{ChatError, CompletionStreamReader, RequestOptions, StreamResult};
pub use conversation::ConversationStore;
pub use database::Database;
pub use session::ChatSession;
pub use settings::{AppSettings, SettingsService};
pub use storage::KeyValueStore;
