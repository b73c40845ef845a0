pub const APP_NAME: &str = "Chatterbox";
pub const DATA_DIR_NAME: &str = "chatterbox";
pub const DB_FILE_NAME: &str = "chatterbox.db";

pub const HISTORY_KEY: &str = "chat_history";
pub const SETTINGS_KEY: &str = "app_settings";

pub const ENV_API_KEY: &str = "CHATTERBOX_API_KEY";
pub const ENV_ENDPOINT: &str = "CHATTERBOX_ENDPOINT";
pub const ENV_MODEL: &str = "CHATTERBOX_MODEL";

pub const DEFAULT_ENDPOINT: &str = "https://maas-api.cn-huabei-1.xf-yun.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "xop3qwen1b7";
pub const DEFAULT_USER_ID: &str = "user_id";
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hello! I'm an assistant running on Qwen3-1.7B. \
I can answer questions, chat, and offer suggestions. How can I help you today?";
