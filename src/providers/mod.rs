pub mod client;
pub mod models;
pub mod stream;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::HttpTransport;
pub use traits::CompletionTransport;
pub use types::{ChatMessage, CompletionRequest, ProviderError};
