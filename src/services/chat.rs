use std::cell::{Cell, RefCell};
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;

use crate::providers::stream::{SseDecoder, SseFrame};
use crate::providers::{ChatMessage, CompletionRequest, CompletionTransport, ProviderError};
use crate::services::settings::AppSettings;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("A response is still being generated")]
    Busy,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Sending,
    Streaming,
    Complete,
    Failed,
}

/// Progress of one reply, delivered to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamResult {
    /// The full text accumulated so far.
    Fragment { accumulated: String },
    Done { full_content: String },
    Error { error: String, partial: String },
}

/// Request parameters that don't change between turns.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub model: String,
    pub user: String,
    pub stream: bool,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&AppSettings> for RequestOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            model: settings.model.clone(),
            user: settings.user_id.clone(),
            stream: settings.stream_responses,
            system_prompt: settings
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Sends one request per turn and accumulates the streamed reply.
///
/// Only one request may be in flight; `run` fails with [`ChatError::Busy`]
/// while a previous call is still sending or streaming. The reader lives on a
/// single task, so its state needs no locking.
pub struct CompletionStreamReader {
    transport: Arc<dyn CompletionTransport>,
    options: RequestOptions,
    state: Cell<ReaderState>,
    buffer: RefCell<String>,
}

impl CompletionStreamReader {
    pub fn new(transport: Arc<dyn CompletionTransport>, options: RequestOptions) -> Self {
        Self {
            transport,
            options,
            state: Cell::new(ReaderState::Idle),
            buffer: RefCell::new(String::new()),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ReaderState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state.get(), ReaderState::Sending | ReaderState::Streaming)
    }

    pub fn accumulated(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn build_request(&self, history: Vec<ChatMessage>) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.options.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(history);

        CompletionRequest {
            model: self.options.model.clone(),
            user: self.options.user.clone(),
            messages,
            stream: self.options.stream,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }

    /// Send `history` and report progress through `on_event`.
    ///
    /// Returns the final text on success. On failure `on_event` receives a
    /// `StreamResult::Error` carrying whatever text had already arrived, and
    /// the error is returned as well.
    pub async fn run<F>(&self, history: Vec<ChatMessage>, mut on_event: F) -> Result<String, ChatError>
    where
        F: FnMut(StreamResult),
    {
        if self.is_busy() {
            tracing::warn!("Rejected request: reader is {:?}", self.state.get());
            return Err(ChatError::Busy);
        }

        self.state.set(ReaderState::Sending);
        self.buffer.borrow_mut().clear();

        let request = self.build_request(history);
        let outcome = if request.stream {
            self.read_stream(&request, &mut on_event).await
        } else {
            self.read_whole(&request).await
        };

        match outcome {
            Ok(()) => {
                self.state.set(ReaderState::Complete);
                let full_content = self.accumulated();
                tracing::debug!("Reply complete ({} chars)", full_content.chars().count());
                on_event(StreamResult::Done {
                    full_content: full_content.clone(),
                });
                Ok(full_content)
            }
            Err(e) => {
                self.state.set(ReaderState::Failed);
                tracing::error!("Completion request failed: {}", e);
                on_event(StreamResult::Error {
                    error: e.to_string(),
                    partial: self.accumulated(),
                });
                Err(e.into())
            }
        }
    }

    async fn read_stream<F>(&self, request: &CompletionRequest, on_event: &mut F) -> Result<(), ProviderError>
    where
        F: FnMut(StreamResult),
    {
        let mut chunks = self.transport.open_stream(request).await?;
        self.state.set(ReaderState::Streaming);

        let mut decoder = SseDecoder::new();
        while let Some(chunk) = chunks.next().await {
            let bytes = chunk?;
            for frame in decoder.feed(&bytes) {
                self.apply(frame, on_event);
            }
        }
        for frame in decoder.finish() {
            self.apply(frame, on_event);
        }
        Ok(())
    }

    async fn read_whole(&self, request: &CompletionRequest) -> Result<(), ProviderError> {
        let text = self.transport.complete(request).await?;
        self.buffer.borrow_mut().push_str(&text);
        Ok(())
    }

    fn apply<F>(&self, frame: SseFrame, on_event: &mut F)
    where
        F: FnMut(StreamResult),
    {
        match frame {
            SseFrame::Delta(text) => {
                let accumulated = {
                    let mut buffer = self.buffer.borrow_mut();
                    buffer.push_str(&text);
                    buffer.clone()
                };
                on_event(StreamResult::Fragment { accumulated });
            }
            // The body still has to end on its own
            SseFrame::Done => tracing::debug!("Received [DONE]"),
        }
    }
}
