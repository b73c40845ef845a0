use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;

use super::traits::{ChunkStream, CompletionTransport};
use super::types::{CompletionRequest, ProviderError};

pub type ChunkSender = mpsc::UnboundedSender<Result<Bytes, ProviderError>>;

pub enum Scripted {
    Stream(mpsc::UnboundedReceiver<Result<Bytes, ProviderError>>),
    Fail(ProviderError),
    Reply(String),
}

/// Fake transport: replays one scripted outcome per request and records what was sent.
pub struct FakeTransport {
    script: Mutex<Vec<Scripted>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A transport whose single response body is fed through the returned sender.
    pub fn channel() -> (Self, ChunkSender) {
        let (tx, rx) = mpsc::unbounded();
        (Self::new(vec![Scripted::Stream(rx)]), tx)
    }

    /// A transport that streams the given lines, then ends the body.
    pub fn lines(lines: &[&str]) -> Self {
        let (transport, tx) = Self::channel();
        for line in lines {
            tx.unbounded_send(Ok(Bytes::from(format!("{}\n", line))))
                .unwrap();
        }
        transport
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next(&self, request: &CompletionRequest) -> Scripted {
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.script.lock().unwrap();
        assert!(!script.is_empty(), "unexpected request");
        script.remove(0)
    }
}

#[async_trait]
impl CompletionTransport for FakeTransport {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ProviderError> {
        match self.next(request) {
            Scripted::Stream(rx) => Ok(rx.boxed()),
            Scripted::Fail(e) => Err(e),
            Scripted::Reply(_) => panic!("expected a non-streaming request"),
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        match self.next(request) {
            Scripted::Reply(text) => Ok(text),
            Scripted::Fail(e) => Err(e),
            Scripted::Stream(_) => panic!("expected a streaming request"),
        }
    }
}

pub fn delta(text: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
    )
}
