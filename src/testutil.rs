//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::{QaError, Service};
use crate::llm::{ChatMessage, ChatModel};
use crate::models::Chunk;

mod http_stub;
mod pdf;
pub use http_stub::{Reply, StubServer};
pub use pdf::build_pdf;

/// A chunk carrying only `text`; every call gets a fresh id.
pub fn chunk(text: &str) -> Chunk {
    Chunk {
        id: uuid::Uuid::new_v4().to_string(),
        source: "test.pdf".to_string(),
        source_index: 0,
        chunk_index: 0,
        text: text.to_string(),
        first_page: 1,
        last_page: 1,
        start_char: 0,
        end_char: text.chars().count(),
        hash: String::new(),
    }
}

const DIMS: usize = 64;

/// Deterministic bag-of-words embedder: each lowercase word bumps one bucket.
#[derive(Default)]
pub struct FakeEmbedder {
    calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl FakeEmbedder {
    /// Succeeds for the first `n` calls, then returns a service failure.
    pub fn failing_after(n: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_after: Some(n),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        v[bucket as usize % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if call >= limit {
                return Err(QaError::service(Service::Embedding, "HTTP 500: boom").into());
            }
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Chat model that returns a canned reply (or fails) and records requests.
pub struct FakeChat {
    reply: Option<String>,
    sent: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.sent.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    fn model_name(&self) -> &str {
        "fake-chat"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.sent.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(QaError::service(Service::Chat, "request timed out").into()),
        }
    }
}
