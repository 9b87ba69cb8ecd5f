//! Helpers shared by the integration tests: PDF fixtures and offline
//! stand-ins for the embedding and chat services.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use docqa::embedding::Embedder;
use docqa::llm::{ChatMessage, ChatModel};

#[path = "../../src/testutil/pdf.rs"]
mod pdf;
pub use pdf::build_pdf;

/// Hashed bag-of-words vectors: texts sharing words score higher.
#[derive(Default, Clone)]
pub struct WordEmbedder {
    calls: Arc<AtomicUsize>,
}

impl WordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "word-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 128];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    let h = word
                        .to_lowercase()
                        .bytes()
                        .fold(5381u32, |h, b| h.wrapping_mul(33) ^ b as u32);
                    v[h as usize % 128] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Replies with a fixed answer and keeps every request it received.
#[derive(Clone)]
pub struct ScriptedChat {
    reply: String,
    pub requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedChat {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}
