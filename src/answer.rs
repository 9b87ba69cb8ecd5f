//! Answering pipeline: question in, grounded answer out.
//!
//! ```text
//! question ──► embed ──► top-k chunks ──► chat completion ──► answer
//!                                                     └──► history append
//! ```
//!
//! The model's reply is returned verbatim. Nothing checks it against the
//! retrieved text.

use anyhow::Result;
use serde::Serialize;

use crate::embedding::Embedder;
use crate::error::QaError;
use crate::history::HistoryStore;
use crate::index;
use crate::llm::{ChatMessage, ChatModel};
use crate::models::ScoredChunk;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::VectorStore;

const SYSTEM_PREAMBLE: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    /// Chunks given to the model, best match first.
    pub sources: Vec<ScoredChunk>,
    /// Row id of the history entry, or `None` if the append failed.
    pub history_id: Option<i64>,
}

/// Everything [`answer_question`] needs, borrowed from the session.
pub struct Pipeline<'a> {
    pub store: &'a dyn VectorStore,
    pub embedder: &'a dyn Embedder,
    pub chat: &'a dyn ChatModel,
    pub history: &'a HistoryStore,
    pub top_k: usize,
    pub progress: &'a dyn ProgressReporter,
}

/// System message with the retrieved context, then the question.
pub fn build_messages(question: &str, context: &[ScoredChunk]) -> Vec<ChatMessage> {
    let context_text = context
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        ChatMessage::system(format!("{}\n{}", SYSTEM_PREAMBLE, context_text)),
        ChatMessage::user(question),
    ]
}

/// Answer one question. Blank input is a no-op and returns `Ok(None)`.
/// Otherwise the question is used and recorded exactly as typed.
pub async fn answer_question(pipeline: &Pipeline<'_>, question: &str) -> Result<Option<Answer>> {
    if question.trim().is_empty() {
        return Ok(None);
    }

    if pipeline.store.count().await? == 0 {
        return Err(QaError::NoDocuments.into());
    }

    pipeline.progress.report(ProgressEvent::Thinking);

    let sources = index::top_k(pipeline.store, pipeline.embedder, question, pipeline.top_k).await?;
    tracing::debug!(retrieved = sources.len(), "context retrieved");

    let messages = build_messages(question, &sources);
    tracing::debug!(model = pipeline.chat.model_name(), "asking chat model");
    let text = pipeline.chat.complete(&messages).await?;

    let history_id = match pipeline
        .history
        .append(pipeline.embedder, question, &text)
        .await
    {
        Ok(entry) => Some(entry.id),
        Err(e) => {
            tracing::warn!(error = %e, "answer not recorded in history");
            None
        }
    };

    Ok(Some(Answer {
        question: question.to_string(),
        text,
        sources,
        history_id,
    }))
}
