//! Session context.
//!
//! A [`SessionContext`] owns everything one interactive session needs: the
//! service clients built from the session's credential, the ephemeral index,
//! the persistent history store and the summary of the current upload batch.
//! It is passed explicitly to each operation; nothing lives in globals.
//!
//! Starting a session deletes the previous `index.sqlite` under
//! `session.dir`, so every session begins with an empty index. History
//! survives, even when it is stored in the same directory.

use std::path::Path;

use anyhow::Result;

use crate::answer::{self, Answer, Pipeline};
use crate::chunk::Chunker;
use crate::config::{Config, IndexBackend};
use crate::credential::Credential;
use crate::embedding::{embed_query, Embedder, OpenAIEmbedder};
use crate::history::{HistoryStore, OpenOutcome};
use crate::index;
use crate::llm::{ChatModel, OpenAIChat};
use crate::loader::{self, LoadReport};
use crate::models::{Chunk, HistoryEntry, UploadedFile};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::store::{InMemoryVectorStore, SqliteVectorStore, VectorStore};
use crate::{db, migrate};

const INDEX_FILE: &str = "index.sqlite";

/// What the current upload batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Names of the files that were indexed.
    pub files: Vec<String>,
    pub documents: usize,
    pub chunks: usize,
    /// Files skipped under `upload.on_extract_error = "skip"`, with reasons.
    pub failures: Vec<String>,
}

pub struct SessionContext {
    config: Config,
    chunker: Chunker,
    store: Box<dyn VectorStore>,
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatModel>,
    history: HistoryStore,
    history_outcome: OpenOutcome,
    progress: Box<dyn ProgressReporter>,
    batch: Option<BatchSummary>,
    last_answer: Option<Answer>,
}

impl SessionContext {
    /// Open history, reset the session index and build the service clients.
    pub async fn start(
        config: Config,
        credential: Credential,
        progress: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        config.validate()?;
        let (history, history_outcome) = HistoryStore::open(&config.history.path).await?;
        let store = open_index(&config).await?;
        let embedder = OpenAIEmbedder::new(&config.embedding, credential.clone())?;
        let chat = OpenAIChat::new(&config.llm, credential)?;
        Self::from_parts(
            config,
            store,
            Box::new(embedder),
            Box::new(chat),
            (history, history_outcome),
            progress,
        )
    }

    /// Assemble a session from already-built components.
    pub fn from_parts(
        config: Config,
        store: Box<dyn VectorStore>,
        embedder: Box<dyn Embedder>,
        chat: Box<dyn ChatModel>,
        history: (HistoryStore, OpenOutcome),
        progress: Box<dyn ProgressReporter>,
    ) -> Result<Self> {
        let chunker = Chunker::from_config(&config.chunking)?;
        let (history, history_outcome) = history;
        Ok(Self {
            config,
            chunker,
            store,
            embedder,
            chat,
            history,
            history_outcome,
            progress,
            batch: None,
            last_answer: None,
        })
    }

    /// Replace the index with the contents of `files`.
    ///
    /// The previous batch is discarded before anything else happens, so a
    /// failed upload leaves an empty index rather than a stale one.
    pub async fn upload(&mut self, files: &[UploadedFile]) -> Result<&BatchSummary> {
        self.batch = None;
        self.last_answer = None;
        self.store.clear().await?;

        for file in files {
            self.progress.report(ProgressEvent::Extracting {
                file: file.name.clone(),
            });
        }
        let report = loader::load_batch(files, &self.config.upload)?;

        self.progress.report(ProgressEvent::Chunking {
            documents: report.documents.len() as u64,
        });
        let chunks = self.chunker.split_documents(&report.documents);

        let stats = index::rebuild(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &chunks,
            self.config.embedding.batch_size,
            self.progress.as_ref(),
        )
        .await?;

        let summary = summarize(files, &report, stats.chunks);
        tracing::info!(
            files = summary.files.len(),
            documents = summary.documents,
            chunks = summary.chunks,
            "batch indexed"
        );
        Ok(&*self.batch.insert(summary))
    }

    /// Answer a question against the current batch. Blank input returns `Ok(None)`.
    pub async fn ask(&mut self, question: &str) -> Result<Option<Answer>> {
        let pipeline = Pipeline {
            store: self.store.as_ref(),
            embedder: self.embedder.as_ref(),
            chat: self.chat.as_ref(),
            history: &self.history,
            top_k: self.config.retrieval.top_k,
            progress: self.progress.as_ref(),
        };
        let answer = answer::answer_question(&pipeline, question).await?;
        if let Some(answer) = &answer {
            self.last_answer = Some(answer.clone());
        }
        Ok(answer)
    }

    /// The history panel: up to `history.display_limit` entries, newest first.
    pub async fn recent_history(&self) -> Result<Vec<HistoryEntry>> {
        self.history.recent(self.config.history.display_limit).await
    }

    /// Past exchanges similar to `text`, best first.
    pub async fn similar_history(&self, text: &str, k: usize) -> Result<Vec<(HistoryEntry, f32)>> {
        let vector = embed_query(self.embedder.as_ref(), text).await?;
        self.history.similar(&vector, k).await
    }

    pub fn batch(&self) -> Option<&BatchSummary> {
        self.batch.as_ref()
    }

    pub fn last_answer(&self) -> Option<&Answer> {
        self.last_answer.as_ref()
    }

    pub fn history_outcome(&self) -> &OpenOutcome {
        &self.history_outcome
    }

    pub async fn close(self) {
        self.store.close().await;
        self.history.close().await;
    }
}

/// Load and chunk a batch without embedding it.
pub fn prepare_batch(files: &[UploadedFile], config: &Config) -> Result<(LoadReport, Vec<Chunk>)> {
    let chunker = Chunker::from_config(&config.chunking)?;
    let report = loader::load_batch(files, &config.upload)?;
    let chunks = chunker.split_documents(&report.documents);
    Ok((report, chunks))
}

async fn open_index(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.session.backend {
        IndexBackend::Memory => Ok(Box::new(InMemoryVectorStore::new())),
        IndexBackend::Sqlite => {
            let path = config.session.dir.join(INDEX_FILE);
            remove_index_files(&path)?;
            let pool = db::connect(&path).await?;
            migrate::create_session_schema(&pool).await?;
            tracing::debug!(path = %path.display(), "session index reset");
            Ok(Box::new(SqliteVectorStore::new(pool)))
        }
    }
}

/// Delete the previous session's index database and its WAL sidecars.
/// Nothing else in `session.dir` is touched.
fn remove_index_files(path: &Path) -> std::io::Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut target = path.as_os_str().to_os_string();
        target.push(suffix);
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn summarize(files: &[UploadedFile], report: &LoadReport, chunks: usize) -> BatchSummary {
    let failed: Vec<usize> = report.failures.iter().map(|f| f.source_index).collect();
    BatchSummary {
        files: files
            .iter()
            .enumerate()
            .filter(|(i, _)| !failed.contains(i))
            .map(|(_, f)| f.name.clone())
            .collect(),
        documents: report.documents.len(),
        chunks,
        failures: report.failures.iter().map(|f| f.error.to_string()).collect(),
    }
}
