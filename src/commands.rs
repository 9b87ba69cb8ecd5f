//! Non-interactive commands: `ask`, `history`, `inspect`, `init`.
//!
//! Each `run_*` function backs one CLI subcommand and prints its results to
//! stdout. Warnings and progress go to stderr.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::{embed_query, OpenAIEmbedder};
use crate::history::{HistoryStore, OpenOutcome};
use crate::progress::ProgressMode;
use crate::session::{prepare_batch, SessionContext};
use crate::surface::{collect_uploads, read_credential, render_answer, render_history, render_sources, snippet};

/// Upload `files`, answer one question, print the answer and its sources.
pub async fn run_ask(
    config: Config,
    files: &[PathBuf],
    question: &str,
    progress: ProgressMode,
) -> Result<()> {
    let credential = read_credential()?;

    let (uploads, rejected) = collect_uploads(files);
    for message in &rejected {
        eprintln!("skipped {}", message);
    }
    if uploads.is_empty() {
        bail!("no PDF files to upload");
    }

    let mut ctx = SessionContext::start(config, credential, progress.reporter()).await?;
    warn_if_recovered(ctx.history_outcome());

    let result = async {
        ctx.upload(&uploads).await?;
        ctx.ask(question).await
    }
    .await;

    let mut stdout = std::io::stdout();
    let outcome = match result {
        Ok(Some(answer)) => {
            render_answer(&mut stdout, &answer)?;
            println!("Sources:");
            render_sources(&mut stdout, &answer)
        }
        Ok(None) => {
            eprintln!("Nothing to ask: the question is blank.");
            Ok(())
        }
        Err(e) => Err(e),
    };
    ctx.close().await;
    outcome
}

/// Print recent history, or with `like`, the entries most similar to it.
pub async fn run_history(config: &Config, limit: Option<usize>, like: Option<&str>) -> Result<()> {
    let (store, outcome) = HistoryStore::open(&config.history.path).await?;
    warn_if_recovered(&outcome);
    let limit = limit.unwrap_or(config.history.display_limit);

    match like {
        None => {
            let entries = store.recent(limit).await?;
            render_history(&mut std::io::stdout(), &entries)?;
        }
        Some(text) => {
            let credential = read_credential()?;
            let embedder = OpenAIEmbedder::new(&config.embedding, credential)?;
            let vector = embed_query(&embedder, text).await?;
            let hits = store.similar(&vector, limit).await?;
            if hits.is_empty() {
                println!("History is empty.");
            }
            for (entry, score) in hits {
                println!("#{}  (score {:.3})", entry.id, score);
                println!("  Q: {}", entry.query);
                println!("  A: {}", snippet(&entry.answer, 240));
            }
        }
    }

    store.close().await;
    Ok(())
}

/// Load and chunk `files` without any service calls and report what an
/// upload would index.
pub fn run_inspect(config: &Config, files: &[PathBuf], json: bool) -> Result<()> {
    let (uploads, rejected) = collect_uploads(files);
    for message in &rejected {
        eprintln!("skipped {}", message);
    }
    if uploads.is_empty() {
        bail!("no PDF files to inspect");
    }

    let (report, chunks) = prepare_batch(&uploads, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    for (source_index, file) in uploads.iter().enumerate() {
        let pages = report
            .documents
            .iter()
            .filter(|d| d.source_index == source_index)
            .count();
        let file_chunks = chunks
            .iter()
            .filter(|c| c.source_index == source_index)
            .count();
        println!("{}: {} pages, {} chunks", file.name, pages, file_chunks);
    }
    for failure in &report.failures {
        println!("  skipped: {}", failure.error);
    }
    println!(
        "total: {} pages, {} chunks (size {}, overlap {})",
        report.documents.len(),
        chunks.len(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    Ok(())
}

/// Create the history store if it does not exist yet.
pub async fn run_init(config: &Config) -> Result<()> {
    let (store, outcome) = HistoryStore::open(&config.history.path).await?;
    let count = store.count().await?;
    match outcome {
        OpenOutcome::CreatedFresh => println!(
            "History store created at {}.",
            config.history.path.display()
        ),
        OpenOutcome::Opened => println!(
            "History store at {} already exists ({} entries).",
            config.history.path.display(),
            count
        ),
        OpenOutcome::Recovered { moved_to, .. } => println!(
            "History store at {} was unreadable; moved to {} and recreated.",
            config.history.path.display(),
            moved_to.display()
        ),
    }
    store.close().await;
    Ok(())
}

fn warn_if_recovered(outcome: &OpenOutcome) {
    if let OpenOutcome::Recovered { moved_to, reason } = outcome {
        eprintln!(
            "warning: history was unreadable ({}); moved to {} and started fresh.",
            reason,
            moved_to.display()
        );
    }
}
