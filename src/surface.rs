//! Interactive terminal session.
//!
//! ```text
//! banner ──► API key prompt (masked) ──► [--file uploads] ──► command loop
//! ```
//!
//! The loop reads one line at a time with rustyline. Lines starting with
//! `/` are commands; anything else is a question for the current batch.
//! Errors that only affect one command are printed and the loop keeps
//! going. Errors that make the session unusable end it.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::history::DefaultHistory;
use rustyline::{ColorMode, DefaultEditor, Editor};
use rustyline::{Completer, Helper, Hinter, Validator};

use crate::answer::Answer;
use crate::config::Config;
use crate::credential::Credential;
use crate::error::QaError;
use crate::history::OpenOutcome;
use crate::loader::read_upload;
use crate::models::{HistoryEntry, UploadedFile, MIME_PDF};
use crate::progress::ProgressMode;
use crate::session::{BatchSummary, SessionContext};

const TITLE: &str = "docqa: ask questions about your PDF documents";

const HELP: &str = "\
Commands:
  /upload FILE.pdf [FILE.pdf ...]  - Index these files (replaces the current batch)
  /history                         - Toggle the history panel
  /sources                         - Show the passages behind the last answer
  /help                            - Show this help
  /quit                            - Exit (also Ctrl+D or Ctrl+C)
  <question>                       - Ask about the uploaded documents";

/// Renders every typed character as `*`.
#[derive(Completer, Helper, Hinter, Validator)]
pub struct MaskingHighlighter {
    masking: bool,
}

impl Highlighter for MaskingHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Owned("*".repeat(line.chars().count()))
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        self.masking
    }
}

/// Prompt for the API key. Input is masked on a terminal; otherwise the
/// first line of stdin is used.
pub fn read_credential() -> Result<Credential> {
    let raw = if atty::is(atty::Stream::Stdin) {
        let mut rl: Editor<MaskingHighlighter, DefaultHistory> =
            Editor::new().with_context(|| "Failed to create readline editor")?;
        rl.set_helper(Some(MaskingHighlighter { masking: true }));
        rl.set_color_mode(ColorMode::Forced);
        rl.set_auto_add_history(false);
        match rl.readline("OpenAI API key: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => String::new(),
            Err(e) => return Err(e.into()),
        }
    } else {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        line
    };
    Ok(Credential::new(raw)?)
}

pub fn print_banner() {
    println!("{}", TITLE);
    println!("Upload one or more PDF files, then ask questions about their content.");
    println!("Answers come from a language model given the most relevant passages.");
    println!();
}

/// One line of input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(Vec<PathBuf>),
    History,
    Sources,
    Help,
    Quit,
    Ask(String),
    Empty,
    Unknown(String),
}

/// Questions keep the line exactly as typed.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    if !trimmed.starts_with('/') {
        return Command::Ask(line.to_string());
    }
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or_default();
    match head {
        "/upload" => Command::Upload(parts.map(PathBuf::from).collect()),
        "/history" => Command::History,
        "/sources" => Command::Sources,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Read `paths` as uploads, keeping only PDFs. Returns the accepted files
/// and one message per rejected path.
pub fn collect_uploads(paths: &[PathBuf]) -> (Vec<UploadedFile>, Vec<String>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for path in paths {
        match read_upload(path) {
            Ok(file) if file.content_type == MIME_PDF => accepted.push(file),
            Ok(file) => rejected.push(format!("{}: not a PDF, skipped", file.name)),
            Err(e) => rejected.push(format!("{}", e)),
        }
    }
    (accepted, rejected)
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Display state that lives only as long as the loop.
#[derive(Debug, Default)]
pub struct View {
    pub show_history: bool,
}

/// Execute one command against the session, writing user-facing output to `out`.
pub async fn dispatch(
    ctx: &mut SessionContext,
    view: &mut View,
    command: Command,
    out: &mut impl Write,
) -> Result<Flow> {
    match command {
        Command::Empty => {}
        Command::Quit => return Ok(Flow::Quit),
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Unknown(cmd) => writeln!(
            out,
            "Unknown command: {}. Type /help for available commands.",
            cmd
        )?,
        Command::Upload(paths) => {
            if paths.is_empty() {
                writeln!(out, "Usage: /upload FILE.pdf [FILE.pdf ...]")?;
                return Ok(Flow::Continue);
            }
            upload_paths(ctx, &paths, out).await?;
        }
        Command::History => {
            view.show_history = !view.show_history;
            if view.show_history {
                render_history(out, &ctx.recent_history().await?)?;
            } else {
                writeln!(out, "History panel hidden.")?;
            }
        }
        Command::Sources => match ctx.last_answer() {
            Some(answer) => render_sources(out, answer)?,
            None => writeln!(out, "No answer yet.")?,
        },
        Command::Ask(question) => {
            if let Some(answer) = ctx.ask(&question).await? {
                render_answer(out, &answer)?;
                if view.show_history {
                    render_history(out, &ctx.recent_history().await?)?;
                }
            }
        }
    }
    Ok(Flow::Continue)
}

async fn upload_paths(
    ctx: &mut SessionContext,
    paths: &[PathBuf],
    out: &mut impl Write,
) -> Result<()> {
    let (files, rejected) = collect_uploads(paths);
    for message in &rejected {
        writeln!(out, "skipped {}", message)?;
    }
    if files.is_empty() {
        writeln!(out, "No PDF files to upload.")?;
        return Ok(());
    }
    let summary = ctx.upload(&files).await?;
    render_batch(out, summary)
}

pub fn render_batch(out: &mut impl Write, summary: &BatchSummary) -> Result<()> {
    writeln!(
        out,
        "Indexed {} file(s): {} pages, {} chunks.",
        summary.files.len(),
        summary.documents,
        summary.chunks
    )?;
    for failure in &summary.failures {
        writeln!(out, "  skipped: {}", failure)?;
    }
    if summary.chunks == 0 {
        writeln!(out, "No text was found in the uploaded files.")?;
    }
    Ok(())
}

pub fn render_answer(out: &mut impl Write, answer: &Answer) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", answer.text)?;
    writeln!(out)?;
    if answer.history_id.is_none() {
        writeln!(out, "(This exchange could not be saved to history.)")?;
    }
    Ok(())
}

pub fn render_sources(out: &mut impl Write, answer: &Answer) -> Result<()> {
    if answer.sources.is_empty() {
        writeln!(out, "The last answer used no passages.")?;
        return Ok(());
    }
    for (rank, source) in answer.sources.iter().enumerate() {
        let chunk = &source.chunk;
        let pages = if chunk.first_page == chunk.last_page {
            format!("p.{}", chunk.first_page)
        } else {
            format!("pp.{}-{}", chunk.first_page, chunk.last_page)
        };
        writeln!(
            out,
            "[{}] {} {} (score {:.3})",
            rank + 1,
            chunk.source,
            pages,
            source.score
        )?;
        writeln!(out, "    {}", snippet(&chunk.text, 160))?;
    }
    Ok(())
}

pub fn render_history(out: &mut impl Write, entries: &[HistoryEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "History is empty.")?;
        return Ok(());
    }
    writeln!(out, "--- History (most recent first) ---")?;
    for entry in entries {
        writeln!(
            out,
            "#{}  {}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(out, "  Q: {}", entry.query)?;
        writeln!(out, "  A: {}", snippet(&entry.answer, 240))?;
    }
    Ok(())
}

/// First `max` characters on one line, with `...` if cut.
pub fn snippet(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn report_history_outcome(outcome: &OpenOutcome, path: &Path) {
    match outcome {
        OpenOutcome::Opened => {}
        OpenOutcome::CreatedFresh => {
            println!("Started a new history at {}.", path.display());
        }
        OpenOutcome::Recovered { moved_to, reason } => {
            eprintln!(
                "warning: history at {} was unreadable ({}); moved it to {} and started fresh.",
                path.display(),
                reason,
                moved_to.display()
            );
        }
    }
}

/// Run the full interactive session. Returns when the user quits.
pub async fn run_session(config: Config, progress: ProgressMode, files: &[PathBuf]) -> Result<()> {
    print_banner();

    let credential = match read_credential() {
        Ok(credential) => credential,
        Err(e) => {
            if let Some(QaError::MissingCredential) = e.downcast_ref::<QaError>() {
                eprintln!("warning: please enter your OpenAI API key.");
            }
            return Err(e);
        }
    };

    let history_path = config.history.path.clone();
    let mut ctx = SessionContext::start(config, credential, progress.reporter()).await?;
    report_history_outcome(ctx.history_outcome(), &history_path);

    let mut view = View::default();
    let mut stdout = std::io::stdout();

    if !files.is_empty() {
        if let Err(e) = upload_paths(&mut ctx, files, &mut stdout).await {
            eprintln!("Upload failed: {:#}", e);
        }
    } else {
        println!("Upload PDF files with /upload to get started.");
    }
    println!("Type /help for commands.");

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;

    loop {
        match rl.readline("docqa> ") {
            Ok(line) => {
                let command = parse_command(&line);
                if command != Command::Empty {
                    rl.add_history_entry(line.trim()).ok();
                }
                match dispatch(&mut ctx, &mut view, command, &mut stdout).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => {
                        let fatal = matches!(
                            e.downcast_ref::<QaError>(),
                            Some(err) if !err.is_recoverable()
                        );
                        if fatal {
                            ctx.close().await;
                            return Err(e);
                        }
                        eprintln!("Error: {:#}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                ctx.close().await;
                return Err(e.into());
            }
        }
    }

    println!("Goodbye!");
    ctx.close().await;
    Ok(())
}
