//! Tests that drive the `docqa` binary. None of them reach a network service.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use common::build_pdf;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();

    fs::write(
        files_dir.join("constitution.pdf"),
        build_pdf(&[
            "Article 1. The Republic of Kazakhstan is a democratic state.",
            "Article 2. The capital of Kazakhstan is Astana.",
            "Article 3. The state language is Kazakh.",
        ]),
    )
    .unwrap();
    fs::write(files_dir.join("notes.txt"), "not a pdf").unwrap();

    let config_content = format!(
        r#"[session]
dir = "{root}/data/session"

[history]
path = "{root}/data/history.sqlite"

[upload]
temp_dir = "{root}/data/uploads"

[embedding]
base_url = "http://127.0.0.1:9"
"#,
        root = root.display()
    );
    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn init_creates_history_and_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("created"));
    assert!(tmp.path().join("data/history.sqlite").exists());

    let (stdout, _, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "second init failed");
    assert!(stdout.contains("already exists (0 entries)"));
}

#[test]
fn history_on_fresh_store_is_empty() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_docqa(&config_path, &["history"]);
    assert!(success, "history failed: {}", stderr);
    assert!(stdout.contains("History is empty."));
}

#[test]
fn inspect_reports_pages_and_chunks() {
    let (tmp, config_path) = setup_test_env();
    let pdf = file(&tmp, "constitution.pdf");
    let txt = file(&tmp, "notes.txt");

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["inspect", "--file", &pdf, "--file", &txt]);
    assert!(success, "inspect failed: {}", stderr);
    assert!(stdout.contains("constitution.pdf: 3 pages, 1 chunks"));
    assert!(stdout.contains("total: 3 pages, 1 chunks (size 1000, overlap 200)"));
    assert!(stderr.contains("notes.txt: not a PDF"));
    assert_eq!(
        fs::read_dir(tmp.path().join("data/uploads")).unwrap().count(),
        0
    );
}

#[test]
fn inspect_json_lists_chunks() {
    let (tmp, config_path) = setup_test_env();
    let pdf = file(&tmp, "constitution.pdf");
    let (stdout, _, success) = run_docqa(&config_path, &["inspect", "--json", "--file", &pdf]);
    assert!(success);
    let chunks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let chunks = chunks.as_array().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["source"], "constitution.pdf");
    assert_eq!(chunks[0]["first_page"], 1);
    assert_eq!(chunks[0]["last_page"], 3);
}

#[test]
fn ask_without_api_key_halts_before_any_work() {
    let (tmp, config_path) = setup_test_env();
    let pdf = file(&tmp, "constitution.pdf");

    let (_, stderr, success) = run_docqa(
        &config_path,
        &["ask", "--file", &pdf, "What is the capital?"],
    );
    assert!(!success);
    assert!(stderr.contains("API key is required"), "stderr: {}", stderr);
    assert!(!tmp.path().join("data/history.sqlite").exists());
    assert!(!tmp.path().join("data/session").exists());
}

#[test]
fn ask_asks_for_the_key_before_looking_at_files() {
    let (tmp, config_path) = setup_test_env();
    let txt = file(&tmp, "notes.txt");

    let (_, stderr, success) = run_docqa(&config_path, &["ask", "--file", &txt, "Anything?"]);
    assert!(!success);
    assert!(stderr.contains("API key is required"), "stderr: {}", stderr);
    assert!(!stderr.contains("not a PDF"), "stderr: {}", stderr);
    assert!(!stderr.contains("no PDF files"), "stderr: {}", stderr);
}

#[test]
fn session_without_api_key_shows_banner_then_stops() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_docqa(&config_path, &["session"]);
    assert!(!success);
    assert!(stdout.contains("docqa: ask questions about your PDF documents"));
    assert!(stderr.contains("please enter your OpenAI API key"));
    assert!(!stdout.contains("Type /help"));
    assert!(!tmp.path().join("data/history.sqlite").exists());
}
