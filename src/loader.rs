//! PDF upload loading and page-level text extraction.
//!
//! Each upload is written to its own temporary file, parsed with `lopdf`,
//! and turned into one [`Document`] per page. Documents keep upload order,
//! then page order.
//!
//! Temporary files are owned by a [`TempFiles`] guard that remembers every
//! path it created and deletes all of them when the batch finishes, on
//! error paths included. Deletion failures are logged and swallowed.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{ExtractErrorPolicy, UploadConfig};
use crate::error::QaError;
use crate::models::{Document, UploadedFile, MIME_PDF};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Scoped set of temporary files. Every file created through
/// [`TempFiles::write`] is removed by [`TempFiles::cleanup`] or on drop.
pub struct TempFiles {
    dir: Option<PathBuf>,
    paths: Vec<PathBuf>,
}

impl TempFiles {
    /// Temporary files in the system temp directory.
    pub fn new() -> Self {
        Self {
            dir: None,
            paths: Vec::new(),
        }
    }

    /// Temporary files in a specific directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            paths: Vec::new(),
        }
    }

    /// Materialize `bytes` at a fresh, uniquely named path and track it.
    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docqa-").suffix(".pdf");
        let mut file = match &self.dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        let (_handle, path) = file.keep().map_err(|e| e.error)?;
        self.paths.push(path.clone());
        Ok(path)
    }

    /// Delete every tracked file. Returns how many could not be removed.
    pub fn cleanup(&mut self) -> usize {
        let mut failed = 0;
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "temporary file already removed");
                }
                Err(e) => {
                    failed += 1;
                    let err = QaError::CleanupFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "ignoring cleanup failure");
                }
            }
        }
        failed
    }
}

impl Default for TempFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Result of loading one upload batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// Files that loaded successfully.
    pub files_loaded: usize,
    /// Files that were isolated under [`ExtractErrorPolicy::Skip`].
    pub failures: Vec<FileFailure>,
}

/// One file skipped from a batch, identified by its position in the upload.
#[derive(Debug)]
pub struct FileFailure {
    pub source_index: usize,
    pub error: QaError,
}

/// Upload filter applied by the session surface: a `.pdf` name or PDF magic bytes.
pub fn accepts_upload(name: &str, bytes: &[u8]) -> bool {
    let has_pdf_ext = Path::new(name)
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    has_pdf_ext || bytes.starts_with(PDF_MAGIC)
}

/// Read a file from disk as an upload, declaring its MIME type from the filter.
pub fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path)
        .map_err(|e| QaError::extraction(path.display().to_string(), e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = if accepts_upload(&name, &bytes) {
        MIME_PDF.to_string()
    } else {
        "application/octet-stream".to_string()
    };
    Ok(UploadedFile {
        name,
        content_type,
        bytes,
    })
}

/// Load a batch of uploads into page documents.
pub fn load_batch(files: &[UploadedFile], config: &UploadConfig) -> Result<LoadReport> {
    let mut temps = match &config.temp_dir {
        Some(dir) => TempFiles::in_dir(dir),
        None => TempFiles::new(),
    };
    let report = load_batch_with(files, config, &mut temps);
    temps.cleanup();
    report
}

/// [`load_batch`] with a caller-supplied temp-file guard.
pub fn load_batch_with(
    files: &[UploadedFile],
    config: &UploadConfig,
    temps: &mut TempFiles,
) -> Result<LoadReport> {
    if files.len() > config.max_files {
        return Err(QaError::extraction(
            "upload batch",
            format!(
                "{} files uploaded, at most {} allowed",
                files.len(),
                config.max_files
            ),
        )
        .into());
    }

    let mut report = LoadReport::default();

    for (source_index, file) in files.iter().enumerate() {
        match load_file(file, source_index, config, temps) {
            Ok(pages) => {
                tracing::info!(file = %file.name, pages = pages.len(), "extracted PDF");
                report.documents.extend(pages);
                report.files_loaded += 1;
            }
            Err(err) => match config.on_extract_error {
                ExtractErrorPolicy::Abort => return Err(err.into()),
                ExtractErrorPolicy::Skip => {
                    tracing::warn!(file = %file.name, error = %err, "skipping file");
                    report.failures.push(FileFailure {
                        source_index,
                        error: err,
                    });
                }
            },
        }
    }

    Ok(report)
}

fn load_file(
    file: &UploadedFile,
    source_index: usize,
    config: &UploadConfig,
    temps: &mut TempFiles,
) -> Result<Vec<Document>, QaError> {
    if file.content_type != MIME_PDF {
        return Err(QaError::extraction(
            &file.name,
            format!("unsupported content-type: {}", file.content_type),
        ));
    }
    if file.bytes.len() as u64 > config.max_file_bytes {
        return Err(QaError::extraction(
            &file.name,
            format!(
                "file is {} bytes, limit is {} bytes",
                file.bytes.len(),
                config.max_file_bytes
            ),
        ));
    }

    let path = temps
        .write(&file.bytes)
        .map_err(|e| QaError::extraction(&file.name, format!("temporary file: {}", e)))?;

    let pages = extract_pages(&path).map_err(|reason| QaError::extraction(&file.name, reason))?;
    let page_count = pages.len() as u32;

    Ok(pages
        .into_iter()
        .map(|(page, text)| Document {
            text,
            source: file.name.clone(),
            source_index,
            page,
            page_count,
        })
        .collect())
}

/// Extract `(page_number, text)` pairs in page order.
pub fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>, String> {
    let doc = lopdf::Document::load(path).map_err(|e| format!("failed to load PDF: {}", e))?;
    if doc.is_encrypted() {
        return Err("PDF is password-protected".to_string());
    }

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err("PDF has no pages".to_string());
    }

    let mut out = Vec::with_capacity(pages.len());
    for &page_num in pages.keys() {
        let text = doc
            .extract_text(&[page_num])
            .map_err(|e| format!("page {}: {}", page_num, e))?;
        out.push((page_num, text.trim_end().to_string()));
    }
    Ok(out)
}
