//! Domain error taxonomy.
//!
//! Orchestration code propagates [`anyhow::Error`] the same way the rest of
//! the crate does, but every failure a user can act on is rooted in a
//! [`QaError`] so the session surface can `downcast_ref` and decide whether
//! the session continues.

use std::path::PathBuf;

use thiserror::Error;

/// Which external service a [`QaError::ServiceFailure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Chat,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Embedding => write!(f, "embedding"),
            Service::Chat => write!(f, "chat"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QaError {
    /// No API key was supplied. Nothing else runs until one is.
    #[error("an API key is required before documents can be uploaded")]
    MissingCredential,

    /// A PDF could not be read or extracted.
    #[error("could not extract text from {file}: {reason}")]
    ExtractionFailure { file: String, reason: String },

    /// The embedding or chat service rejected or failed a request.
    #[error("{service} service request failed: {message}")]
    ServiceFailure { service: Service, message: String },

    /// The history store could neither be opened nor recreated.
    #[error("history store at {} is unavailable: {reason}", path.display())]
    StorageOpenFailure { path: PathBuf, reason: String },

    /// A temporary file could not be removed. Logged, never returned to the user.
    #[error("failed to remove temporary file {}: {reason}", path.display())]
    CleanupFailure { path: PathBuf, reason: String },

    /// A question was asked before any document was indexed.
    #[error("no documents have been indexed yet; upload a PDF first")]
    NoDocuments,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl QaError {
    pub fn extraction(file: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        QaError::ExtractionFailure {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    pub fn service(service: Service, message: impl std::fmt::Display) -> Self {
        QaError::ServiceFailure {
            service,
            message: message.to_string(),
        }
    }

    /// Whether the interactive session can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            QaError::MissingCredential | QaError::StorageOpenFailure { .. } | QaError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failure_names_the_service() {
        let err = QaError::service(Service::Chat, "HTTP 401: invalid api key");
        assert_eq!(
            err.to_string(),
            "chat service request failed: HTTP 401: invalid api key"
        );
    }

    #[test]
    fn gate_and_storage_errors_end_the_session() {
        assert!(!QaError::MissingCredential.is_recoverable());
        assert!(!QaError::StorageOpenFailure {
            path: PathBuf::from("h.sqlite"),
            reason: "locked".into()
        }
        .is_recoverable());
        assert!(QaError::NoDocuments.is_recoverable());
        assert!(QaError::extraction("a.pdf", "bad xref").is_recoverable());
    }
}
