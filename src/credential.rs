//! API key gate.
//!
//! A [`Credential`] can only be built from a non-blank string, so holding
//! one is proof that the gate was passed. The secret never appears in
//! `Debug` or `Display` output, which keeps it out of logs.

use std::fmt;

use crate::error::QaError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Accept a key typed by the user. Surrounding whitespace is dropped.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, QaError> {
        let key = raw.as_ref().trim();
        if key.is_empty() {
            return Err(QaError::MissingCredential);
        }
        Ok(Self(key.to_string()))
    }

    /// `Authorization` header value. The only way the secret leaves this type.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}
