/// Error types for document comparison.
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for comparison operations.
pub type Result<T> = std::result::Result<T, CompareError>;

/// Which document of a comparison an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentRole {
    /// The original ("before") document
    Source,
    /// The revised ("after") document
    Target,
    /// The result document being written
    Output,
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentRole::Source => f.write_str("source"),
            DocumentRole::Target => f.write_str("target"),
            DocumentRole::Output => f.write_str("output"),
        }
    }
}

/// Why a password-related failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordIssue {
    /// The package is encrypted and no password was supplied
    Missing,
    /// The supplied password does not unlock the package
    Incorrect,
    /// Encryption was requested or found but cannot be handled
    /// (unknown scheme, or encryption support compiled out)
    Unsupported,
}

impl fmt::Display for PasswordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordIssue::Missing => f.write_str("password required"),
            PasswordIssue::Incorrect => f.write_str("incorrect password"),
            PasswordIssue::Unsupported => f.write_str("encryption unsupported"),
        }
    }
}

/// Error types for document comparison.
///
/// Password problems are always reported as [`CompareError::Password`] and
/// never as [`CompareError::Format`], so callers can prompt for a new
/// password instead of reporting a corrupt file.
#[derive(Error, Debug)]
pub enum CompareError {
    /// Source or target file does not exist
    #[error("{role} document not found: {}", path.display())]
    InputNotFound { role: DocumentRole, path: PathBuf },

    /// Corrupt, unparseable or unsupported container
    #[error("Invalid format: {0}")]
    Format(String),

    /// Missing or incorrect password, or unavailable encryption provider
    #[error("Password error ({reason}): {context}")]
    Password {
        reason: PasswordIssue,
        context: String,
    },

    /// Read or write failure unrelated to the document format
    #[error("IO error{}: {source}", path.as_ref().map(|p| format!(" on {}", p.display())).unwrap_or_default())]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// Invalid style or option values
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The caller's cancellation token fired or its deadline passed
    #[error("Comparison cancelled")]
    Cancelled,
}

impl CompareError {
    pub(crate) fn password(reason: PasswordIssue, context: impl Into<String>) -> Self {
        CompareError::Password {
            reason,
            context: context.into(),
        }
    }

    pub(crate) fn io_at(path: &Path, source: std::io::Error) -> Self {
        CompareError::Io {
            path: Some(path.to_path_buf()),
            source,
        }
    }

    /// Whether this error is a password problem.
    #[inline]
    pub fn is_password_error(&self) -> bool {
        matches!(self, CompareError::Password { .. })
    }

    /// Whether this error is a format/corruption problem.
    #[inline]
    pub fn is_format_error(&self) -> bool {
        matches!(self, CompareError::Format(_))
    }

    /// Attach the document role and path to this error.
    ///
    /// Format and password messages get a `"<role> document <path>: "`
    /// prefix; IO errors get the path if they have none yet.
    pub fn in_document(self, role: DocumentRole, path: &Path) -> Self {
        match self {
            CompareError::Format(msg) => {
                CompareError::Format(format!("{role} document {}: {msg}", path.display()))
            },
            CompareError::Password { reason, context } => CompareError::Password {
                reason,
                context: format!("{role} document {}: {context}", path.display()),
            },
            CompareError::Io { path: None, source } => CompareError::Io {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for CompareError {
    fn from(err: std::io::Error) -> Self {
        CompareError::Io {
            path: None,
            source: err,
        }
    }
}

impl From<quick_xml::Error> for CompareError {
    fn from(err: quick_xml::Error) -> Self {
        CompareError::Format(format!("XML error: {err}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for CompareError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        CompareError::Format(format!("XML attribute error: {err}"))
    }
}

impl From<zip::result::ZipError> for CompareError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(source) => CompareError::Io { path: None, source },
            other => CompareError::Format(format!("ZIP error: {other}")),
        }
    }
}

impl From<crate::ole::OleError> for CompareError {
    fn from(err: crate::ole::OleError) -> Self {
        match err {
            crate::ole::OleError::Io(source) => CompareError::Io { path: None, source },
            other => CompareError::Format(format!("compound file error: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_document_prefixes_context() {
        let err = CompareError::Format("bad zip".to_string())
            .in_document(DocumentRole::Source, Path::new("a.docx"));
        assert_eq!(
            err.to_string(),
            "Invalid format: source document a.docx: bad zip"
        );

        let err = CompareError::password(PasswordIssue::Incorrect, "verifier mismatch")
            .in_document(DocumentRole::Target, Path::new("b.docx"));
        assert!(err.is_password_error());
        assert!(err.to_string().contains("target document b.docx"));
        assert!(err.to_string().contains("incorrect password"));
    }

    #[test]
    fn test_io_error_gets_path_once() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CompareError::from(io).in_document(DocumentRole::Output, Path::new("out.docx"));
        match &err {
            CompareError::Io { path, .. } => {
                assert_eq!(path.as_deref(), Some(Path::new("out.docx")))
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("out.docx"));
    }
}
