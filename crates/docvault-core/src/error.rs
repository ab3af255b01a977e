//! Error taxonomy shared by every docvault operation.
//!
//! Nothing in docvault retries. Each variant carries the identifier, digest,
//! or path that failed so the caller can report it without extra lookups.
//! A negative lookup result is never an error: it shows up as `None` or as
//! an empty list. [`Error::NotFound`] is only raised by operations that
//! require the object to exist, such as the document reader.

use std::path::PathBuf;

/// Convenience alias used throughout `docvault-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier does not follow either identifier syntax. Retrying
    /// the same identifier will fail again.
    #[error("malformed identifier `{id}`: {reason}")]
    MalformedIdentifier { id: String, reason: String },

    #[error("cannot find `{0}`")]
    NotFound(String),

    /// Content could not be read completely while hashing. The digest is
    /// not computed in that case, so a short read cannot produce a wrong
    /// digest.
    #[error("cannot read {context}: {source}")]
    Read {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a document out failed. `context` names the destination.
    #[error("cannot write {context}: {source}")]
    Write {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index backing store could not be reached or refused the operation.
    #[error("index storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("remote fetch failed: {0}")]
    Remote(String),
}

impl Error {
    pub fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for a normal negative result rather than a hard failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = Error::malformed("/misc", "missing basename");
        assert_eq!(
            err.to_string(),
            "malformed identifier `/misc`: missing basename"
        );

        let err = Error::NotFound("/uakaga/104722/1.pdf".to_string());
        assert_eq!(err.to_string(), "cannot find `/uakaga/104722/1.pdf`");
        assert!(err.is_not_found());

        let err = Error::io(
            "/library/database/docman/misc",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/library/database/docman/misc"));
        assert!(!err.is_not_found());
    }
}
