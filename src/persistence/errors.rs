use thiserror::Error;

/// Errors raised while reading or writing the state file
///
/// On load these are recovered from (the store starts empty); on write they
/// propagate so the caller can report "could not save" instead of pretending the
/// change went through.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("State file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PersistenceError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only file system",
        ));
        assert_eq!(err.to_string(), "State file I/O error: read-only file system");
    }
}
