use incoming_transfer::TransferError;

/// Errors returned by [`UploaderHandle`](crate::UploaderHandle) and the
/// uploader constructors.
#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    #[error("uploader stopped")]
    Closed,

    #[error("cannot open upload source: {0}")]
    Source(#[from] TransferError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(UploaderError::Closed.to_string(), "uploader stopped");
        let err = UploaderError::from(TransferError::Io(std::io::Error::other("gone")));
        assert!(err.to_string().starts_with("cannot open upload source"));
    }
}
