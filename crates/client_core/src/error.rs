use thiserror::Error;

/// Outcome of a failed remote operation, already reduced to the text shown next to the slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),
    /// The server answered with an error status; `message` is its `error` text or a fallback.
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("{0}")]
    BadResponse(String),
    /// A success status without the expected result.
    #[error("{0}")]
    Empty(String),
}

impl ServiceError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("No menu image selected.")]
    MissingFile,
    #[error("The extraction was superseded by a newer upload.")]
    Superseded,
    #[error(transparent)]
    Service(#[from] ServiceError),
}
