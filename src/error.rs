use thiserror::Error;

/// Errors raised by the document core and the document service.
///
/// Path and envelope failures are local and never touch the document. Store
/// failures are carried through unchanged so callers can inspect the root
/// cause (for example a [`crate::store::DuplicateEntry`]).
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The path, or the entity owning the document, does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value handed to the engine violates the object model.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    /// The document itself lacks the structure the operation implies.
    #[error("invalid object model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl DocumentError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_entity(what: impl Into<String>) -> Self {
        Self::InvalidEntity(what.into())
    }

    pub fn invalid_model(what: impl Into<String>) -> Self {
        Self::InvalidModel(what.into())
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
