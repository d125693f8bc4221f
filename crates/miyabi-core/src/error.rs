use thiserror::Error;

/// Failures a store operation can report to its caller.
///
/// Validation failures are rejected before any mutation. Unknown ids point at
/// a caller/UI desync: the operation is aborted and state left unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no task with id {0}")]
    NotFound(u64),
}

impl StoreError {
    pub fn empty_text() -> Self {
        Self::Validation("task text must not be empty".to_string())
    }
}
