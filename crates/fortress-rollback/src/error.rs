//! Rollback error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not tracking player {0}")]
    NotTracking(String),
}
