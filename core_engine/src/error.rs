use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankerError {
    /// Rejected before the store was contacted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl RankerError {
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, RankerError::InvalidArgument(_))
    }
}
