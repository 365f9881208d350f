use thiserror::Error;

/// Mutation failures that preserve prior state and surface a user-visible
/// warning. Load and persist failures are deliberately absent: the manager
/// logs and swallows those, keeping the in-memory copy authoritative.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("item too large: {size} bytes exceeds the {limit} byte per-item ceiling")]
    ItemTooLarge { size: usize, limit: usize },

    #[error("storage quota exceeded: list would be {size} bytes, ceiling is {limit}")]
    StorageQuotaExceeded { size: usize, limit: usize },

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}
