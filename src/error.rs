//! Error types.

/// Failure of [`Bucket::copy_to`](crate::Bucket::copy_to).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CopyError {
    /// The offset lies past the end of the destination.
    #[error("offset {offset} is out of range for a destination of length {len}")]
    OffsetOutOfRange { offset: usize, len: usize },
    /// The destination cannot hold the bucket's current contents.
    #[error("destination has room for {available} values but the bucket holds {needed}")]
    InsufficientSpace { needed: usize, available: usize },
}
