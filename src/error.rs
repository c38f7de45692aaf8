//! Error type shared by `BucketTable` and `OrderedList`.
//!
//! Lookups and scans never fail; absence is reported with `None`. Errors
//! only come from the validating constructor and from `check_invariants`.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// Bucket selection masks with `bucket_count - 1`, which only covers
    /// every bucket when the count is a power of two.
    #[error("bucket count must be a non-zero power of two (got {bucket_count})")]
    BucketCountNotPowerOfTwo { bucket_count: usize },

    /// A structural invariant did not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl TableError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        TableError::Invariant(msg.into())
    }
}
