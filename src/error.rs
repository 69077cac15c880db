use thiserror::Error;

use crate::provider::ProviderError;

/// Everything an arena operation can report. Every variant is returned to
/// the immediate caller as a `Result`; none of them aborts the process, and
/// a failed operation never leaves a partial mutation behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The provider could not supply the arena page.
    #[error("arena initialization failed: {0}")]
    Initialization(#[source] ProviderError),

    /// `initialize` was called on a live arena. Tear it down first, or use
    /// `reset` when discarding the current contents is intended.
    #[error("arena is already initialized")]
    AlreadyInitialized,

    /// The provider refused to take the arena page back. The page handle is
    /// forfeited and the arena returns to the uninitialized state.
    #[error("arena teardown failed: {0}")]
    Teardown(#[source] ProviderError),

    /// Requested size is zero or not a multiple of the 8-byte granularity.
    #[error("invalid allocation size {0}: must be a positive multiple of 8")]
    InvalidSize(usize),

    /// No free block is large enough for the request.
    #[error("no free block can fit {0} bytes")]
    NoFit(usize),

    /// The handle is out of the arena's bounds or does not name the start
    /// of any block (an interior or stale offset, for instance).
    #[error("offset {0} does not name an allocated block")]
    InvalidPointer(usize),

    /// The handle names a block that is already free.
    #[error("block at offset {0} is already free")]
    DoubleFree(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_offending_value() {
        assert_eq!(
            AllocError::InvalidSize(10).to_string(),
            "invalid allocation size 10: must be a positive multiple of 8"
        );
        assert_eq!(
            AllocError::NoFit(8192).to_string(),
            "no free block can fit 8192 bytes"
        );
        assert_eq!(
            AllocError::DoubleFree(32).to_string(),
            "block at offset 32 is already free"
        );
    }
}
