//! Error types for virtual memory operations

use std::io;

use thiserror::Error;

/// Error returned by the virtual memory provider
#[derive(Error, Debug)]
pub enum SystemError {
    /// The OS refused to reserve address space
    #[error("failed to reserve {size} bytes of address space: {source}")]
    Reserve {
        /// Requested reservation size in bytes
        size: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The OS refused to back a reserved range with physical memory
    #[error("failed to commit {size} bytes at {addr:#x}: {source}")]
    Commit {
        /// Start of the range
        addr: usize,
        /// Length of the range in bytes
        size: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The OS refused to drop the physical backing of a range
    #[error("failed to decommit {size} bytes at {addr:#x}: {source}")]
    Decommit {
        /// Start of the range
        addr: usize,
        /// Length of the range in bytes
        size: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The OS refused to release a reservation
    #[error("failed to release address space at {addr:#x}: {source}")]
    Release {
        /// Base of the reservation
        addr: usize,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for virtual memory operations
pub type SystemResult<T> = Result<T, SystemError>;

impl SystemError {
    /// Returns the OS error code if the failure came from a syscall
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Reserve { source, .. }
            | Self::Commit { source, .. }
            | Self::Decommit { source, .. }
            | Self::Release { source, .. } => source.raw_os_error(),
            Self::InvalidInput(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_error_display() {
        let err = SystemError::Reserve {
            size: 4096,
            source: io::Error::from_raw_os_error(12),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to reserve 4096 bytes"));
        assert_eq!(err.raw_os_error(), Some(12));
    }

    #[test]
    fn test_invalid_input_has_no_os_code() {
        let err = SystemError::InvalidInput("zero-sized reservation".into());
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(err.to_string(), "invalid input: zero-sized reservation");
    }
}
