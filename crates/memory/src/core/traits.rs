//! Core traits shared by every allocator

/// Memory usage tracking trait
///
/// Implemented by allocators that know how much of their capacity is in use.
pub trait MemoryUsage {
    /// Get currently used memory in bytes, including headers and padding
    fn used_memory(&self) -> usize;

    /// Get available memory in bytes (if known)
    fn available_memory(&self) -> Option<usize>;

    /// Get total memory capacity in bytes (if known)
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    ///
    /// Returns `None` if total memory is unknown.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        used: usize,
        available: Option<usize>,
    }

    impl MemoryUsage for Fixed {
        fn used_memory(&self) -> usize {
            self.used
        }

        fn available_memory(&self) -> Option<usize> {
            self.available
        }
    }

    #[test]
    fn test_defaults_derive_from_used_and_available() {
        let usage = Fixed {
            used: 25,
            available: Some(75),
        };
        assert_eq!(usage.total_memory(), Some(100));
        assert_eq!(usage.memory_usage_percent(), Some(25.0));

        let unknown = Fixed {
            used: 25,
            available: None,
        };
        assert_eq!(unknown.total_memory(), None);
        assert_eq!(unknown.memory_usage_percent(), None);
    }
}
