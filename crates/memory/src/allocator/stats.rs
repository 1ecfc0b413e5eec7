//! Allocator statistics tracking
//!
//! Counters are plain integers: allocators take `&mut self`, so there is
//! nothing to synchronize.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Statistics for memory allocators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AllocatorStats {
    /// Bytes currently handed out (requested sizes, not counting headers)
    pub allocated_bytes: usize,
    /// Peak of `allocated_bytes`
    pub peak_allocated_bytes: usize,
    /// Total number of successful allocations
    pub allocation_count: usize,
    /// Total number of deallocations
    pub deallocation_count: usize,
    /// Number of failed allocations
    pub failed_allocations: usize,
    /// Number of resets
    pub reset_count: usize,
    /// Total bytes ever allocated (cumulative)
    pub total_bytes_allocated: usize,
}

impl AllocatorStats {
    /// Creates a new empty stats object
    pub const fn new() -> Self {
        Self {
            allocated_bytes: 0,
            peak_allocated_bytes: 0,
            allocation_count: 0,
            deallocation_count: 0,
            failed_allocations: 0,
            reset_count: 0,
            total_bytes_allocated: 0,
        }
    }

    /// Calculate the average allocation size
    pub fn average_allocation_size(&self) -> Option<f64> {
        (self.allocation_count > 0)
            .then(|| self.total_bytes_allocated as f64 / self.allocation_count as f64)
    }

    /// Fraction of attempts that succeeded (0.0 to 1.0)
    pub fn allocation_efficiency(&self) -> f64 {
        let total_attempts = self.allocation_count + self.failed_allocations;
        if total_attempts > 0 {
            self.allocation_count as f64 / total_attempts as f64
        } else {
            1.0
        }
    }

    /// Allocations not yet matched by a deallocation or reset
    pub fn live_allocations(&self) -> usize {
        self.allocation_count.saturating_sub(self.deallocation_count)
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocator Statistics:")?;
        writeln!(f, "  Current allocated: {} bytes", self.allocated_bytes)?;
        writeln!(f, "  Peak allocated: {} bytes", self.peak_allocated_bytes)?;
        writeln!(f, "  Allocations: {}", self.allocation_count)?;
        writeln!(f, "  Deallocations: {}", self.deallocation_count)?;
        writeln!(f, "  Failed allocations: {}", self.failed_allocations)?;
        writeln!(f, "  Resets: {}", self.reset_count)?;

        if let Some(avg) = self.average_allocation_size() {
            writeln!(f, "  Average allocation size: {avg:.2} bytes")?;
        }

        writeln!(
            f,
            "  Allocation efficiency: {:.2}%",
            self.allocation_efficiency() * 100.0
        )
    }
}

/// Trait for allocators that expose statistics
pub trait StatisticsProvider {
    /// Get current statistics
    fn statistics(&self) -> AllocatorStats;

    /// Reset statistics
    fn reset_statistics(&mut self);

    /// Check if statistics collection is enabled
    fn statistics_enabled(&self) -> bool {
        true
    }
}

/// Optional statistics shared by every allocator in this crate
#[derive(Debug, Clone, Default)]
pub(crate) struct StatsTracker {
    enabled: bool,
    stats: AllocatorStats,
}

impl StatsTracker {
    pub(crate) const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stats: AllocatorStats::new(),
        }
    }

    #[inline]
    pub(crate) fn record_alloc(&mut self, size: usize) {
        if !self.enabled {
            return;
        }
        let stats = &mut self.stats;
        stats.allocation_count += 1;
        stats.allocated_bytes += size;
        stats.total_bytes_allocated += size;
        stats.peak_allocated_bytes = stats.peak_allocated_bytes.max(stats.allocated_bytes);
    }

    #[inline]
    pub(crate) fn record_dealloc(&mut self, size: usize) {
        if !self.enabled {
            return;
        }
        self.stats.deallocation_count += 1;
        self.stats.allocated_bytes = self.stats.allocated_bytes.saturating_sub(size);
    }

    #[inline]
    pub(crate) fn record_failure(&mut self) {
        if self.enabled {
            self.stats.failed_allocations += 1;
        }
    }

    /// A reset releases everything at once without individual deallocations.
    #[inline]
    pub(crate) fn record_reset(&mut self) {
        if self.enabled {
            self.stats.reset_count += 1;
            self.stats.allocated_bytes = 0;
        }
    }

    pub(crate) fn snapshot(&self) -> AllocatorStats {
        self.stats
    }

    pub(crate) fn clear(&mut self) {
        self.stats = AllocatorStats::new();
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tracker_counts_and_peak() {
        let mut tracker = StatsTracker::new(true);
        tracker.record_alloc(100);
        tracker.record_alloc(50);
        tracker.record_dealloc(50);
        tracker.record_failure();

        assert_eq!(
            tracker.snapshot(),
            AllocatorStats {
                allocated_bytes: 100,
                peak_allocated_bytes: 150,
                allocation_count: 2,
                deallocation_count: 1,
                failed_allocations: 1,
                reset_count: 0,
                total_bytes_allocated: 150,
            }
        );

        tracker.record_reset();
        let stats = tracker.snapshot();
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.peak_allocated_bytes, 150);
        assert_eq!(stats.reset_count, 1);
    }

    #[test]
    fn test_disabled_tracker_records_nothing() {
        let mut tracker = StatsTracker::new(false);
        tracker.record_alloc(10);
        tracker.record_failure();
        assert_eq!(tracker.snapshot(), AllocatorStats::new());
        assert!(!tracker.is_enabled());
    }

    #[test]
    fn test_derived_metrics() {
        let stats = AllocatorStats {
            allocation_count: 3,
            failed_allocations: 1,
            total_bytes_allocated: 300,
            ..AllocatorStats::new()
        };
        assert_eq!(stats.average_allocation_size(), Some(100.0));
        assert_eq!(stats.allocation_efficiency(), 0.75);
        assert_eq!(AllocatorStats::new().average_allocation_size(), None);
        assert!(stats.to_string().contains("Allocations: 3"));
    }
}
