use std::fmt;

/// The counters of a [`CountingDelegate`] captured at one instant.
///
/// Obtained via [`CountingDelegate::snapshot()`]. Being a plain value, a snapshot can be kept
/// after the copy group that produced it has been dissolved, and two snapshots can be compared
/// to see what happened in between.
///
/// # Examples
///
/// ```
/// use instrumented_provider::{InstrumentedProvider, Provider};
///
/// let provider = InstrumentedProvider::<u8>::default();
/// let before = provider.snapshot();
///
/// let ptr = provider.reserve(100)?;
/// // SAFETY: Reserved above with the same count and released once.
/// unsafe { provider.release(ptr, 100) };
///
/// let after = provider.snapshot();
/// assert_eq!(after.allocate_calls - before.allocate_calls, 1);
/// assert_eq!(after.memory_max, 100);
///
/// println!("{after}");
/// # Ok::<(), instrumented_provider::Error>(())
/// ```
///
/// [`CountingDelegate`]: crate::CountingDelegate
/// [`CountingDelegate::snapshot()`]: crate::CountingDelegate::snapshot
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct Statistics {
    /// Number of successful reservations.
    pub allocate_calls: u64,
    /// Number of releases.
    pub deallocate_calls: u64,
    /// Number of values constructed.
    pub construct_calls: u64,
    /// Number of values destroyed.
    pub destroy_calls: u64,
    /// Number of maximum size queries.
    pub max_size_calls: u64,
    /// Number of requests for a provider for a copied container.
    pub provider_for_copy_calls: u64,

    /// Total objects ever reserved.
    pub objects_total: u64,
    /// Live reserved objects.
    pub objects_now: i64,
    /// Highest number of live reserved objects.
    pub objects_max: i64,
    /// Lowest number of live reserved objects.
    pub objects_min: i64,
    /// Total objects ever released.
    pub deallocated_objects_total: u64,

    /// Total bytes ever reserved.
    pub memory_total: u64,
    /// Live reserved bytes.
    pub memory_now: i64,
    /// Highest number of live reserved bytes.
    pub memory_max: i64,
    /// Lowest number of live reserved bytes.
    pub memory_min: i64,
    /// Total bytes ever released.
    pub deallocated_memory_total: u64,

    /// Total values ever constructed.
    pub constructed_total: u64,
    /// Live constructed values.
    pub constructed_now: i64,
    /// Highest number of live constructed values.
    pub constructed_max: i64,
    /// Lowest number of live constructed values.
    pub constructed_min: i64,
}

impl Statistics {
    /// Prints the statistics to stdout, one counter per line.
    // Too difficult to test stdout output reliably - manually tested.
    #[cfg_attr(test, mutants::skip)]
    pub fn print_to_stdout(&self) {
        print!("{self}");
    }

    fn rows(&self) -> [(&'static str, i128); 20] {
        [
            ("allocate calls", self.allocate_calls.into()),
            ("deallocate calls", self.deallocate_calls.into()),
            ("construct calls", self.construct_calls.into()),
            ("destroy calls", self.destroy_calls.into()),
            ("max size calls", self.max_size_calls.into()),
            ("provider for copy calls", self.provider_for_copy_calls.into()),
            ("objects total", self.objects_total.into()),
            ("objects now", self.objects_now.into()),
            ("objects max", self.objects_max.into()),
            ("objects min", self.objects_min.into()),
            ("objects released", self.deallocated_objects_total.into()),
            ("memory total", self.memory_total.into()),
            ("memory now", self.memory_now.into()),
            ("memory max", self.memory_max.into()),
            ("memory min", self.memory_min.into()),
            ("memory released", self.deallocated_memory_total.into()),
            ("constructed total", self.constructed_total.into()),
            ("constructed now", self.constructed_now.into()),
            ("constructed max", self.constructed_max.into()),
            ("constructed min", self.constructed_min.into()),
        ]
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.rows() {
            writeln!(f, "{name:<24} {value:>20}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn display_has_one_line_per_counter() {
        let statistics = Statistics {
            memory_min: -16,
            objects_max: 5,
            ..Statistics::default()
        };

        let text = statistics.to_string();
        assert_eq!(text.lines().count(), 20);

        let memory_min = text
            .lines()
            .find(|line| line.starts_with("memory min"))
            .unwrap();
        assert!(memory_min.ends_with(" -16"));

        let objects_max = text
            .lines()
            .find(|line| line.starts_with("objects max"))
            .unwrap();
        assert!(objects_max.ends_with(" 5"));
    }
}
