//! Element count and byte volume arithmetic shared by the counters.

/// Returns the number of bytes occupied by `count` elements of `element_size` bytes each.
///
/// Saturates instead of overflowing. A reservation that large can never succeed, so the only
/// way to get here with such a count is a mismatched release, whose statistics are already
/// meaningless.
#[must_use]
#[inline]
pub(crate) fn bytes_for(count: usize, element_size: usize) -> u64 {
    widen(count).saturating_mul(widen(element_size))
}

/// Converts a count to the signed domain used by the live gauges, saturating at `i64::MAX`.
#[must_use]
#[inline]
pub(crate) fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[must_use]
#[inline]
pub(crate) fn widen(value: usize) -> u64 {
    value.try_into().expect("usize always fits into u64")
}

/// The largest element count whose byte size still fits in `isize`, as required by [`Layout`].
///
/// [`Layout`]: std::alloc::Layout
#[must_use]
#[inline]
pub(crate) fn max_elements(element_size: usize) -> usize {
    isize::MAX
        .unsigned_abs()
        .checked_div(element_size)
        .unwrap_or(usize::MAX)
}
