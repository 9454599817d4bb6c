use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::{Error, Provider, Rebind, Result};

/// A [`Provider`] for any element type, backed by the global allocator.
///
/// Reservations of zero bytes (zero elements, or zero-sized elements) do not touch the global
/// allocator and return a dangling, well-aligned pointer. The locality hint is ignored.
///
/// All `System` values are interchangeable and compare equal.
///
/// # Examples
///
/// ```
/// use instrumented_provider::{Provider, System};
///
/// let ptr = Provider::<u64>::reserve(&System, 4)?;
///
/// // SAFETY: Reserved above for exactly 4 elements and released exactly once.
/// unsafe { System.release(ptr, 4) };
/// # Ok::<(), instrumented_provider::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct System;

impl<T> Provider<T> for System {
    fn reserve(&self, count: usize) -> Result<NonNull<T>> {
        let layout = array_layout::<T>(count)?;

        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        // SAFETY: The layout has a non-zero size, which is the only requirement of `alloc`.
        let ptr = unsafe { alloc::alloc(layout) };

        NonNull::new(ptr.cast::<T>()).ok_or(Error::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn release(&self, ptr: NonNull<T>, count: usize) {
        let layout = array_layout::<T>(count)
            .expect("the caller guarantees that `count` was accepted by a previous reservation");

        if layout.size() == 0 {
            return;
        }

        // SAFETY: The caller guarantees that `ptr` came from a reservation of `count` elements,
        // which we made via `alloc` with this very layout.
        unsafe {
            alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl<U> Rebind<U> for System {
    type Rebound = Self;

    #[inline]
    fn rebind(&self) -> Self {
        *self
    }
}

#[expect(
    clippy::map_err_ignore,
    reason = "LayoutError carries nothing beyond the inputs we already report"
)]
fn array_layout<T>(count: usize) -> Result<Layout> {
    Layout::array::<T>(count).map_err(|_| Error::CapacityOverflow {
        count,
        element_size: size_of::<T>(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(System: Send, Sync, Copy, Eq);

    #[test]
    fn reserve_returns_aligned_writable_storage() {
        let ptr = Provider::<u64>::reserve(&System, 3).unwrap();
        assert!(ptr.is_aligned());

        for index in 0..3 {
            // SAFETY: Reserved for 3 u64 above and we stay in bounds.
            let slot = unsafe { ptr.add(index) };

            // SAFETY: The slot is in bounds of the reservation and suitably aligned.
            unsafe {
                slot.write(u64::try_from(index).unwrap());
            }
        }

        // SAFETY: All three values were written above.
        let last = unsafe { ptr.add(2).read() };
        assert_eq!(last, 2);

        // SAFETY: Reserved above with the same count and released once.
        unsafe {
            System.release(ptr, 3);
        }
    }

    #[test]
    fn zero_sized_reservations_are_dangling() {
        let empty = Provider::<u64>::reserve(&System, 0).unwrap();
        assert_eq!(empty, NonNull::dangling());

        let units = Provider::<()>::reserve(&System, 1000).unwrap();
        assert_eq!(units, NonNull::dangling());

        // SAFETY: Matching the reservation above; zero-byte releases are no-ops.
        unsafe {
            System.release(empty, 0);
        }

        // SAFETY: Matching the reservation above; zero-byte releases are no-ops.
        unsafe {
            System.release(units, 1000);
        }
    }

    #[test]
    fn overflowing_count_is_capacity_overflow() {
        let result = Provider::<u64>::reserve(&System, usize::MAX);

        assert_eq!(
            result,
            Err(Error::CapacityOverflow {
                count: usize::MAX,
                element_size: 8,
            })
        );
    }

    #[test]
    fn max_size_depends_on_element_size() {
        assert_eq!(
            Provider::<u8>::max_size(&System),
            isize::MAX.unsigned_abs()
        );
        assert_eq!(
            Provider::<u32>::max_size(&System),
            isize::MAX.unsigned_abs() / 4
        );
        assert_eq!(Provider::<()>::max_size(&System), usize::MAX);
    }

    #[test]
    fn rebind_is_identity() {
        let rebound: System = <System as Rebind<String>>::rebind(&System);
        assert_eq!(rebound, System);
    }
}
