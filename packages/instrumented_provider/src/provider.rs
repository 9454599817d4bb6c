//! The memory provider contract that decorators forward to.

use std::ptr::NonNull;

use crate::Result;
use crate::volume::max_elements;

/// A source of raw storage for values of type `T`, which can also construct and destroy
/// values in that storage.
///
/// Providers are cheap handles: cloning one yields another handle to the same underlying
/// memory source. Two providers that compare equal (via [`PartialEq`], where implemented) can
/// release each other's reservations, and this must remain true across [`Rebind`].
///
/// A single type may implement `Provider<T>` for many element types, as [`System`] does. In a
/// concrete (non-generic) context this means calls may need the element type spelled out,
/// e.g. `Provider::<u64>::max_size(&System)`.
///
/// [`System`]: crate::System
pub trait Provider<T>: Clone {
    /// Reserves uninitialized storage for `count` consecutive values of type `T`.
    ///
    /// The returned pointer is suitably aligned for `T`. Nothing is constructed.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot satisfy the reservation.
    fn reserve(&self, count: usize) -> Result<NonNull<T>>;

    /// Reserves storage like [`reserve()`](Self::reserve), passing a locality hint that the
    /// provider may use or ignore. The default implementation ignores it.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot satisfy the reservation.
    fn reserve_with_hint(&self, count: usize, hint: NonNull<u8>) -> Result<NonNull<T>> {
        _ = hint;
        self.reserve(count)
    }

    /// Releases storage for `count` values starting at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by a reservation of exactly `count` elements from this
    /// provider or one equal to it, and must not have been released already.
    unsafe fn release(&self, ptr: NonNull<T>, count: usize);

    /// The largest element count that can meaningfully be passed to [`reserve()`](Self::reserve).
    ///
    /// A reservation of this size is not guaranteed to succeed.
    fn max_size(&self) -> usize {
        max_elements(size_of::<T>())
    }

    /// Moves `value` into the storage at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes and suitably aligned for `C`. Any value already at `ptr`
    /// is overwritten without being dropped.
    unsafe fn construct<C>(&self, ptr: NonNull<C>, value: C) {
        // SAFETY: Forwarding the caller's guarantee that `ptr` is valid for writes.
        unsafe {
            ptr.write(value);
        }
    }

    /// Drops the value at `ptr` in place, leaving the storage reserved.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a valid, initialized `C` that is not used again afterwards.
    unsafe fn destroy<C>(&self, ptr: NonNull<C>) {
        // SAFETY: Forwarding the caller's guarantee that `ptr` holds a live value.
        unsafe {
            ptr.drop_in_place();
        }
    }

    /// Returns the provider that a container should use when it is copied.
    ///
    /// The default is a clone of this provider.
    #[must_use]
    fn provider_for_copy(&self) -> Self {
        self.clone()
    }
}

/// Produces an equivalent provider that reserves storage for a different element type `U`.
///
/// Containers need this to allocate their internal node types through the provider they were
/// given. The rebound provider must compare equal to its source (where the types support
/// comparison) and must be able to release storage reserved by any provider equal to it.
pub trait Rebind<U> {
    /// The provider type that reserves values of type `U`.
    type Rebound: Provider<U>;

    /// Returns a provider for `U` that draws from the same memory source as `self`.
    #[must_use]
    fn rebind(&self) -> Self::Rebound;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::System;

    /// Uses only the required methods and inherits every default.
    #[derive(Clone, Debug, Default)]
    struct Minimal {
        reservations: Rc<Cell<usize>>,
    }

    impl Provider<u64> for Minimal {
        fn reserve(&self, count: usize) -> Result<NonNull<u64>> {
            self.reservations.set(self.reservations.get().wrapping_add(1));
            Provider::<u64>::reserve(&System, count)
        }

        unsafe fn release(&self, ptr: NonNull<u64>, count: usize) {
            // SAFETY: Forwarding the caller's guarantee; all reservations came from System.
            unsafe {
                Provider::<u64>::release(&System, ptr, count);
            }
        }
    }

    #[test]
    fn hinted_reserve_defaults_to_plain_reserve() {
        let provider = Minimal::default();
        let first = provider.reserve(2).unwrap();

        let second = provider.reserve_with_hint(2, first.cast()).unwrap();
        assert_eq!(provider.reservations.get(), 2);

        // SAFETY: Reserved above with the same count and released once.
        unsafe {
            provider.release(first, 2);
        }

        // SAFETY: Reserved above with the same count and released once.
        unsafe {
            provider.release(second, 2);
        }
    }

    #[test]
    fn max_size_defaults_to_layout_limit() {
        assert_eq!(
            Minimal::default().max_size(),
            isize::MAX.unsigned_abs() / size_of::<u64>()
        );
    }

    #[test]
    fn construct_and_destroy_default_to_write_and_drop() {
        struct CountsDrops(Rc<Cell<u32>>);

        impl Drop for CountsDrops {
            fn drop(&mut self) {
                self.0.set(self.0.get().wrapping_add(1));
            }
        }

        let provider = Minimal::default();
        let ptr = provider.reserve(1).unwrap();

        let drops = Rc::new(Cell::new(0_u32));

        let slot = ptr.cast::<CountsDrops>();
        // SAFETY: u64 storage is large and aligned enough for an Rc pointer wrapper.
        unsafe {
            provider.construct(slot, CountsDrops(Rc::clone(&drops)));
        }
        assert_eq!(drops.get(), 0);

        // SAFETY: We constructed a value there just above.
        unsafe {
            provider.destroy(slot);
        }
        assert_eq!(drops.get(), 1);

        // SAFETY: Reserved above with the same count.
        unsafe {
            provider.release(ptr, 1);
        }
    }

    #[test]
    fn provider_for_copy_defaults_to_clone() {
        let provider = Minimal::default();
        let copy = provider.provider_for_copy();

        assert!(Rc::ptr_eq(&provider.reservations, &copy.reservations));
    }
}
