use std::cell::Cell;
use std::cmp;
use std::ptr::NonNull;

use tracing::warn;

use crate::volume::{bytes_for, signed, widen};
use crate::{Delegate, Provider, Result, Statistics};

/// Cumulative and live amounts of one kind of resource, with the extremes of the live amount.
///
/// The live amount is signed so that releasing more than was reserved shows up as a negative
/// value instead of wrapping around.
#[derive(Debug, Default)]
struct Gauge {
    added: Cell<u64>,
    removed: Cell<u64>,
    now: Cell<i64>,
    max: Cell<i64>,
    min: Cell<i64>,
}

impl Gauge {
    fn increase(&self, amount: u64) {
        // Never going to overflow u64, so no point doing slower checked arithmetic here.
        self.added.set(self.added.get().wrapping_add(amount));

        let now = self.now.get().wrapping_add(signed(amount));
        self.now.set(now);
        self.max.set(cmp::max(self.max.get(), now));
    }

    fn decrease(&self, amount: u64) {
        self.removed.set(self.removed.get().wrapping_add(amount));

        let now = self.now.get().wrapping_sub(signed(amount));
        self.now.set(now);
        self.min.set(cmp::min(self.min.get(), now));
    }
}

fn increment(counter: &Cell<u64>) {
    counter.set(counter.get().wrapping_add(1));
}

/// A [`Delegate`] that counts calls, reserved objects and memory, and constructed objects.
///
/// This is the delegate behind [`InstrumentedProvider`]. In the accessors, *live* means the
/// difference between what was reserved (or constructed) and what was released (or destroyed)
/// through the copy group. Live values are signed: if a client releases more than it reserved,
/// or destroys more than it constructed, the live value goes negative and the minimum records
/// how far, rather than the error being hidden.
///
/// Reservation and construction are counted independently, because a container may reserve
/// space for many elements while only constructing a few of them.
///
/// If the copy group is dissolved while it still has live reservations or live constructed
/// objects, a warning is logged via `tracing`.
///
/// # Examples
///
/// ```
/// use instrumented_provider::{InstrumentedProvider, Provider};
///
/// let provider = InstrumentedProvider::<u32>::default();
///
/// let ptr = provider.reserve(10)?;
/// assert_eq!(provider.objects_now(), 10);
/// assert_eq!(provider.memory_now(), 40);
///
/// // SAFETY: Reserved above with the same count and released once.
/// unsafe { provider.release(ptr, 10) };
/// assert_eq!(provider.objects_now(), 0);
/// assert_eq!(provider.objects_max(), 10);
/// # Ok::<(), instrumented_provider::Error>(())
/// ```
///
/// [`InstrumentedProvider`]: crate::InstrumentedProvider
#[derive(Debug, Default)]
pub struct CountingDelegate {
    allocate_calls: Cell<u64>,
    deallocate_calls: Cell<u64>,
    construct_calls: Cell<u64>,
    destroy_calls: Cell<u64>,
    max_size_calls: Cell<u64>,
    provider_for_copy_calls: Cell<u64>,

    objects: Gauge,
    memory: Gauge,
    constructed: Gauge,
}

impl CountingDelegate {
    fn record_reservation(&self, count: usize, element_size: usize) {
        increment(&self.allocate_calls);
        self.objects.increase(widen(count));
        self.memory.increase(bytes_for(count, element_size));
    }

    fn record_release(&self, count: usize, element_size: usize) {
        increment(&self.deallocate_calls);
        self.objects.decrease(widen(count));
        self.memory.decrease(bytes_for(count, element_size));
    }

    /// Number of reservations, with or without a hint. Failed reservations are not counted.
    #[must_use]
    pub fn allocate_calls(&self) -> u64 {
        self.allocate_calls.get()
    }

    /// Number of releases.
    #[must_use]
    pub fn deallocate_calls(&self) -> u64 {
        self.deallocate_calls.get()
    }

    /// Number of values constructed.
    #[must_use]
    pub fn construct_calls(&self) -> u64 {
        self.construct_calls.get()
    }

    /// Number of values destroyed.
    #[must_use]
    pub fn destroy_calls(&self) -> u64 {
        self.destroy_calls.get()
    }

    /// Number of times the maximum reservation size was queried.
    #[must_use]
    pub fn max_size_calls(&self) -> u64 {
        self.max_size_calls.get()
    }

    /// Number of times a provider for a copied container was requested.
    #[must_use]
    pub fn provider_for_copy_calls(&self) -> u64 {
        self.provider_for_copy_calls.get()
    }

    /// Total number of objects ever reserved, regardless of whether they were released.
    #[must_use]
    pub fn objects_total(&self) -> u64 {
        self.objects.added.get()
    }

    /// Number of live reserved objects. Negative if more were released than reserved.
    #[must_use]
    pub fn objects_now(&self) -> i64 {
        self.objects.now.get()
    }

    /// Highest number of live reserved objects seen.
    #[must_use]
    pub fn objects_max(&self) -> i64 {
        self.objects.max.get()
    }

    /// Lowest number of live reserved objects seen. Negative if, at any point, more objects had
    /// been released than reserved.
    #[must_use]
    pub fn objects_min(&self) -> i64 {
        self.objects.min.get()
    }

    /// Total number of objects ever released.
    #[must_use]
    pub fn deallocated_objects_total(&self) -> u64 {
        self.objects.removed.get()
    }

    /// Total bytes ever reserved, regardless of whether they were released.
    #[must_use]
    pub fn memory_total(&self) -> u64 {
        self.memory.added.get()
    }

    /// Live reserved bytes. Negative if more was released than reserved.
    #[must_use]
    pub fn memory_now(&self) -> i64 {
        self.memory.now.get()
    }

    /// Highest number of live reserved bytes seen.
    #[must_use]
    pub fn memory_max(&self) -> i64 {
        self.memory.max.get()
    }

    /// Lowest number of live reserved bytes seen. Negative if, at any point, more memory had
    /// been released than reserved.
    #[must_use]
    pub fn memory_min(&self) -> i64 {
        self.memory.min.get()
    }

    /// Total bytes ever released.
    #[must_use]
    pub fn deallocated_memory_total(&self) -> u64 {
        self.memory.removed.get()
    }

    /// Total number of values ever constructed.
    #[must_use]
    pub fn constructed_total(&self) -> u64 {
        self.constructed.added.get()
    }

    /// Number of live constructed values. Negative if more were destroyed than constructed.
    #[must_use]
    pub fn constructed_now(&self) -> i64 {
        self.constructed.now.get()
    }

    /// Highest number of live constructed values seen.
    #[must_use]
    pub fn constructed_max(&self) -> i64 {
        self.constructed.max.get()
    }

    /// Lowest number of live constructed values seen.
    #[must_use]
    pub fn constructed_min(&self) -> i64 {
        self.constructed.min.get()
    }

    /// Captures the current value of every counter.
    #[must_use]
    pub fn snapshot(&self) -> Statistics {
        Statistics {
            allocate_calls: self.allocate_calls(),
            deallocate_calls: self.deallocate_calls(),
            construct_calls: self.construct_calls(),
            destroy_calls: self.destroy_calls(),
            max_size_calls: self.max_size_calls(),
            provider_for_copy_calls: self.provider_for_copy_calls(),
            objects_total: self.objects_total(),
            objects_now: self.objects_now(),
            objects_max: self.objects_max(),
            objects_min: self.objects_min(),
            deallocated_objects_total: self.deallocated_objects_total(),
            memory_total: self.memory_total(),
            memory_now: self.memory_now(),
            memory_max: self.memory_max(),
            memory_min: self.memory_min(),
            deallocated_memory_total: self.deallocated_memory_total(),
            constructed_total: self.constructed_total(),
            constructed_now: self.constructed_now(),
            constructed_max: self.constructed_max(),
            constructed_min: self.constructed_min(),
        }
    }
}

impl Delegate for CountingDelegate {
    fn reserve<T, P>(&self, provider: &P, count: usize) -> Result<NonNull<T>>
    where
        P: Provider<T>,
    {
        let ptr = provider.reserve(count)?;
        self.record_reservation(count, size_of::<T>());
        Ok(ptr)
    }

    fn reserve_with_hint<T, P>(
        &self,
        provider: &P,
        count: usize,
        hint: NonNull<u8>,
    ) -> Result<NonNull<T>>
    where
        P: Provider<T>,
    {
        let ptr = provider.reserve_with_hint(count, hint)?;
        self.record_reservation(count, size_of::<T>());
        Ok(ptr)
    }

    unsafe fn release<T, P>(&self, provider: &P, ptr: NonNull<T>, count: usize)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            provider.release(ptr, count);
        }
        self.record_release(count, size_of::<T>());
    }

    unsafe fn construct<T, C, P>(&self, provider: &P, ptr: NonNull<C>, value: C)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            Provider::<T>::construct(provider, ptr, value);
        }
        increment(&self.construct_calls);
        self.constructed.increase(1);
    }

    unsafe fn destroy<T, C, P>(&self, provider: &P, ptr: NonNull<C>)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            Provider::<T>::destroy(provider, ptr);
        }
        increment(&self.destroy_calls);
        self.constructed.decrease(1);
    }

    fn max_size<T, P>(&self, provider: &P) -> usize
    where
        P: Provider<T>,
    {
        increment(&self.max_size_calls);
        Provider::<T>::max_size(provider)
    }

    fn provider_for_copy<T, P>(&self, provider: &P) -> P
    where
        P: Provider<T>,
    {
        increment(&self.provider_for_copy_calls);
        Provider::<T>::provider_for_copy(provider)
    }
}

impl Drop for CountingDelegate {
    fn drop(&mut self) {
        let objects_now = self.objects_now();
        let constructed_now = self.constructed_now();

        if objects_now != 0 || constructed_now != 0 {
            warn!(
                objects_now,
                memory_now = self.memory_now(),
                constructed_now,
                "copy group dissolved with unbalanced reservations or constructions"
            );
        }
    }
}
