//! Providers that only exist to test the decorators.

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::{Error, Provider, Rebind, Result};

#[derive(Debug, Default)]
struct Ledger {
    // Address to the layout that was actually reserved there.
    outstanding: RefCell<HashMap<usize, Layout>>,
    remaining_successes: Cell<Option<usize>>,
    clones_panic: Cell<bool>,
}

/// Records every outstanding reservation, so tests can check for leaks and double releases.
///
/// Releases look up the real size of the reservation instead of trusting the caller, which lets
/// tests release with a mismatched count to drive the counters negative without corrupting the
/// heap. Releasing an address that is not outstanding panics.
///
/// Clones and rebinds share one ledger and compare equal; separately created providers do not.
#[derive(Debug, Default)]
pub(crate) struct LedgerProvider {
    ledger: Rc<Ledger>,
}

impl LedgerProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of reservations that have not been released yet.
    pub(crate) fn outstanding(&self) -> usize {
        self.ledger.outstanding.borrow().len()
    }

    /// Lets the next `successes` reservations succeed and fails every one after that.
    pub(crate) fn fail_after(&self, successes: usize) {
        self.ledger.remaining_successes.set(Some(successes));
    }

    /// Makes every later `clone()` of a provider sharing this ledger panic. Rebinding still works.
    pub(crate) fn panic_on_clone(&self) {
        self.ledger.clones_panic.set(true);
    }

    fn share(&self) -> Self {
        Self {
            ledger: Rc::clone(&self.ledger),
        }
    }
}

impl Clone for LedgerProvider {
    fn clone(&self) -> Self {
        assert!(
            !self.ledger.clones_panic.get(),
            "cloning this memory provider was set to panic"
        );

        self.share()
    }
}

impl<T> Provider<T> for LedgerProvider {
    fn reserve(&self, count: usize) -> Result<NonNull<T>> {
        let layout = Layout::array::<T>(count)
            .ok()
            .and_then(|layout| Layout::from_size_align(layout.size().max(1), layout.align()).ok())
            .ok_or(Error::CapacityOverflow {
                count,
                element_size: size_of::<T>(),
            })?;

        if let Some(remaining) = self.ledger.remaining_successes.get() {
            let Some(remaining) = remaining.checked_sub(1) else {
                return Err(Error::OutOfMemory {
                    size: layout.size(),
                    align: layout.align(),
                });
            };

            self.ledger.remaining_successes.set(Some(remaining));
        }

        // SAFETY: The layout is at least one byte, so every reservation gets a distinct address.
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(Error::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        })?;

        self.ledger
            .outstanding
            .borrow_mut()
            .insert(ptr.as_ptr().addr(), layout);

        Ok(ptr.cast())
    }

    unsafe fn release(&self, ptr: NonNull<T>, _count: usize) {
        let layout = self
            .ledger
            .outstanding
            .borrow_mut()
            .remove(&ptr.as_ptr().addr())
            .expect("released an address that is not outstanding");

        // SAFETY: The address was reserved by `alloc` with exactly this layout.
        unsafe {
            alloc::dealloc(ptr.as_ptr().cast(), layout);
        }
    }
}

impl<U> Rebind<U> for LedgerProvider {
    type Rebound = Self;

    fn rebind(&self) -> Self {
        self.share()
    }
}

impl PartialEq for LedgerProvider {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ledger, &other.ledger)
    }
}

impl Eq for LedgerProvider {}

impl Drop for Ledger {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(
                self.outstanding.get_mut().is_empty(),
                "memory provider dropped with outstanding reservations"
            );
        }
    }
}
