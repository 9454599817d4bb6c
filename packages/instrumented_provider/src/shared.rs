use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use tracing::trace;

use crate::{Provider, Rebind, Result};

/// The block shared by every member of a copy group: the group's delegate plus the number of
/// [`DelegatingProvider`] instances referencing it.
///
/// The block lives in storage reserved from the decorated provider (rebound to this type), so
/// wrapped providers must implement `Rebind<SharedDelegate<D>>`. Apart from that bound, this
/// type is an implementation detail and offers no public operations.
///
/// [`DelegatingProvider`]: crate::DelegatingProvider
pub struct SharedDelegate<D> {
    references: Cell<usize>,
    delegate: D,
}

impl<D> SharedDelegate<D> {
    /// Places a new block with a reference count of 1 into storage reserved via `provider`.
    ///
    /// # Errors
    ///
    /// Returns the error of the rebound provider if it cannot reserve the block.
    pub(crate) fn create<P>(provider: &P, delegate: D) -> Result<NonNull<Self>>
    where
        P: Rebind<Self>,
    {
        let block_provider = <P as Rebind<Self>>::rebind(provider);
        let ptr = Provider::<Self>::reserve(&block_provider, 1)?;

        let block = Self {
            references: Cell::new(1),
            delegate,
        };

        // SAFETY: The storage was just reserved for exactly one `Self`, so it is valid for
        // writes, aligned and not yet referenced by anyone else.
        unsafe {
            Provider::<Self>::construct(&block_provider, ptr, block);
        }

        trace!(block = ?ptr, "copy group created");

        Ok(ptr)
    }

    /// Drops the block and releases its storage via `provider`.
    ///
    /// # Safety
    ///
    /// The block must have been created by [`create()`](Self::create) via a provider equal to
    /// `provider` (possibly before rebinding), its reference count must be zero and it must not
    /// be used again.
    pub(crate) unsafe fn destroy<P>(provider: &P, ptr: NonNull<Self>)
    where
        P: Rebind<Self>,
    {
        // SAFETY: The caller guarantees the block is still alive.
        debug_assert_eq!(unsafe { ptr.as_ref() }.references.get(), 0);

        let block_provider = <P as Rebind<Self>>::rebind(provider);

        trace!(block = ?ptr, "copy group dissolved");

        // SAFETY: The caller guarantees the block is alive and unused from now on.
        unsafe {
            Provider::<Self>::destroy(&block_provider, ptr);
        }

        // SAFETY: Reserved by `create()` with a count of one, via a provider equal to this one.
        unsafe {
            Provider::<Self>::release(&block_provider, ptr, 1);
        }
    }

    pub(crate) fn delegate(&self) -> &D {
        &self.delegate
    }

    pub(crate) fn references(&self) -> usize {
        self.references.get()
    }

    /// Registers one more member of the copy group.
    pub(crate) fn join(&self) {
        let references = self
            .references
            .get()
            .checked_add(1)
            .expect("copy group reference count overflow - this indicates an unrealistic scenario");

        self.references.set(references);
    }

    /// Unregisters one member of the copy group. Returns `true` if it was the last one, in which
    /// case the caller must [`destroy()`](Self::destroy) the block.
    #[must_use]
    pub(crate) fn leave(&self) -> bool {
        let references = self
            .references
            .get()
            .checked_sub(1)
            .expect("copy group reference count underflow - a member left the group twice");

        self.references.set(references);

        references == 0
    }
}

impl<D: fmt::Debug> fmt::Debug for SharedDelegate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDelegate")
            .field("references", &self.references.get())
            .field("delegate", &self.delegate)
            .finish()
    }
}
