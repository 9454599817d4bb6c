use std::ptr::NonNull;

use crate::{Provider, Result};

/// Observes or customizes the requests that a [`DelegatingProvider`] forwards to the provider
/// it wraps.
///
/// One delegate instance is shared by a whole copy group: every clone and every rebind of a
/// [`DelegatingProvider`] calls into the same delegate, passing its own wrapped provider as the
/// `provider` argument. Hooks therefore take `&self` and delegates that keep state must use
/// interior mutability.
///
/// Every hook has a default implementation that forwards to `provider` unchanged, so an
/// implementation only overrides the hooks it cares about.
///
/// A [`DelegatingProvider`] only acts as a [`Provider`] itself if its delegate also implements
/// [`Default`], because copied containers get a new copy group with a fresh delegate.
///
/// [`DelegatingProvider`]: crate::DelegatingProvider
pub trait Delegate {
    /// Called for [`Provider::reserve`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation fails. Implementations should return the error of
    /// the wrapped provider unchanged.
    fn reserve<T, P>(&self, provider: &P, count: usize) -> Result<NonNull<T>>
    where
        P: Provider<T>,
    {
        provider.reserve(count)
    }

    /// Called for [`Provider::reserve_with_hint`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reservation fails. Implementations should return the error of
    /// the wrapped provider unchanged.
    fn reserve_with_hint<T, P>(
        &self,
        provider: &P,
        count: usize,
        hint: NonNull<u8>,
    ) -> Result<NonNull<T>>
    where
        P: Provider<T>,
    {
        provider.reserve_with_hint(count, hint)
    }

    /// Called for [`Provider::release`].
    ///
    /// # Safety
    ///
    /// Same as [`Provider::release`].
    unsafe fn release<T, P>(&self, provider: &P, ptr: NonNull<T>, count: usize)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            provider.release(ptr, count);
        }
    }

    /// Called for [`Provider::construct`].
    ///
    /// # Safety
    ///
    /// Same as [`Provider::construct`].
    unsafe fn construct<T, C, P>(&self, provider: &P, ptr: NonNull<C>, value: C)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            Provider::<T>::construct(provider, ptr, value);
        }
    }

    /// Called for [`Provider::destroy`].
    ///
    /// # Safety
    ///
    /// Same as [`Provider::destroy`].
    unsafe fn destroy<T, C, P>(&self, provider: &P, ptr: NonNull<C>)
    where
        P: Provider<T>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            Provider::<T>::destroy(provider, ptr);
        }
    }

    /// Called for [`Provider::max_size`].
    fn max_size<T, P>(&self, provider: &P) -> usize
    where
        P: Provider<T>,
    {
        Provider::<T>::max_size(provider)
    }

    /// Called for [`Provider::provider_for_copy`] to obtain the wrapped provider that the
    /// fresh copy group will decorate.
    fn provider_for_copy<T, P>(&self, provider: &P) -> P
    where
        P: Provider<T>,
    {
        Provider::<T>::provider_for_copy(provider)
    }
}

/// A [`Delegate`] that forwards every request unchanged and keeps no state.
///
/// A [`DelegatingProvider`] with this delegate behaves exactly like the provider it wraps,
/// while still maintaining a copy group.
///
/// [`DelegatingProvider`]: crate::DelegatingProvider
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct NullDelegate;

impl Delegate for NullDelegate {}
