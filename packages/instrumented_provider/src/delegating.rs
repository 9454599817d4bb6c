use std::alloc::{Layout, handle_alloc_error};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use tracing::debug;

use crate::{CountingDelegate, Delegate, Provider, Rebind, Result, SharedDelegate, System};

/// A memory provider decorator that forwards every request to a wrapped provider through a
/// [`Delegate`] shared by its whole copy group.
///
/// Each instance owns its own copy of the wrapped provider `P`. The delegate, on the other hand,
/// lives in a block shared by every instance in the same *copy group*: the instance that created
/// the block plus every clone and every [rebind](Self::rebind) made from any member, however
/// many times removed. The block is reserved from the wrapped provider itself and is released
/// when the last member of the group is dropped or assigned a member of another group.
///
/// From the point of view of code that is generic over [`Provider`], a `DelegatingProvider` is
/// indistinguishable from the provider it wraps: it implements [`Provider`] and [`Rebind`] by
/// forwarding, reports the wrapped provider's failures unchanged and compares equal exactly when
/// the wrapped providers compare equal. Decorators can therefore be nested.
///
/// The decorator dereferences to its delegate, so delegate accessors can be called directly
/// on it.
///
/// # Thread safety
///
/// The copy group is maintained with a non-atomic reference count, so this type is neither
/// [`Send`] nor [`Sync`].
///
/// # Examples
///
/// ```
/// use instrumented_provider::{InstrumentedProvider, Provider};
///
/// let a = InstrumentedProvider::<u64>::default();
/// let first = a.reserve(3)?;
///
/// // A clone joins the copy group of `a` and updates the same counters.
/// let b = a.clone();
/// let second = b.reserve(2)?;
///
/// assert_eq!(a.objects_now(), 5);
/// assert_eq!(b.objects_now(), 5);
/// assert_eq!(a.group_size(), 2);
///
/// // SAFETY: Each pointer was reserved above with the same count and is released once.
/// unsafe {
///     a.release(first, 3);
///     b.release(second, 2);
/// }
/// # Ok::<(), instrumented_provider::Error>(())
/// ```
pub struct DelegatingProvider<T, D, P = System>
where
    P: Rebind<SharedDelegate<D>>,
{
    provider: P,

    // Never null, always alive while we are a member of the group.
    shared: NonNull<SharedDelegate<D>>,

    _element: PhantomData<fn() -> T>,
}

/// A provider decorator that counts calls, objects and memory across its whole copy group.
///
/// See [`DelegatingProvider`] for the copy group semantics and [`CountingDelegate`] for the
/// counters, all of which can be read directly on the provider.
///
/// # Examples
///
/// ```
/// use instrumented_provider::{InstrumentedProvider, Provider};
///
/// let strings = InstrumentedProvider::<String>::default();
///
/// // A provider for another element type that still counts into the same group.
/// let bytes = strings.rebind::<u8>();
/// let ptr = bytes.reserve(64)?;
///
/// assert_eq!(strings.objects_now(), 64);
/// assert_eq!(strings.memory_now(), 64);
///
/// // SAFETY: Reserved above with the same count and released once.
/// unsafe { bytes.release(ptr, 64) };
/// # Ok::<(), instrumented_provider::Error>(())
/// ```
pub type InstrumentedProvider<T, P = System> = DelegatingProvider<T, CountingDelegate, P>;

impl<T, D, P> DelegatingProvider<T, D, P>
where
    D: Default,
    P: Rebind<SharedDelegate<D>>,
{
    /// Decorates `provider` with a default delegate, forming a new copy group of one.
    ///
    /// # Panics
    ///
    /// Reports the failure via [`handle_alloc_error`] if the shared block cannot be reserved
    /// from `provider`. Use [`try_new()`](Self::try_new) to receive the error instead.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self::with_delegate(D::default(), provider)
    }

    /// Decorates `provider` with a default delegate, forming a new copy group of one.
    ///
    /// # Errors
    ///
    /// Returns the error of the wrapped provider if the shared block cannot be reserved.
    pub fn try_new(provider: P) -> Result<Self> {
        Self::try_with_delegate(D::default(), provider)
    }
}

impl<T, D, P> DelegatingProvider<T, D, P>
where
    P: Rebind<SharedDelegate<D>>,
{
    /// Decorates `provider` with `delegate`, forming a new copy group of one.
    ///
    /// # Panics
    ///
    /// Reports the failure via [`handle_alloc_error`] if the shared block cannot be reserved
    /// from `provider`. Use [`try_with_delegate()`](Self::try_with_delegate) to receive the
    /// error instead.
    #[must_use]
    pub fn with_delegate(delegate: D, provider: P) -> Self {
        Self::try_with_delegate(delegate, provider)
            .unwrap_or_else(|_| handle_alloc_error(Layout::new::<SharedDelegate<D>>()))
    }

    /// Decorates `provider` with `delegate`, forming a new copy group of one.
    ///
    /// # Errors
    ///
    /// Returns the error of the wrapped provider if the shared block cannot be reserved.
    pub fn try_with_delegate(delegate: D, provider: P) -> Result<Self> {
        let shared = SharedDelegate::create(&provider, delegate)?;

        Ok(Self {
            provider,
            shared,
            _element: PhantomData,
        })
    }

    fn shared(&self) -> &SharedDelegate<D> {
        // SAFETY: The block stays alive for as long as any member of the group, including
        // `self`, references it.
        unsafe { self.shared.as_ref() }
    }

    /// The delegate shared by the copy group of this provider.
    #[must_use]
    pub fn delegate(&self) -> &D {
        self.shared().delegate()
    }

    /// The wrapped provider owned by this instance.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The number of instances currently in the copy group of this provider, including itself.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.shared().references()
    }

    /// Whether `other` belongs to the same copy group as this provider, regardless of the
    /// element type each of them reserves.
    #[must_use]
    pub fn shares_group_with<U, Q>(&self, other: &DelegatingProvider<U, D, Q>) -> bool
    where
        Q: Rebind<SharedDelegate<D>>,
    {
        self.shared == other.shared
    }

    /// Returns a provider for element type `U` that joins the copy group of this provider.
    ///
    /// The wrapped provider is rebound via [`Rebind`]. Counters of the group are unaffected by
    /// rebinding itself; requests made through the returned provider count into this group,
    /// sized according to `U`.
    #[must_use]
    pub fn rebind<U>(&self) -> DelegatingProvider<U, D, <P as Rebind<U>>::Rebound>
    where
        P: Rebind<U>,
        <P as Rebind<U>>::Rebound: Rebind<SharedDelegate<D>>,
    {
        let provider = <P as Rebind<U>>::rebind(&self.provider);
        self.shared().join();

        DelegatingProvider {
            provider,
            shared: self.shared,
            _element: PhantomData,
        }
    }
}

/// Removes one member from the group behind `shared`, dissolving the group if it was the last.
///
/// # Safety
///
/// `shared` must be the block of a membership that the caller holds and gives up by this call.
/// `provider` must be the wrapped provider of that member (or one equal to it).
unsafe fn leave_group<P, D>(provider: &P, shared: NonNull<SharedDelegate<D>>)
where
    P: Rebind<SharedDelegate<D>>,
{
    // SAFETY: The caller still holds a membership, so the block is alive.
    let last = unsafe { shared.as_ref() }.leave();

    if last {
        // SAFETY: No members remain and every member's provider is equal to the one that
        // created the block, so it may release the block's storage.
        unsafe {
            SharedDelegate::destroy(provider, shared);
        }
    }
}

impl<T, D, P> Drop for DelegatingProvider<T, D, P>
where
    P: Rebind<SharedDelegate<D>>,
{
    fn drop(&mut self) {
        // SAFETY: We are giving up our membership and the block is never touched again by us.
        unsafe {
            leave_group(&self.provider, self.shared);
        }
    }
}

impl<T, D, P> Clone for DelegatingProvider<T, D, P>
where
    P: Clone + Rebind<SharedDelegate<D>>,
{
    /// Copies the wrapped provider and joins the copy group of `self`.
    fn clone(&self) -> Self {
        let provider = self.provider.clone();
        self.shared().join();

        Self {
            provider,
            shared: self.shared,
            _element: PhantomData,
        }
    }

    /// Leaves the current copy group and joins the copy group of `source`.
    ///
    /// The group of `source` is joined before the current one is left, so this is correct even
    /// if both already are the same group. If cloning the wrapped provider panics, `self` is
    /// left unchanged in its original group.
    fn clone_from(&mut self, source: &Self) {
        // Nothing below may panic until the old membership is given up, so the provider and
        // the group always change together.
        let provider = source.provider.clone();

        source.shared().join();
        let previous_shared = mem::replace(&mut self.shared, source.shared);
        let previous_provider = mem::replace(&mut self.provider, provider);

        // SAFETY: `previous_shared` is the membership we held until the lines above, together
        // with the wrapped provider that belongs to it.
        unsafe {
            leave_group(&previous_provider, previous_shared);
        }
    }
}

impl<T, D, P> Deref for DelegatingProvider<T, D, P>
where
    P: Rebind<SharedDelegate<D>>,
{
    type Target = D;

    fn deref(&self) -> &D {
        self.delegate()
    }
}

impl<T, D, P> Default for DelegatingProvider<T, D, P>
where
    D: Default,
    P: Default + Rebind<SharedDelegate<D>>,
{
    fn default() -> Self {
        Self::new(P::default())
    }
}

/// Requires `D: Default` because [`provider_for_copy()`](Provider::provider_for_copy) starts a
/// new copy group with a fresh delegate. With a delegate that has no default value, the
/// decorator can still be constructed, cloned and rebound, but it is not a [`Provider`].
impl<T, D, P> Provider<T> for DelegatingProvider<T, D, P>
where
    D: Delegate + Default,
    P: Provider<T> + Rebind<SharedDelegate<D>>,
{
    fn reserve(&self, count: usize) -> Result<NonNull<T>> {
        self.delegate().reserve::<T, P>(&self.provider, count)
    }

    fn reserve_with_hint(&self, count: usize, hint: NonNull<u8>) -> Result<NonNull<T>> {
        self.delegate().reserve_with_hint::<T, P>(&self.provider, count, hint)
    }

    unsafe fn release(&self, ptr: NonNull<T>, count: usize) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.delegate().release::<T, P>(&self.provider, ptr, count);
        }
    }

    fn max_size(&self) -> usize {
        self.delegate().max_size::<T, P>(&self.provider)
    }

    unsafe fn construct<C>(&self, ptr: NonNull<C>, value: C) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.delegate().construct::<T, C, P>(&self.provider, ptr, value);
        }
    }

    unsafe fn destroy<C>(&self, ptr: NonNull<C>) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.delegate().destroy::<T, C, P>(&self.provider, ptr);
        }
    }

    /// Decorates the wrapped provider's own choice of provider for a copied container.
    ///
    /// The result starts a new copy group with fresh counters; it does not share statistics
    /// with `self`.
    fn provider_for_copy(&self) -> Self {
        let provider = self.delegate().provider_for_copy::<T, P>(&self.provider);

        debug!(
            element = type_name::<T>(),
            "starting a new copy group for a copied container"
        );

        Self::new(provider)
    }
}

/// Requires `D: Default` for the same reason as the [`Provider`] implementation, which every
/// rebound provider must have.
impl<T, U, D, P> Rebind<U> for DelegatingProvider<T, D, P>
where
    D: Delegate + Default,
    P: Rebind<SharedDelegate<D>> + Rebind<U>,
    <P as Rebind<U>>::Rebound: Rebind<SharedDelegate<D>>,
{
    type Rebound = DelegatingProvider<U, D, <P as Rebind<U>>::Rebound>;

    fn rebind(&self) -> Self::Rebound {
        Self::rebind::<U>(self)
    }
}

/// Providers are equal if their wrapped providers are equal, regardless of copy group or
/// element type: memory reserved through one can be released through the other.
impl<T, U, D, P, Q> PartialEq<DelegatingProvider<U, D, Q>> for DelegatingProvider<T, D, P>
where
    P: PartialEq<Q> + Rebind<SharedDelegate<D>>,
    Q: Rebind<SharedDelegate<D>>,
{
    fn eq(&self, other: &DelegatingProvider<U, D, Q>) -> bool {
        self.provider == other.provider
    }
}

impl<T, D, P> Eq for DelegatingProvider<T, D, P> where P: Eq + Rebind<SharedDelegate<D>> {}

impl<T, D, P> fmt::Debug for DelegatingProvider<T, D, P>
where
    D: fmt::Debug,
    P: fmt::Debug + Rebind<SharedDelegate<D>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("provider", &self.provider)
            .field("group_size", &self.group_size())
            .field("delegate", self.delegate())
            .finish_non_exhaustive()
    }
}
