#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memory provider decorators that observe every request made through them.
//!
//! A memory provider is any type implementing [`Provider`]: it reserves and releases storage for
//! elements of one type, constructs and destroys values in that storage and can be
//! [rebound](Rebind) to produce an equivalent provider for another element type. Containers
//! written against these traits can be handed a decorated provider instead of a plain one
//! without noticing the difference.
//!
//! The core functionality includes:
//! - [`DelegatingProvider`] - wraps any provider and routes each request through a [`Delegate`]
//! - [`InstrumentedProvider`] - a [`DelegatingProvider`] whose [`CountingDelegate`] counts calls,
//!   live objects and live bytes
//! - [`Statistics`] - a point-in-time snapshot of the counters
//! - [`System`] - a provider that reserves from the global allocator
//!
//! # Copy groups
//!
//! Containers clone and rebind their provider freely, often for internal node types the user
//! never names. To still report everything a container does, all providers derived from one
//! decorator share a single delegate: the decorator, its clones, its rebinds and their clones
//! form a *copy group*. The shared delegate is stored in a block reserved from the wrapped
//! provider and is released when the last member of the group goes away.
//!
//! ```
//! use instrumented_provider::{InstrumentedProvider, Provider};
//!
//! let values = InstrumentedProvider::<u64>::default();
//!
//! // A container would typically do this for its internal nodes.
//! let nodes = values.rebind::<[u64; 4]>();
//! let node = nodes.reserve(1)?;
//!
//! assert_eq!(values.objects_now(), 1);
//! assert_eq!(values.memory_now(), 32);
//! assert!(values.shares_group_with(&nodes));
//!
//! // SAFETY: Reserved above with the same count and released once.
//! unsafe { nodes.release(node, 1) };
//!
//! values.snapshot().print_to_stdout();
//! # Ok::<(), instrumented_provider::Error>(())
//! ```
//!
//! Decorators constructed separately never share statistics, even when their wrapped providers
//! compare equal. When a container copies itself, it asks for
//! [`provider_for_copy()`](Provider::provider_for_copy), which also starts a new group.
//!
//! # Custom delegates
//!
//! Implement [`Delegate`] to observe or alter requests in other ways. Every hook forwards to the
//! wrapped provider by default, so a delegate only overrides the hooks it cares about.
//!
//! ```
//! use std::cell::Cell;
//! use std::ptr::NonNull;
//!
//! use instrumented_provider::{Delegate, DelegatingProvider, Provider, Result, System};
//!
//! #[derive(Debug, Default)]
//! struct Largest {
//!     count: Cell<usize>,
//! }
//!
//! impl Delegate for Largest {
//!     fn reserve<T, P>(&self, provider: &P, count: usize) -> Result<NonNull<T>>
//!     where
//!         P: Provider<T>,
//!     {
//!         self.count.set(self.count.get().max(count));
//!         provider.reserve(count)
//!     }
//! }
//!
//! let provider = DelegatingProvider::<u8, Largest, System>::default();
//! let ptr = provider.reserve(12)?;
//! assert_eq!(provider.count.get(), 12);
//!
//! // SAFETY: Reserved above with the same count and released once.
//! unsafe { provider.release(ptr, 12) };
//! # Ok::<(), instrumented_provider::Error>(())
//! ```
//!
//! # Thread safety
//!
//! The counters and the copy group bookkeeping are not synchronized. Decorated providers are
//! neither [`Send`] nor [`Sync`] and the whole copy group must stay on the thread that created it.

mod counting;
mod delegate;
mod delegating;
mod error;
mod provider;
mod shared;
mod statistics;
mod system;
mod volume;

#[cfg(test)]
mod testing;

pub use counting::CountingDelegate;
pub use delegate::*;
pub use delegating::*;
pub use error::*;
pub use provider::*;
pub use shared::SharedDelegate;
pub use statistics::Statistics;
pub use system::System;
