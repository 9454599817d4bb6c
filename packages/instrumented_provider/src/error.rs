use thiserror::Error;

/// Reasons why a memory provider could not satisfy a reservation.
///
/// Decorators never create these on their own behalf except when reserving their own
/// bookkeeping; an error returned by a wrapped provider is passed through unchanged.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The requested number of elements does not fit into the address space.
    #[error("cannot reserve {count} elements of {element_size} bytes each: size overflows")]
    CapacityOverflow {
        /// The number of elements that was requested.
        count: usize,

        /// The size of one element, in bytes.
        element_size: usize,
    },

    /// The provider had no memory left to satisfy the request.
    #[error("memory provider could not reserve {size} bytes aligned to {align}")]
    OutOfMemory {
        /// The number of bytes that was requested.
        size: usize,

        /// The alignment that was requested.
        align: usize,
    },
}

/// A specialized `Result` type for memory provider operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
