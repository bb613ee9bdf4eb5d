use std::fmt;

use log::error;

/// Possible errors returned by fallible methods on a [`crate::PrefixMap`] or
/// [`crate::PrefixSet`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrefixStoreError {
    /// A strict update or strict delete targeted a prefix that is not
    /// currently active.
    NotFound,
    /// A strict insert targeted a prefix that is already active.
    AlreadyExists,
    /// A prefix length was out of the `0..=32` range.
    InvalidArgument,
}

impl std::error::Error for PrefixStoreError {}

impl fmt::Display for PrefixStoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrefixStoreError::NotFound => {
                write!(f, "Error: the prefix was not found.")
            }
            PrefixStoreError::AlreadyExists => {
                write!(f, "Error: the prefix already exists.")
            }
            PrefixStoreError::InvalidArgument => {
                write!(f, "Error: invalid prefix length.")
            }
        }
    }
}

/// A fatal, unrecoverable misuse of the store: a write raced another write
/// on the same mutable handle and lost the compare-and-swap, a write was
/// attempted through a default (uninitialized) handle, or a structural
/// invariant failed to hold at runtime.
///
/// This is not meant to be caught by ordinary control flow; call sites that
/// detect it panic immediately rather than returning it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FatalError(pub(crate) &'static str);

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: a fatal error has occurred ({}). The store must be \
             considered corrupted.",
            self.0
        )
    }
}

impl std::error::Error for FatalError {}

impl FatalError {
    pub(crate) const CAS_RACE: FatalError =
        FatalError("concurrent mutation race detected");
    pub(crate) const WRITE_THROUGH_DEFAULT: FatalError =
        FatalError("write through a default mutable handle");
    pub(crate) const INVARIANT: FatalError =
        FatalError("structural invariant violated");
}

/// Aborts the current thread of control. Conditions reaching this point are
/// `FatalMisuse`: a lost CAS race, a write through a default handle, or a
/// broken structural invariant. None of these are meant to be recovered
/// from in ordinary control flow.
pub(crate) fn fatal(err: FatalError) -> ! {
    error!("{err}");
    panic!("{err}");
}
