//! Error types for the parts of this crate that return `Result` at all.
//!
//! Most of the MQ/TW core does not fail in the `Result` sense: invariant
//! violations are `assert!`/`debug_assert!` panics (a bug in the caller or
//! in this crate), and recoverable outcomes cross the API as plain values
//! (`schedule` returns `-1`, `ready_pop` returns `None`, `mq_pop` returns
//! `false`) rather than as `Err`. This mirrors the source system, where
//! the equivalent operations return `int`/`bool`/pointers rather than a
//! tagged error type.
//!
//! [`RegistryError`] is the one real error type in the crate, used by the
//! reference [`crate::registry::MailboxRegistry`], which is not part of
//! the specified core.

use core::fmt;

/// Errors from the reference handle table, not from the MQ/TW core itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A mailbox was already registered under this handle.
    HandleInUse(u32),
    /// No mailbox is registered under this handle.
    NoSuchHandle(u32),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::HandleInUse(h) => write!(f, "handle {h} is already registered"),
            RegistryError::NoSuchHandle(h) => write!(f, "no mailbox registered for handle {h}"),
        }
    }
}

impl std::error::Error for RegistryError {}
