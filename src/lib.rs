//! `dispatch_core`: the message-queueing and timing-wheel substrate
//! underneath an actor-style service runtime.
//!
//! Two independent pieces, composed by [`runtime::Runtime`]:
//!
//! - **Mailbox queueing** ([`mailbox`], [`ready_queue`], [`registry`]): a
//!   growable per-service ring buffer feeding a process-wide FIFO ready
//!   list, so worker threads never poll idle mailboxes.
//! - **Timing wheel** ([`timer`]): a hierarchical wheel that turns expired
//!   timeouts into ordinary messages, delivered through the same ready
//!   list via the [`registry::Dispatch`] seam.
//!
//! Neither piece blocks internally (there are no suspension points other
//! than lock acquisition, and those critical sections are O(1) or
//! strictly bounded); callers own the thread-pool and scheduling policy.

pub mod clock;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod ready_queue;
pub mod registry;
pub mod runtime;
pub mod spinlock;
pub mod timer;

pub use error::RegistryError;
pub use mailbox::Mailbox;
pub use message::Message;
pub use ready_queue::ReadyQueue;
pub use registry::{Dispatch, MailboxRegistry};
pub use runtime::Runtime;
pub use timer::Wheel;
