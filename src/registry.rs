//! The handle -> mailbox lookup the timing wheel needs to turn an expired
//! timer into a delivered message (spec §6, "the handle-to-mailbox lookup
//! (out of scope: assume a `push_to_handle(handle, msg) -> bool`
//! function)").
//!
//! Deliberately out of scope per spec §2 ("service registry, actor
//! lifecycle"): this module supplies only the narrow seam the wheel is
//! specified against, not a real service table (no spawn/supervise/restart
//! semantics). It is grounded on the teacher's `scheduler::global_scheduler`
//! (a lock-protected table keyed by an integer id) rather than on the
//! original C sources, which keep the registry in a separate file
//! (`skynet_handle.c`) not included in the retrieved sources.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use crate::error::RegistryError;
use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::ready_queue::ReadyQueue;

/// The seam the timing wheel dispatches through: "deliver this message to
/// whatever currently owns this handle, or tell me it's gone."
pub trait Dispatch: Send + Sync {
    /// Returns `false` if `handle` no longer names a live mailbox. The
    /// message is dropped silently in that case (spec §6, "Dead handle at
    /// fire time").
    fn push_to_handle(&self, handle: u32, msg: Message) -> bool;
}

/// A handle -> mailbox table backed by an `RwLock`, matching the teacher's
/// `global_scheduler` table in shape (a map keyed by the handles it
/// manages) rather than in content — this crate has no threads to
/// schedule, only mailboxes to look up.
#[derive(Default)]
pub struct MailboxRegistry {
    mailboxes: RwLock<HashMap<u32, Arc<Mailbox>>>,
}

impl MailboxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly created mailbox and publishes it to `ready`
    /// (mirroring `mq_create`'s semantics: a mailbox is ready from the
    /// moment it exists). Fails with [`RegistryError::HandleInUse`]
    /// instead of silently overwriting an existing mailbox.
    pub fn insert(
        &self,
        handle: u32,
        ready: &ReadyQueue,
    ) -> Result<Arc<Mailbox>, RegistryError> {
        let mut mailboxes = self.mailboxes.write().expect("registry lock poisoned");
        match mailboxes.entry(handle) {
            Entry::Occupied(_) => Err(RegistryError::HandleInUse(handle)),
            Entry::Vacant(slot) => {
                let mailbox = Arc::new(Mailbox::new(handle));
                slot.insert(Arc::clone(&mailbox));
                drop(mailboxes);
                ready.push(Arc::clone(&mailbox));
                Ok(mailbox)
            }
        }
    }

    pub fn get(&self, handle: u32) -> Option<Arc<Mailbox>> {
        self.mailboxes
            .read()
            .expect("registry lock poisoned")
            .get(&handle)
            .cloned()
    }

    /// Like [`Self::get`], but fails with [`RegistryError::NoSuchHandle`]
    /// instead of returning `None`, for callers that want a `Result` API.
    pub fn require(&self, handle: u32) -> Result<Arc<Mailbox>, RegistryError> {
        self.get(handle).ok_or(RegistryError::NoSuchHandle(handle))
    }

    /// Drops the registry's own reference. The mailbox itself survives
    /// until the ready list's worker also drops its `Arc` (after
    /// `ReadyQueue::release_or_requeue` observes `mark_release`).
    pub fn remove(&self, handle: u32) -> Option<Arc<Mailbox>> {
        self.mailboxes
            .write()
            .expect("registry lock poisoned")
            .remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.mailboxes.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wires the registry to a [`ReadyQueue`] so it can serve as a [`Dispatch`]
/// implementation for [`crate::timer::Wheel`].
pub struct RegistryDispatch<'a> {
    registry: &'a MailboxRegistry,
    ready: &'a ReadyQueue,
}

impl<'a> RegistryDispatch<'a> {
    pub fn new(registry: &'a MailboxRegistry, ready: &'a ReadyQueue) -> Self {
        RegistryDispatch { registry, ready }
    }
}

impl Dispatch for RegistryDispatch<'_> {
    fn push_to_handle(&self, handle: u32, msg: Message) -> bool {
        match self.registry.get(handle) {
            Some(mailbox) => {
                self.ready.push_message(&mailbox, msg);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_publishes_to_ready_list() {
        let registry = MailboxRegistry::new();
        let ready = ReadyQueue::new();
        registry.insert(1, &ready).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready.pop().unwrap().handle(), 1);
    }

    #[test]
    fn insert_rejects_a_handle_already_in_use() {
        let registry = MailboxRegistry::new();
        let ready = ReadyQueue::new();
        registry.insert(1, &ready).unwrap();
        assert_eq!(
            registry.insert(1, &ready).unwrap_err(),
            RegistryError::HandleInUse(1)
        );
    }

    #[test]
    fn require_fails_on_unknown_handle() {
        let registry = MailboxRegistry::new();
        assert_eq!(
            registry.require(404).unwrap_err(),
            RegistryError::NoSuchHandle(404)
        );
    }

    #[test]
    fn dispatch_delivers_to_live_handle_and_rejects_dead_one() {
        let registry = MailboxRegistry::new();
        let ready = ReadyQueue::new();
        registry.insert(5, &ready).unwrap();
        ready.pop(); // worker claims it, draining the initial publish

        let dispatch = RegistryDispatch::new(&registry, &ready);
        assert!(dispatch.push_to_handle(5, Message::response(42)));
        assert!(!dispatch.push_to_handle(999, Message::response(1)));

        let mailbox = registry.get(5).unwrap();
        assert_eq!(mailbox.pop().unwrap().session, 42);
    }

    #[test]
    fn remove_drops_registry_reference_only() {
        let registry = MailboxRegistry::new();
        let ready = ReadyQueue::new();
        let mailbox = registry.insert(9, &ready).unwrap();
        let removed = registry.remove(9).unwrap();
        assert!(Arc::ptr_eq(&mailbox, &removed));
        assert!(registry.get(9).is_none());
    }
}
