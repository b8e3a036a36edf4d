//! Per-service mailbox: a growable ring buffer of [`Message`]s behind a
//! spinlock, plus the bookkeeping the ready list needs to avoid linking a
//! mailbox twice (spec §3 "Mailbox", §4.1).
//!
//! Grounded on the teacher's `sync::message_queue.rs`/`sync::mailbox.rs`
//! (both wrap a lock-protected ring with head/tail indices), generalized
//! from their blocking, fixed-capacity, wait-queue-backed design to the
//! spec's non-blocking, unbounded-growth one — the teacher's threads
//! suspend on a `WaitQueue` when a mailbox is empty/full; this crate never
//! blocks (spec §5, "Suspension points: None internal").

use log::trace;

use crate::message::Message;
use crate::spinlock::SpinLock;

/// Ring buffer initial capacity (spec §3: "`cap` ... ≥ initial (64)").
pub const DEFAULT_QUEUE_SIZE: usize = 64;

/// Overload length that triggers the first report, and what
/// `overload_threshold` resets to on the empty transition (spec §4.1).
pub const OVERLOAD_THRESHOLD_INIT: usize = 1024;

/// The ring buffer itself: a plain `Vec<Message>` with manual head/tail
/// indices, matching the source system's explicit ring rather than
/// reaching for `VecDeque`'s opaque growth policy — the exact doubling
/// behavior (cap 64 -> 128, `head = 0`, `tail = old_cap`) is a spec-tested
/// property (§8, scenario 3), not an implementation detail to hide.
struct Ring {
    buf: Vec<Message>,
    head: usize,
    tail: usize,
    cap: usize,
}

impl Ring {
    fn new(cap: usize) -> Self {
        Ring {
            buf: vec![Message::default(); cap],
            head: 0,
            tail: 0,
            cap,
        }
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn len(&self) -> usize {
        if self.tail >= self.head {
            self.tail - self.head
        } else {
            self.tail + self.cap - self.head
        }
    }

    /// Append at `tail`; grows the buffer if the write makes `head == tail`
    /// (spec §4.1, "Ring-buffer policy").
    fn push(&mut self, msg: Message) {
        self.buf[self.tail] = msg;
        self.tail += 1;
        if self.tail >= self.cap {
            self.tail = 0;
        }
        if self.head == self.tail {
            self.expand();
        }
    }

    fn expand(&mut self) {
        let old_cap = self.cap;
        let mut new_buf = vec![Message::default(); old_cap * 2];
        for (i, slot) in new_buf.iter_mut().enumerate().take(old_cap) {
            *slot = self.buf[(self.head + i) % old_cap];
        }
        self.buf = new_buf;
        self.head = 0;
        self.tail = old_cap;
        self.cap = old_cap * 2;
    }

    fn pop(&mut self) -> Option<Message> {
        if self.is_empty() {
            return None;
        }
        let msg = self.buf[self.head];
        self.head += 1;
        if self.head >= self.cap {
            self.head = 0;
        }
        Some(msg)
    }
}

struct Inner {
    ring: Ring,
    /// Linked in the ready list, or currently being drained by a worker
    /// that will decide whether to re-link it (spec §4.1, "In-ready
    /// protocol").
    in_ready: bool,
    /// Set once; teardown is deferred until the mailbox is next dequeued.
    release: bool,
    overload: usize,
    overload_threshold: usize,
}

/// One service's FIFO mailbox. Always handed around behind an `Arc` once
/// published, so the ready list can hold a reference without owning it
/// exclusively (spec §9, "Global mutable singletons" / Option (b)).
pub struct Mailbox {
    handle: u32,
    inner: SpinLock<Inner>,
}

impl Mailbox {
    /// `mq_create`: allocate a mailbox with `in_ready` already set, so
    /// concurrent pushes during service init don't race the registry's
    /// first `ready_push` (spec §4.1).
    pub fn new(handle: u32) -> Self {
        trace!("mailbox {handle}: created, cap={DEFAULT_QUEUE_SIZE}");
        Mailbox {
            handle,
            inner: SpinLock::new(Inner {
                ring: Ring::new(DEFAULT_QUEUE_SIZE),
                in_ready: true,
                release: false,
                overload: 0,
                overload_threshold: OVERLOAD_THRESHOLD_INIT,
            }),
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// `mq_push`: append a message. Returns `true` exactly when the
    /// mailbox transitioned from "not in ready list" to "in ready list"
    /// and the caller (normally [`crate::ready_queue::ReadyQueue`]) must
    /// link it.
    pub fn push(&self, msg: Message) -> bool {
        let mut inner = self.inner.lock();
        inner.ring.push(msg);
        if !inner.in_ready {
            inner.in_ready = true;
            true
        } else {
            false
        }
    }

    /// `mq_pop`: remove the front message. Clears `in_ready` and resets
    /// `overload_threshold` only on the empty transition (spec §4.1).
    /// Must only be called by the worker that currently owns this
    /// mailbox (i.e. dequeued it from the ready list).
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        match inner.ring.pop() {
            Some(msg) => {
                let length = inner.ring.len();
                while length > inner.overload_threshold {
                    inner.overload = length;
                    inner.overload_threshold *= 2;
                }
                Some(msg)
            }
            None => {
                inner.in_ready = false;
                inner.overload_threshold = OVERLOAD_THRESHOLD_INIT;
                None
            }
        }
    }

    /// `mq_length`: a snapshot message count.
    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `mq_overload`: the last recorded overload length, cleared to 0.
    pub fn take_overload(&self) -> usize {
        let mut inner = self.inner.lock();
        let overload = inner.overload;
        inner.overload = 0;
        overload
    }

    /// `mq_mark_release`: set `release`. Returns `true` if the mailbox
    /// must be linked into the ready list so a worker observes the flag.
    pub fn mark_release(&self) -> bool {
        let mut inner = self.inner.lock();
        assert!(!inner.release, "mailbox {} released twice", self.handle);
        inner.release = true;
        if !inner.in_ready {
            inner.in_ready = true;
            true
        } else {
            false
        }
    }

    pub fn is_release_pending(&self) -> bool {
        self.inner.lock().release
    }

    #[cfg(test)]
    fn cap(&self) -> usize {
        self.inner.lock().ring.cap
    }
}
