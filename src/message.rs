//! The opaque message record carried by mailboxes (spec §3, "Message").
//!
//! Mirrors `struct skynet_message` from the original C core: `source`,
//! `session`, a borrowed payload pointer the queue does not own, and `sz`,
//! whose high bits carry a message-type tag (§6, "Message tagging").

/// Bit position at which the message-type tag is packed into `sz`.
///
/// An ABI constant in the source system (`MESSAGE_TYPE_SHIFT`); kept here
/// as the one `sz`-tag consumer in this crate (the timing wheel) needs it.
pub const MESSAGE_TYPE_SHIFT: usize = usize::BITS as usize - 8;

/// Tag set on messages synthesized by the timing wheel on timer expiry.
pub const PTYPE_RESPONSE: usize = 1;

/// A message payload the producer still owns; the queue only moves it.
///
/// `None` represents the source system's `data == NULL`. A non-owning raw
/// pointer (rather than `Box`/`Vec`) matches spec §3 ("shallow: the
/// embedded pointer is not owned by the queue") and §5 ("Message payload
/// pointers are not owned by the queue; the producer transfers ownership
/// to the consuming service").
#[derive(Debug, Clone, Copy, Default)]
pub struct Message {
    pub source: u32,
    pub session: i32,
    pub data: Option<std::ptr::NonNull<u8>>,
    pub sz: usize,
}

// SAFETY: `Message` is a plain, copy-by-value record whose pointer field
// is never dereferenced by this crate; ownership and thread-safety of the
// pointee is entirely the producer/consumer's responsibility, matching
// the "shallow" copy semantics in spec §3.
unsafe impl Send for Message {}

impl Message {
    /// A message with no payload, tagged `PTYPE_RESPONSE` — what the
    /// direct-delivery path and the timing wheel's dispatch both send.
    pub fn response(session: i32) -> Self {
        Message {
            source: 0,
            session,
            data: None,
            sz: PTYPE_RESPONSE << MESSAGE_TYPE_SHIFT,
        }
    }

    /// The message-type tag packed into the high bits of `sz`.
    pub fn tag(&self) -> usize {
        self.sz >> MESSAGE_TYPE_SHIFT
    }
}
