//! Module containing the input types handed to the collector by the
//! producer that reads the audit netlink socket.
//!
//! # Design decisions
//! [`AuditReply`] mirrors the layout the kernel fills in response to
//! an audit netlink read: the record type and length from the netlink
//! header, the raw header bytes, and a fixed maximum-size data area.
//! The library never performs I/O itself; the producer fills one of
//! these from its socket read and passes it to
//! [`AuditCollector::on_record`][crate::collector::AuditCollector::on_record].

use crate::consts::{MAX_AUDIT_MESSAGE_LENGTH, NLMSG_HDR_LEN};

/// The message portion of an audit netlink reply: the netlink header
/// followed by the record text.
#[derive(Clone)]
pub struct AuditMessage {
    /// Raw netlink header bytes, copied through to pooled buffers
    /// without interpretation.
    pub nlh: [u8; NLMSG_HDR_LEN],
    /// Record text: preamble followed by the `key=value` body.
    pub data: [u8; MAX_AUDIT_MESSAGE_LENGTH],
}

impl Default for AuditMessage {
    fn default() -> Self {
        AuditMessage {
            nlh: [0; NLMSG_HDR_LEN],
            data: [0; MAX_AUDIT_MESSAGE_LENGTH],
        }
    }
}

/// An in-memory audit netlink reply as received from the kernel.
#[derive(Clone, Default)]
pub struct AuditReply {
    /// Audit record type from the netlink header.
    pub rec_type: u32,
    /// Number of valid bytes in `msg.data`.
    pub len: u32,
    /// Header and record text.
    pub msg: AuditMessage,
}

impl AuditReply {
    /// Create a reply from a record type and text, truncating text
    /// beyond [`MAX_AUDIT_MESSAGE_LENGTH`].
    pub fn from_parts(rec_type: u32, text: &[u8]) -> Self {
        let mut reply = AuditReply {
            rec_type,
            ..Default::default()
        };
        let len = text.len().min(MAX_AUDIT_MESSAGE_LENGTH);
        reply.msg.data[..len].copy_from_slice(&text[..len]);
        reply.len = len as u32;
        reply
    }

    /// The valid record text. A `len` beyond the data area clamps to
    /// [`MAX_AUDIT_MESSAGE_LENGTH`].
    pub fn data(&self) -> &[u8] {
        &self.msg.data[..(self.len as usize).min(MAX_AUDIT_MESSAGE_LENGTH)]
    }
}
