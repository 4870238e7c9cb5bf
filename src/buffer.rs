//! Owned byte buffers holding one audit record each.
//!
//! A [`RecordBuffer`] stores the copied netlink header and record
//! text contiguously, in one of two storage tiers: an exact-fit heap
//! allocation for oversize records, or an inline 512-byte array for
//! the typical case. The tier is an explicit tag, never inferred from
//! observed capacity.
//!
//! # Design decisions
//! The body is always NUL-terminated one byte past its length, which
//! is why both tiers reserve one byte beyond their nominal capacity.
//! Buffers are value types owned by exactly one place at a time: the
//! pool free list or a [`RecordGroup`][crate::group::RecordGroup].

use byteorder::{ByteOrder, NativeEndian};

use crate::consts::{NLMSG_HDR_LEN, SMALL_BUF_LEN};

/// Total storage of a small-tier buffer: header, body, NUL.
const SMALL_STORAGE: usize = NLMSG_HDR_LEN + SMALL_BUF_LEN + 1;

/// Storage tier of a record buffer.
enum Storage {
    /// Exact-fit heap allocation sized at receipt.
    Large(Vec<u8>),
    /// Inline array for bodies up to [`SMALL_BUF_LEN`] bytes.
    Small(Box<[u8; SMALL_STORAGE]>),
}

/// An owned audit record: type tag, netlink header, preamble, and
/// body in one contiguous allocation.
pub struct RecordBuffer {
    rec_type: u32,
    len: u32,
    offset: u32,
    storage: Storage,
}

impl RecordBuffer {
    /// Create an empty small-tier buffer.
    pub(crate) fn new_small() -> Self {
        RecordBuffer {
            rec_type: 0,
            len: 0,
            offset: 0,
            storage: Storage::Small(Box::new([0; SMALL_STORAGE])),
        }
    }

    /// Create an empty large-tier buffer fitting a body of
    /// `body_len` bytes exactly.
    pub(crate) fn new_large(body_len: usize) -> Self {
        RecordBuffer {
            rec_type: 0,
            len: 0,
            offset: 0,
            storage: Storage::Large(vec![0; NLMSG_HDR_LEN + body_len + 1]),
        }
    }

    /// Copy header and record text in, set the type tag and preamble
    /// offset, and NUL-terminate the body.
    pub(crate) fn fill(&mut self, head: &[u8], body: &[u8], rec_type: u32, offset: u32) {
        debug_assert!(offset as usize <= body.len());
        debug_assert!(body.len() <= self.capacity());
        let storage = self.storage_mut();
        let head_len = head.len().min(NLMSG_HDR_LEN);
        storage[..head_len].copy_from_slice(&head[..head_len]);
        storage[NLMSG_HDR_LEN..NLMSG_HDR_LEN + body.len()].copy_from_slice(body);
        storage[NLMSG_HDR_LEN + body.len()] = 0;
        self.rec_type = rec_type;
        self.len = body.len() as u32;
        self.offset = offset;
    }

    /// Scrub the type tag, lengths, and header bytes before the
    /// buffer goes back to a free list.
    pub(crate) fn scrub(&mut self) {
        self.rec_type = 0;
        self.len = 0;
        self.offset = 0;
        self.storage_mut()[..NLMSG_HDR_LEN].fill(0);
    }

    fn storage(&self) -> &[u8] {
        match &self.storage {
            Storage::Large(vec) => vec,
            Storage::Small(arr) => &arr[..],
        }
    }

    fn storage_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Large(vec) => vec,
            Storage::Small(arr) => &mut arr[..],
        }
    }

    /// Whether this buffer lives in the small inline tier.
    pub fn is_small(&self) -> bool {
        matches!(self.storage, Storage::Small(_))
    }

    /// Audit record type of the stored record.
    pub fn rec_type(&self) -> u32 {
        self.rec_type
    }

    /// Body bytes after the preamble.
    pub fn data(&self) -> &[u8] {
        &self.storage()[NLMSG_HDR_LEN + self.offset as usize..NLMSG_HDR_LEN + self.len as usize]
    }

    /// Netlink header bytes followed by the full record text,
    /// preamble included.
    pub fn data_with_header(&self) -> &[u8] {
        &self.storage()[..NLMSG_HDR_LEN + self.len as usize]
    }

    /// Length of the body after the preamble.
    pub fn size(&self) -> usize {
        (self.len - self.offset) as usize
    }

    /// Body capacity of this buffer's storage tier.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Large(vec) => vec.len() - NLMSG_HDR_LEN - 1,
            Storage::Small(_) => SMALL_BUF_LEN,
        }
    }

    /// Byte offset within the record text at which the body begins.
    pub fn preamble_offset(&self) -> u32 {
        self.offset
    }

    /// Move the body start, usually to skip the preamble.
    ///
    /// `offset` must not exceed the record text length.
    pub fn set_offset(&mut self, offset: u32) {
        assert!(offset <= self.len);
        self.offset = offset;
    }

    /// Native-endian `(nlmsg_len, nlmsg_type)` from the stored
    /// netlink header.
    pub fn nl_header(&self) -> (u32, u16) {
        let head = &self.storage()[..NLMSG_HDR_LEN];
        (
            NativeEndian::read_u32(&head[..4]),
            NativeEndian::read_u16(&head[4..6]),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::test::setup;

    const PREAMBLE: &[u8] = b"audit(1566400380.354:266): ";

    #[test]
    fn test_small_fill_and_views() {
        setup();

        let text = [PREAMBLE, b"pid=97970 comm=\"sshd\""].concat();
        let mut head = [0u8; NLMSG_HDR_LEN];
        NativeEndian::write_u32(&mut head[..4], text.len() as u32 + NLMSG_HDR_LEN as u32);
        NativeEndian::write_u16(&mut head[4..6], 1300);

        let mut buf = RecordBuffer::new_small();
        buf.fill(&head, &text, 1300, PREAMBLE.len() as u32);

        assert!(buf.is_small());
        assert_eq!(buf.rec_type(), 1300);
        assert_eq!(buf.data(), b"pid=97970 comm=\"sshd\"");
        assert_eq!(buf.size(), text.len() - PREAMBLE.len());
        assert_eq!(buf.capacity(), SMALL_BUF_LEN);
        assert_eq!(buf.data_with_header().len(), NLMSG_HDR_LEN + text.len());
        assert_eq!(&buf.data_with_header()[..NLMSG_HDR_LEN], &head[..]);
        assert_eq!(
            buf.nl_header(),
            (text.len() as u32 + NLMSG_HDR_LEN as u32, 1300)
        );
    }

    #[test]
    fn test_large_exact_fit() {
        setup();

        let body = vec![b'x'; SMALL_BUF_LEN + 100];
        let text = [PREAMBLE, &body].concat();
        let mut buf = RecordBuffer::new_large(text.len());
        buf.fill(&[0; NLMSG_HDR_LEN], &text, 1309, PREAMBLE.len() as u32);

        assert!(!buf.is_small());
        assert_eq!(buf.capacity(), text.len());
        assert_eq!(buf.size(), body.len());
        assert_eq!(buf.data(), body.as_slice());
    }

    #[test]
    fn test_offset_within_len() {
        setup();

        let mut buf = RecordBuffer::new_small();
        buf.fill(&[0; NLMSG_HDR_LEN], b"audit(1566400380.354:266): ", 1320, 0);
        buf.set_offset(27);
        assert_eq!(buf.size(), 0);
        assert!(buf.data().is_empty());
    }

    #[test]
    #[should_panic]
    fn test_offset_past_len_panics() {
        let mut buf = RecordBuffer::new_small();
        buf.fill(&[0; NLMSG_HDR_LEN], b"abc=1", 1300, 0);
        buf.set_offset(6);
    }

    #[test]
    fn test_scrub_clears_meta_and_header() {
        setup();

        let mut buf = RecordBuffer::new_small();
        let head = [0xffu8; NLMSG_HDR_LEN];
        buf.fill(&head, b"audit(1566400380.354:266): x=1", 1300, 27);
        buf.scrub();
        assert_eq!(buf.rec_type(), 0);
        assert_eq!(buf.size(), 0);
        assert_eq!(buf.preamble_offset(), 0);
        assert_eq!(buf.nl_header(), (0, 0));
    }
}
