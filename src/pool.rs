//! Two-tier pooling of record buffers.
//!
//! Records arrive sized for the kernel's worst case but are almost
//! always short, so the pool routes bodies of up to
//! [`SMALL_BUF_LEN`][crate::consts::SMALL_BUF_LEN] bytes into
//! recycled inline buffers and gives everything else an exact-fit
//! allocation that is dropped again on recycle rather than hoarded.
//! Each tier has an independent cap on buffers in existence;
//! exhaustion yields [`None`] and the caller sheds the record instead
//! of blocking.
//!
//! # Design decisions
//! A single mutex covers both tiers. Holds are bounded by free-list
//! bookkeeping; the copy into an allocated buffer happens after the
//! lock is released, which is sound because the buffer is exclusively
//! owned from the moment it leaves the pool.

use derive_builder::Builder;
use getset::CopyGetters;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::{buffer::RecordBuffer, consts::SMALL_BUF_LEN};

/// Per-tier caps on buffers in existence. A cap of 0 makes the tier
/// unbounded and untracked.
#[derive(Builder, CopyGetters, Copy, Clone, Debug, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct PoolConfig {
    /// Cap on large exact-fit allocations.
    #[builder(default = "12")]
    #[getset(get_copy = "pub")]
    max_large_bufs: usize,
    /// Cap on small inline buffers, idle or held.
    #[builder(default = "32")]
    #[getset(get_copy = "pub")]
    max_small_bufs: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfigBuilder::default()
            .build()
            .expect("all fields have defaults")
    }
}

impl PoolConfig {
    /// Config with the same cap on both tiers, mostly for tests
    /// exercising exhaustion.
    pub fn with_cap(cap: usize) -> Self {
        PoolConfig {
            max_large_bufs: cap,
            max_small_bufs: cap,
        }
    }
}

struct PoolState {
    small_free: Vec<RecordBuffer>,
    num_small: usize,
    num_large: usize,
}

/// Pool of record buffers shared between a collector and the
/// consumers releasing its groups.
pub struct BufferPool {
    state: Mutex<PoolState>,
    config: PoolConfig,
}

impl Default for BufferPool {
    fn default() -> Self {
        BufferPool::new(PoolConfig::default())
    }
}

impl BufferPool {
    /// Create a pool with the given per-tier caps.
    pub fn new(config: PoolConfig) -> Self {
        BufferPool {
            state: Mutex::new(PoolState {
                small_free: Vec::new(),
                num_small: 0,
                num_large: 0,
            }),
            config,
        }
    }

    /// Take a buffer sized for a body of `body_len` bytes, from the
    /// small free list when possible. [`None`] when the tier's cap
    /// has been reached.
    fn take(&self, body_len: usize) -> Option<RecordBuffer> {
        let mut state = self.state.lock();
        if body_len <= SMALL_BUF_LEN {
            if let Some(buf) = state.small_free.pop() {
                trace!("Small buffer taken from free list, {} idle", state.small_free.len());
                return Some(buf);
            }
            if self.config.max_small_bufs != 0 {
                if state.num_small >= self.config.max_small_bufs {
                    debug!("Small buffer cap {} reached", self.config.max_small_bufs);
                    return None;
                }
                state.num_small += 1;
            }
            trace!("Small buffer allocated, {} in existence", state.num_small);
            Some(RecordBuffer::new_small())
        } else {
            if self.config.max_large_bufs != 0 {
                if state.num_large >= self.config.max_large_bufs {
                    debug!("Large buffer cap {} reached", self.config.max_large_bufs);
                    return None;
                }
                state.num_large += 1;
            }
            trace!("Large buffer of {} bytes allocated", body_len);
            Some(RecordBuffer::new_large(body_len))
        }
    }

    /// Move a raw record into a pool buffer: header and record text
    /// are copied, the body is NUL-terminated, and the preamble
    /// offset is set. Returns [`None`] when the tier's cap has been
    /// reached.
    pub fn alloc(
        &self,
        head: &[u8],
        body: &[u8],
        rec_type: u32,
        preamble_len: u32,
    ) -> Option<RecordBuffer> {
        let mut buf = self.take(body.len())?;
        buf.fill(head, body, rec_type, preamble_len);
        Some(buf)
    }

    /// Copy an existing record into a fresh pool buffer, preserving
    /// its header, type, and preamble offset.
    pub fn duplicate(&self, src: &RecordBuffer) -> Option<RecordBuffer> {
        let with_header = src.data_with_header();
        let (head, body) = with_header.split_at(crate::consts::NLMSG_HDR_LEN);
        let mut buf = self.take(body.len())?;
        buf.fill(head, body, src.rec_type(), src.preamble_offset());
        Some(buf)
    }

    /// Return a buffer to the pool. Small buffers are scrubbed and
    /// pushed onto the free list; large ones give their allocation
    /// back to the system and free up cap headroom.
    pub fn recycle(&self, mut buf: RecordBuffer) {
        buf.scrub();
        let mut state = self.state.lock();
        if buf.is_small() {
            state.small_free.push(buf);
            trace!("Small buffer recycled, {} idle", state.small_free.len());
        } else {
            state.num_large = state.num_large.saturating_sub(1);
            trace!("Large buffer dropped, {} outstanding", state.num_large);
        }
    }

    /// Number of idle buffers in the small free list.
    pub fn pool_size(&self) -> usize {
        self.state.lock().small_free.len()
    }

    /// Number of small buffers in existence, idle or held.
    pub fn small_count(&self) -> usize {
        self.state.lock().num_small
    }

    /// Number of large buffers currently held by groups.
    pub fn large_outstanding(&self) -> usize {
        self.state.lock().num_large
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{consts::NLMSG_HDR_LEN, test::setup};

    const REC1: &[u8] = b"audit(1566400380.354:266): arch=c000003e syscall=42 success=yes \
exit=0 a0=4 a1=7fdf339232a0 a2=6e a3=ffffffb4 items=1 ppid=115255 pid=97970 auid=4294967295 \
uid=0 gid=0 euid=0 suid=0 fsuid=0 egid=0 sgid=0 fsgid=0 tty=(none) ses=4294967295 \
comm=\"sshd\" exe=\"/usr/sbin/sshd\" key=(null)";

    const HEAD: [u8; NLMSG_HDR_LEN] = [0; NLMSG_HDR_LEN];

    #[test]
    fn test_small_pooling_under_cap() {
        setup();

        let pool = BufferPool::new(PoolConfig::with_cap(3));

        let buf1 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        let buf2 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        let buf3 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        assert!(pool.alloc(&HEAD, REC1, 1300, 27).is_none());
        assert_eq!(pool.pool_size(), 0);

        pool.recycle(buf3);
        assert_eq!(pool.pool_size(), 1);
        pool.recycle(buf1);
        assert_eq!(pool.pool_size(), 2);
        pool.recycle(buf2);
        assert_eq!(pool.pool_size(), 3);

        // free list drains before the cap bites again
        let buf1 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        assert_eq!(pool.pool_size(), 2);
        let buf2 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        assert_eq!(pool.pool_size(), 1);
        let buf3 = pool.alloc(&HEAD, REC1, 1300, 27).unwrap();
        assert_eq!(pool.pool_size(), 0);
        assert!(pool.alloc(&HEAD, REC1, 1300, 27).is_none());

        for buf in [buf1, buf2, buf3] {
            pool.recycle(buf);
        }
        assert_eq!(pool.small_count(), 3);
    }

    #[test]
    fn test_large_cap_and_release() {
        setup();

        let pool = BufferPool::new(PoolConfig::with_cap(2));
        let long = vec![b'a'; SMALL_BUF_LEN + 1];

        let buf1 = pool.alloc(&HEAD, &long, 1309, 0).unwrap();
        assert!(!buf1.is_small());
        let buf2 = pool.alloc(&HEAD, &long, 1309, 0).unwrap();
        assert!(pool.alloc(&HEAD, &long, 1309, 0).is_none());
        assert_eq!(pool.large_outstanding(), 2);

        // large buffers are not pooled; recycling frees cap headroom
        pool.recycle(buf1);
        assert_eq!(pool.large_outstanding(), 1);
        assert_eq!(pool.pool_size(), 0);
        let buf3 = pool.alloc(&HEAD, &long, 1309, 0).unwrap();

        pool.recycle(buf2);
        pool.recycle(buf3);
        assert_eq!(pool.large_outstanding(), 0);
    }

    #[test]
    fn test_outstanding_plus_free_bounded_by_cap() {
        setup();

        let pool = BufferPool::new(PoolConfig::with_cap(4));
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(pool.alloc(&HEAD, REC1, 1300, 27).unwrap());
        }
        pool.recycle(held.pop().unwrap());
        pool.recycle(held.pop().unwrap());
        for _ in 0..10 {
            let outstanding = pool.small_count() - pool.pool_size();
            assert!(outstanding + pool.pool_size() <= 4);
            held.push(pool.alloc(&HEAD, REC1, 1300, 27).unwrap());
        }
    }

    #[test]
    fn test_zero_cap_is_unbounded() {
        setup();

        let pool = BufferPool::new(PoolConfig::with_cap(0));
        let long = vec![b'a'; SMALL_BUF_LEN + 1];
        let mut held = Vec::new();
        for _ in 0..64 {
            held.push(pool.alloc(&HEAD, REC1, 1300, 27).unwrap());
            held.push(pool.alloc(&HEAD, &long, 1309, 0).unwrap());
        }
        assert_eq!(pool.small_count(), 0);
        assert_eq!(pool.large_outstanding(), 0);
    }

    #[test]
    fn test_duplicate_copies_header_and_body() {
        setup();

        let pool = BufferPool::default();
        let mut head = HEAD;
        head[4] = 0x14; // nlmsg_type 1300 low byte
        head[5] = 0x05;
        let buf = pool.alloc(&head, REC1, 1300, 27).unwrap();
        let dup = pool.duplicate(&buf).unwrap();

        assert_eq!(dup.rec_type(), buf.rec_type());
        assert_eq!(dup.size(), buf.size());
        assert_eq!(dup.data(), buf.data());
        assert_eq!(dup.data_with_header(), buf.data_with_header());
        assert_eq!(dup.preamble_offset(), buf.preamble_offset());
    }

    #[test]
    fn test_recycled_buffer_comes_back_scrubbed() {
        setup();

        let pool = BufferPool::new(PoolConfig::with_cap(1));
        let buf = pool.alloc(&[0xff; NLMSG_HDR_LEN], REC1, 1300, 27).unwrap();
        pool.recycle(buf);

        // free-list reuse must not leak the previous header
        let buf = pool.alloc(&HEAD, b"audit(1566400380.354:267): a=1", 1302, 27).unwrap();
        assert_eq!(buf.nl_header(), (0, 0));
        assert_eq!(buf.rec_type(), 1302);
        assert_eq!(buf.data(), b"a=1");
        pool.recycle(buf);
    }

    #[test]
    fn test_default_caps() {
        setup();

        let config = PoolConfig::default();
        assert_eq!(config.max_large_bufs(), 12);
        assert_eq!(config.max_small_bufs(), 32);

        let built = PoolConfigBuilder::default()
            .max_small_bufs(3)
            .build()
            .unwrap();
        assert_eq!(built.max_large_bufs(), 12);
        assert_eq!(built.max_small_bufs(), 3);
    }
}
