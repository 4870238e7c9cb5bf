//! Grouping of raw records into events by serial.
//!
//! The producer reads the audit netlink socket, fills an
//! [`AuditReply`], and hands it to
//! [`AuditCollector::on_record`]. The collector validates the
//! preamble, copies the record into a pool buffer, and appends it to
//! the open group while the serial stays the same. A serial change or
//! an end-of-event record closes the group, which is moved to the
//! listener from inside the producing call.
//!
//! # Design decisions
//! One mutex serializes `on_record` and `flush`; callers on different
//! threads interleave at record granularity, which is safe because
//! group transitions are driven entirely by observed serials. The
//! listener runs with that mutex held and must not call back into the
//! collector; hand the group somewhere else if processing needs to
//! re-enter.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    consts::AUDIT_EOE,
    dialect::DialectRegistry,
    err::ParseError,
    group::{GroupHeader, RecordGroup},
    pool::{BufferPool, PoolConfig},
    preamble,
    types::AuditReply,
};

struct CollectorState<L> {
    listener: L,
    current: Option<RecordGroup>,
}

/// Collects consecutive records sharing a serial into
/// [`RecordGroup`]s and hands each closed group to the listener.
///
/// The listener receives ownership and must finish with
/// [`RecordGroup::release`] so the buffers return to the pool.
pub struct AuditCollector<L> {
    state: Mutex<CollectorState<L>>,
    pool: Arc<BufferPool>,
    dialects: Arc<DialectRegistry>,
}

impl<L> AuditCollector<L>
where
    L: FnMut(RecordGroup),
{
    /// Create a collector with default pool caps and no dialects
    /// registered.
    pub fn new(listener: L) -> Self {
        AuditCollector::with_options(listener, PoolConfig::default(), DialectRegistry::new())
    }

    /// Create a collector with explicit pool caps and a prepared
    /// dialect registry.
    pub fn with_options(listener: L, config: PoolConfig, dialects: DialectRegistry) -> Self {
        AuditCollector {
            state: Mutex::new(CollectorState {
                listener,
                current: None,
            }),
            pool: Arc::new(BufferPool::new(config)),
            dialects: Arc::new(dialects),
        }
    }

    /// The buffer pool shared with emitted groups.
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// The dialect registry shared with emitted groups.
    pub fn dialects(&self) -> &Arc<DialectRegistry> {
        &self.dialects
    }

    /// Ingest one raw record.
    ///
    /// A record with a malformed preamble is dropped and reported as
    /// an error; the open group is unaffected. A record that cannot
    /// get a pool buffer is dropped silently. Closing a group invokes
    /// the listener before this call returns.
    pub fn on_record(&self, reply: &AuditReply) -> Result<(), ParseError> {
        let text = reply.data();
        let mut state = self.state.lock();

        let info = match preamble::parse(text) {
            Ok(info) => info,
            Err(err) => {
                debug!("Dropping type {} record: {}", reply.rec_type, err);
                return Err(err);
            }
        };
        let serial = info.serial_bytes(text);

        let same_serial = state
            .current
            .as_ref()
            .map_or(false, |group| group.serial().as_bytes() == serial);
        if !same_serial {
            Self::flush_state(&mut state);
            let header = GroupHeader::new(
                String::from_utf8_lossy(serial).into_owned(),
                info.tsec,
                info.tms,
            );
            debug!("Opened group {}", header.serial());
            state.current = Some(RecordGroup::new(
                header,
                Arc::clone(&self.pool),
                Arc::clone(&self.dialects),
            ));
        }

        match self
            .pool
            .alloc(&reply.msg.nlh, text, reply.rec_type, info.len as u32)
        {
            Some(buf) => {
                if let Some(group) = state.current.as_mut() {
                    group.push(buf);
                }
            }
            None => warn!(
                "Buffer pool exhausted, dropping type {} record of event {}",
                reply.rec_type,
                String::from_utf8_lossy(serial)
            ),
        }

        if reply.rec_type == AUDIT_EOE {
            Self::flush_state(&mut state);
        }
        Ok(())
    }

    /// Close the open group, if any, and hand it to the listener.
    /// Producers call this once after the record stream ends.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        Self::flush_state(&mut state);
    }

    fn flush_state(state: &mut CollectorState<L>) {
        if let Some(group) = state.current.take() {
            debug!(
                "Closing group {} with {} records",
                group.serial(),
                group.num_messages()
            );
            (state.listener)(group);
        }
    }
}
