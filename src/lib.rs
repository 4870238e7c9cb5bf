//! # Grouped, lazy parsing for the audit netlink firehose
//!
//! ## Rationale
//!
//! The kernel audit subsystem describes one syscall with a burst of
//! separate netlink records sharing a serial number, each sized for
//! the worst case and each carrying far more fields than any consumer
//! reads. This crate turns that stream back into events without
//! paying for what the consumer ignores: records are grouped by
//! serial, bodies are scanned into byte offsets only when a field is
//! first requested, and value strings are materialized per lookup.
//! Buffers come from a capped two-tier pool so a burst cannot grow
//! the process unboundedly.
//!
//! ## The project is broken down into the following modules:
//! * `buffer` - Owned record buffers with an explicit small/large
//!   storage tier tag.
//! * `collector` - The grouping state machine fed by the producer
//!   that reads the socket.
//! * `consts` - Kernel constants for record types, message sizing,
//!   and address families.
//! * `dialect` - Per-record-type body scanners and their registry;
//!   includes the SELinux dialect.
//! * `err` - The parse error type shared across the crate.
//! * `fields` - The zero-copy `key=value` scanner and the offset map
//!   it fills.
//! * `group` - One assembled event with lazy field lookup, argv
//!   reconstruction, and nested-payload expansion.
//! * `hex` - Decoding of the hex runs audit uses for unprintable
//!   values.
//! * `pool` - The two-tier buffer pool shared by the collector and
//!   the consumers releasing groups.
//! * `preamble` - Parsing of the `audit(<sec>.<ms>:<serial>): `
//!   prefix.
//! * `sockaddr` - Decoding of hex-encoded `saddr` fields.
//! * `types` - The in-memory mirror of the kernel's `audit_reply`.
//!
//! ## Design decisions
//!
//! This library never touches a socket: the producer owns the netlink
//! read loop and hands each raw reply to
//! [`AuditCollector::on_record`][crate::collector::AuditCollector::on_record].
//! Groups are moved to the listener, which owns them until it calls
//! [`RecordGroup::release`][crate::group::RecordGroup::release] to
//! hand the buffers back. Everything runs synchronously on the
//! producer's thread; the only locks are the pool's and the
//! collector's, and neither is held across I/O.
//!
//! ## Examples
//!
//! Feeding records and looking up fields on the resulting group:
//!
//! ```
//! use auditrec::{collector::AuditCollector, consts::AUDIT_SYSCALL, types::AuditReply};
//!
//! let collector = AuditCollector::new(|mut group| {
//!     assert_eq!(group.serial(), "266");
//!     assert_eq!(group.get_field("pid", AUDIT_SYSCALL).as_deref(), Some("97970"));
//!     group.release();
//! });
//!
//! let reply = AuditReply::from_parts(
//!     AUDIT_SYSCALL,
//!     b"audit(1566400380.354:266): syscall=42 pid=97970 comm=\"sshd\"",
//! );
//! collector.on_record(&reply).unwrap();
//! collector.flush();
//! ```
//!
//! Consumers that care about SELinux records register the dialect on
//! their own registry instead of mutating global state:
//!
//! ```
//! use auditrec::{
//!     collector::AuditCollector,
//!     dialect::DialectRegistry,
//!     pool::PoolConfig,
//!     types::AuditReply,
//! };
//!
//! let collector = AuditCollector::with_options(
//!     |mut group| {
//!         assert_eq!(group.get_field("_avc_status", 0).as_deref(), Some("denied"));
//!         group.release();
//!     },
//!     PoolConfig::default(),
//!     DialectRegistry::with_selinux(),
//! );
//!
//! let reply = AuditReply::from_parts(
//!     1400,
//!     b"audit(1242575005.122:101): avc: denied { rename } for pid=2508 comm=\"vi\"",
//! );
//! collector.on_record(&reply).unwrap();
//! collector.flush();
//! ```

#![deny(missing_docs)]

pub mod buffer;
pub mod collector;
pub mod consts;
pub mod dialect;
pub mod err;
pub mod fields;
pub mod group;
pub mod hex;
pub mod pool;
pub mod preamble;
pub mod sockaddr;
pub mod types;

pub use crate::consts::{AUDIT_EOE, MAX_AUDIT_MESSAGE_LENGTH};
