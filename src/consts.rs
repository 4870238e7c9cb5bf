//! Constants for the audit netlink record stream.
//!
//! # High level notes
//!
//! The values in this module come from the Linux kernel headers,
//! primarily `linux/audit.h`. Record type codes identify what kind of
//! information a record carries; one kernel event (a *group* in this
//! library) is a run of records sharing a serial number, closed by a
//! record of type [`AUDIT_EOE`].
//!
//! Address family constants are re-exported from [`libc`] narrowed to
//! the `u8` width in which they appear in hex-encoded `saddr` fields.

use std::mem::size_of;

/// Maximum length of the data portion of an audit message as defined
/// by `MAX_AUDIT_MESSAGE_LENGTH` in `linux/audit.h`.
pub const MAX_AUDIT_MESSAGE_LENGTH: usize = 8970;

/// Size of the netlink header copied alongside each record body for
/// passthrough to downstream consumers.
pub const NLMSG_HDR_LEN: usize = size_of::<libc::nlmsghdr>();

/// Capacity of the small pooled buffer that holds most records after
/// the initial receipt copy.
pub const SMALL_BUF_LEN: usize = 512;

/// Syscall entry record.
pub const AUDIT_SYSCALL: u32 = 1300;
/// Filesystem path record.
pub const AUDIT_PATH: u32 = 1302;
/// Socket address record; carries a hex-encoded `saddr` field.
pub const AUDIT_SOCKADDR: u32 = 1306;
/// Current working directory record.
pub const AUDIT_CWD: u32 = 1307;
/// `execve` argument list record; carries `argc` and `a0..aN` fields.
pub const AUDIT_EXECVE: u32 = 1309;
/// End-of-event terminator record. Contains no fields.
pub const AUDIT_EOE: u32 = 1320;
/// Process title record.
pub const AUDIT_PROCTITLE: u32 = 1327;
/// User space AVC message, parsed with the SELinux dialect.
pub const AUDIT_USER_AVC: u32 = 1107;
/// First SELinux kernel record type (AVC denial/grant).
pub const AUDIT_AVC: u32 = 1400;
/// Last record type handled by the SELinux dialect.
pub const AUDIT_SELINUX_LAST: u32 = 1450;

/// Address family of unix domain sockets in `saddr` fields.
pub const AF_UNIX: u8 = libc::AF_UNIX as u8;
/// Address family of IPv4 sockets in `saddr` fields.
pub const AF_INET: u8 = libc::AF_INET as u8;
/// Address family of IPv6 sockets in `saddr` fields.
pub const AF_INET6: u8 = libc::AF_INET6 as u8;
