//! Decoding of hex-encoded `saddr` fields from socket call records.
//!
//! The kernel dumps the raw `sockaddr` bytes of `connect`/`bind`/
//! `sendto` calls as a hex run. Only the families a security consumer
//! acts on are decoded; anything else (netlink, packet sockets, the
//! all-zero placeholder) is reported as unknown for the caller to
//! discard.

use getset::{CopyGetters, Getters};

use crate::{
    consts::{AF_INET, AF_INET6, AF_UNIX},
    err::ParseError,
    hex,
};

/// A decoded socket address. `family` selects which of the address
/// representations is populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Getters, CopyGetters)]
pub struct SockAddrInfo {
    /// Address family byte, one of [`AF_UNIX`], [`AF_INET`],
    /// [`AF_INET6`].
    #[getset(get_copy = "pub")]
    family: u8,
    /// Port for the inet families.
    #[getset(get_copy = "pub")]
    port: u32,
    /// IPv4 address in the byte order the kernel wrote it; render
    /// with [`ip4_from_saddr`].
    #[getset(get_copy = "pub")]
    addr4: u32,
    /// IPv6 address as eight lowercase colon-separated groups.
    #[getset(get = "pub")]
    addr6: String,
    /// Unix socket path, still hex-encoded as it appeared in the
    /// record.
    #[getset(get = "pub")]
    socketid: String,
}

/// Minimum hex length of an IPv4 `saddr`: family, pad, port, address.
const MIN_INET: usize = 16;
/// Minimum hex length of an IPv6 `saddr`: the fixed prefix plus eight
/// 16-bit groups.
const MIN_INET6: usize = 16 + 32;

/// Decode a hex-encoded `saddr` value.
///
/// Fails with [`ParseError::BadSockAddr`] when the run is too short
/// for its family and [`ParseError::UnknownFamily`] for families this
/// library does not decode.
pub fn parse_sockaddr(saddr: &[u8]) -> Result<SockAddrInfo, ParseError> {
    if saddr.len() <= 4 {
        return Err(ParseError::BadSockAddr);
    }

    let mut info = SockAddrInfo {
        family: hex::parse_u8(saddr),
        ..Default::default()
    };

    match info.family {
        AF_INET => {
            if saddr.len() < MIN_INET {
                return Err(ParseError::BadSockAddr);
            }
            info.port = hex::parse_u16(&saddr[4..]) as u32;
            info.addr4 = hex::parse_u32(&saddr[8..]);
        }
        AF_INET6 => {
            if saddr.len() < MIN_INET6 {
                return Err(ParseError::BadSockAddr);
            }
            info.port = hex::parse_u16(&saddr[4..]) as u32;
            let mut addr6 = String::with_capacity(39);
            for (i, group) in saddr[16..16 + 32].chunks_exact(4).enumerate() {
                for &c in group {
                    addr6.push(c.to_ascii_lowercase() as char);
                }
                if i == 0 || i % 7 != 0 {
                    addr6.push(':');
                }
            }
            info.addr6 = addr6;
        }
        AF_UNIX => {
            if saddr.len() <= 6 {
                return Err(ParseError::BadSockAddr);
            }
            // a leading 00 pair marks an abstract socket name
            let begin = if &saddr[4..6] == b"00" { 6 } else { 4 };
            let end = saddr[begin..]
                .windows(2)
                .position(|pair| pair == b"00")
                .map_or(saddr.len(), |pos| begin + pos);
            info.socketid = String::from_utf8_lossy(&saddr[begin..end]).into_owned();
        }
        family => return Err(ParseError::UnknownFamily(family)),
    }
    Ok(info)
}

/// Render an [`addr4`][SockAddrInfo::addr4] as a dotted quad.
///
/// The kernel hex-encodes the address bytes in the order they sit in
/// memory, not network order, so `inet_ntoa`-style helpers do not
/// apply.
pub fn ip4_from_saddr(addr: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        (addr >> 24) & 0xff,
        (addr >> 16) & 0xff,
        (addr >> 8) & 0xff,
        addr & 0xff
    )
}
