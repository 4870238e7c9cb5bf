//! Zero-copy scanning of the `key=value` record body.
//!
//! Since the consumer decides late which fields it wants, scanning
//! only notes byte offsets of each value; value strings are
//! materialized on lookup by
//! [`RecordGroup::get_field`][crate::group::RecordGroup::get_field].
//!
//! # Design decisions
//! [`FieldMap`] is a flat insertion-ordered array searched linearly:
//! records carry a few dozen fields at most, and keeping body order
//! intact is what makes argv reconstruction
//! ([`RecordGroup::concat_values`][crate::group::RecordGroup::concat_values])
//! possible. Keys stay borrowed as spans of the scanned body; only the
//! synthesized SELinux fields carry static names. A 6-bit rolling hash
//! over the key prefilters the linear search.

use crate::err::ParseError;

const fn build_alnum_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    let mut i = 0;
    while i < 10 {
        lut[b'0' as usize + i] = i as u8;
        i += 1;
    }
    let mut i = 0;
    while i < 26 {
        lut[b'A' as usize + i] = 10 + i as u8;
        lut[b'a' as usize + i] = 10 + i as u8;
        i += 1;
    }
    lut[b'_' as usize] = 37;
    lut
}

static ALNUM_LUT: [u8; 256] = build_alnum_lut();

/// Rolling 6-bit hash of a field key, used to prefilter the linear
/// entry search.
pub fn key_hash(key: &[u8]) -> u64 {
    key.iter()
        .fold(0u64, |hash, &c| hash << 6 | ALNUM_LUT[c as usize] as u64)
}

/// A byte range within a record body.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldSpan {
    /// Offset of the first byte relative to the body start.
    pub start: u32,
    /// Number of bytes in the span.
    pub len: u32,
}

impl FieldSpan {
    /// Create a span from byte positions within a body.
    pub fn new(start: usize, len: usize) -> Self {
        FieldSpan {
            start: start as u32,
            len: len as u32,
        }
    }

    /// Resolve the span against the body it was scanned from.
    pub fn bytes<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        &body[self.start as usize..(self.start + self.len) as usize]
    }
}

/// The key of a scanned field: a span of the body, or a static name
/// for fields synthesized by a dialect.
#[derive(Copy, Clone, Debug)]
pub enum FieldKey {
    /// Key text present in the body.
    Span(FieldSpan),
    /// Key synthesized by a dialect, such as `_avc_status`.
    Name(&'static str),
}

impl FieldKey {
    /// Resolve the key text against the body it was scanned from.
    pub fn bytes<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        match self {
            FieldKey::Span(span) => span.bytes(body),
            FieldKey::Name(name) => name.as_bytes(),
        }
    }
}

/// One scanned field: hashed key, value offsets, and whether the
/// value was double-quoted in the body.
#[derive(Clone, Debug)]
pub struct FieldEntry {
    hash: u64,
    key: FieldKey,
    /// Offsets of the value within the body. For quoted values the
    /// span covers the contents inside the quotes.
    pub value: FieldSpan,
    /// Whether the value was double-quoted. Bare values consisting of
    /// hex digits signal hex-encoded bytes.
    pub quoted: bool,
}

impl FieldEntry {
    /// Resolve the key text against the owning body.
    pub fn key_bytes<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        self.key.bytes(body)
    }

    /// Resolve the value bytes against the owning body.
    pub fn value_bytes<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        self.value.bytes(body)
    }
}

/// Map from field key to value offsets for one scanned record body.
///
/// Inserting an existing key overwrites the stored value in place, so
/// lookups observe the last occurrence while iteration order stays
/// the order of first appearance.
#[derive(Clone, Debug, Default)]
pub struct FieldMap {
    entries: Vec<FieldEntry>,
}

impl FieldMap {
    /// Create an empty field map.
    pub fn new() -> Self {
        FieldMap::default()
    }

    /// Insert a scanned field, overwriting any entry with the same
    /// key.
    pub fn insert(&mut self, body: &[u8], key: FieldKey, value: FieldSpan, quoted: bool) {
        let key_bytes = key.bytes(body);
        let hash = key_hash(key_bytes);
        for entry in self.entries.iter_mut() {
            if entry.hash == hash && entry.key.bytes(body) == key_bytes {
                entry.value = value;
                entry.quoted = quoted;
                return;
            }
        }
        self.entries.push(FieldEntry {
            hash,
            key,
            value,
            quoted,
        });
    }

    /// Look up a field by key name.
    pub fn get(&self, body: &[u8], name: &str) -> Option<&FieldEntry> {
        let hash = key_hash(name.as_bytes());
        self.entries
            .iter()
            .find(|entry| entry.hash == hash && entry.key.bytes(body) == name.as_bytes())
    }

    /// Iterate entries in body order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldEntry> {
        self.entries.iter()
    }

    /// Number of scanned fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no fields have been scanned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Scan a record body into `dest` without copying any value text.
///
/// The cursor walks `key=value` pairs separated by single spaces.
/// A value is either bare (terminated by space or end of body) or
/// double-quoted; quoted contents may contain spaces. An empty key
/// before `=` is accepted. A body ending directly after `=`, or
/// inside an unterminated quoted value, yields
/// [`ParseError::BadField`]; fields scanned before the error are
/// retained in `dest`.
pub fn scan_fields(body: &[u8], dest: &mut FieldMap) -> Result<(), ParseError> {
    scan_fields_from(body, 0, dest)
}

/// Scan `body` starting at byte `start`, recording spans relative to
/// the body start. Dialects use this to resume default scanning after
/// consuming a non-`key=value` intro.
pub(crate) fn scan_fields_from(
    body: &[u8],
    start: usize,
    dest: &mut FieldMap,
) -> Result<(), ParseError> {
    let end = body.len();
    let mut start = start;
    while start < end {
        let mut p = start;
        while p < end && body[p] != b'=' {
            p += 1;
        }
        if p == end {
            break;
        }
        let key_end = p;
        p += 1;
        if p == end {
            return Err(ParseError::BadField);
        }
        let mut value_start = p;
        let quoted = body[p] == b'"';
        if quoted {
            p += 1;
            value_start = p;
            while p < end && body[p] != b'"' {
                p += 1;
            }
            if p == end {
                return Err(ParseError::BadField);
            }
        } else {
            while p < end && body[p] != b' ' {
                p += 1;
            }
        }
        dest.insert(
            body,
            FieldKey::Span(FieldSpan::new(start, key_end - start)),
            FieldSpan::new(value_start, p - value_start),
            quoted,
        );
        start = p + if quoted { 2 } else { 1 };
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::test::setup;

    const BODY: &[u8] =
        b"arch=c000003e syscall=42 success=yes exit=0 tty=(none) comm=\"sshd\" exe=\"/usr/sbin/sshd\" key=(null)";

    fn value(map: &FieldMap, body: &[u8], name: &str) -> String {
        String::from_utf8_lossy(map.get(body, name).unwrap().value_bytes(body)).into_owned()
    }

    #[test]
    fn test_scan_basic() {
        setup();

        let mut map = FieldMap::new();
        scan_fields(BODY, &mut map).unwrap();
        assert_eq!(map.len(), 8);
        assert_eq!(value(&map, BODY, "arch"), "c000003e");
        assert_eq!(value(&map, BODY, "syscall"), "42");
        assert_eq!(value(&map, BODY, "comm"), "sshd");
        assert_eq!(value(&map, BODY, "exe"), "/usr/sbin/sshd");
        assert_eq!(value(&map, BODY, "key"), "(null)");
        assert!(map.get(BODY, "pid").is_none());
    }

    #[test]
    fn test_quoted_value_spans_spaces() {
        setup();

        let body = b"cwd=\"/home/user/my stuff\" item=0";
        let mut map = FieldMap::new();
        scan_fields(body, &mut map).unwrap();
        assert_eq!(value(&map, body, "cwd"), "/home/user/my stuff");
        assert!(map.get(body, "cwd").unwrap().quoted);
        assert_eq!(value(&map, body, "item"), "0");
        assert!(!map.get(body, "item").unwrap().quoted);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        setup();

        let body = b"item=0 item=1 name=\"/etc\"";
        let mut map = FieldMap::new();
        scan_fields(body, &mut map).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(value(&map, body, "item"), "1");
        // position of the first occurrence is kept
        assert_eq!(map.iter().next().unwrap().key_bytes(body), b"item");
    }

    #[test]
    fn test_empty_key_accepted() {
        setup();

        let body = b"=orphan pid=1";
        let mut map = FieldMap::new();
        scan_fields(body, &mut map).unwrap();
        assert_eq!(value(&map, body, ""), "orphan");
        assert_eq!(value(&map, body, "pid"), "1");
    }

    #[test]
    fn test_trailing_equals_is_error_fields_retained() {
        setup();

        let body = b"pid=97970 comm=";
        let mut map = FieldMap::new();
        assert_eq!(scan_fields(body, &mut map), Err(ParseError::BadField));
        assert_eq!(value(&map, body, "pid"), "97970");
        assert!(map.get(body, "comm").is_none());
    }

    #[test]
    fn test_unterminated_quote_is_error_fields_retained() {
        setup();

        let body = b"pid=97970 exe=\"/usr/sbin/sshd";
        let mut map = FieldMap::new();
        assert_eq!(scan_fields(body, &mut map), Err(ParseError::BadField));
        assert_eq!(value(&map, body, "pid"), "97970");
        assert!(map.get(body, "exe").is_none());
    }

    #[test]
    fn test_trailing_word_without_equals_ignored() {
        setup();

        let body = b"pid=97970 trailing";
        let mut map = FieldMap::new();
        scan_fields(body, &mut map).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_values_reassemble_body() {
        setup();

        let mut map = FieldMap::new();
        scan_fields(BODY, &mut map).unwrap();
        let reassembled = map
            .iter()
            .map(|entry| {
                format!(
                    "{}={}",
                    String::from_utf8_lossy(entry.key_bytes(BODY)),
                    String::from_utf8_lossy(entry.value_bytes(BODY))
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let unquoted = String::from_utf8_lossy(BODY).replace('"', "");
        assert_eq!(reassembled, unquoted);
    }
}
