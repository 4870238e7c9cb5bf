//! Record-type-specific body scanning.
//!
//! Most audit records share the plain `key=value` grammar handled by
//! [`scan_fields`][crate::fields::scan_fields], but a few families
//! open with a free-form phrase instead of a key. A [`FieldDialect`]
//! owns the scanning for such a family; the [`DialectRegistry`] picks
//! the dialect for a record type, falling back to the default
//! grammar.
//!
//! # Design decisions
//! The registry is an explicit value shared by `Arc` between the
//! collector and the groups it emits, never process-global state:
//! tests and embedders register dialects on their own registry
//! without affecting anything else. Registration is expected at
//! startup; steady-state dispatch reads one relaxed atomic and skips
//! the mutex entirely while the registry is empty.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{
    consts::{AUDIT_AVC, AUDIT_SELINUX_LAST, AUDIT_USER_AVC},
    err::ParseError,
    fields::{scan_fields, scan_fields_from, FieldKey, FieldMap, FieldSpan},
};

/// A body scanner for a family of record types.
pub trait FieldDialect: Send {
    /// Whether this dialect scans bodies of `rec_type`.
    fn handles_type(&self, rec_type: u32) -> bool;

    /// Scan `body` into `dest`. Spans are relative to the body start.
    /// On error, fields scanned so far stay in `dest`.
    fn scan(&self, rec_type: u32, body: &[u8], dest: &mut FieldMap) -> Result<(), ParseError>;
}

/// Registry of dialects consulted per record type, with the plain
/// `key=value` grammar as fallback.
#[derive(Default)]
pub struct DialectRegistry {
    dialects: Mutex<Vec<Box<dyn FieldDialect>>>,
    nonempty: AtomicBool,
}

impl DialectRegistry {
    /// Create an empty registry; every record type falls back to the
    /// default grammar.
    pub fn new() -> Self {
        DialectRegistry::default()
    }

    /// Create a registry with the SELinux dialect registered.
    pub fn with_selinux() -> Self {
        let registry = DialectRegistry::new();
        registry.register(Box::new(SelinuxDialect));
        registry
    }

    /// Register a dialect. Later registrations are consulted after
    /// earlier ones; the first match wins.
    pub fn register(&self, dialect: Box<dyn FieldDialect>) {
        let mut dialects = self.dialects.lock();
        dialects.push(dialect);
        self.nonempty.store(true, Ordering::Relaxed);
    }

    /// Scan `body` with the dialect registered for `rec_type`, or the
    /// default grammar when none matches.
    pub fn scan_fields(
        &self,
        rec_type: u32,
        body: &[u8],
        dest: &mut FieldMap,
    ) -> Result<(), ParseError> {
        if self.nonempty.load(Ordering::Relaxed) {
            let dialects = self.dialects.lock();
            for dialect in dialects.iter() {
                if dialect.handles_type(rec_type) {
                    return dialect.scan(rec_type, body, dest);
                }
            }
        }
        scan_fields(body, dest)
    }
}

/// Dialect for SELinux records, whose bodies open with a phrase such
/// as `avc: denied { rename } for ` before the first `key=value`
/// pair. The phrase is converted into synthetic fields:
///
/// * `avc: STATUS { OP } for` becomes `_avc_status` and `_avc_op`;
/// * `policy STATUS` becomes `_policy_status`;
/// * any single-word prefix (`user`, `netlabel:`) becomes
///   `_sel_prefix`, kept verbatim including a trailing colon.
///
/// The rest of the body parses with the default grammar.
pub struct SelinuxDialect;

/// Synthetic key carrying the AVC grant/deny status.
pub const AVC_STATUS_KEY: &str = "_avc_status";
/// Synthetic key carrying the AVC operation from the braced pair.
pub const AVC_OP_KEY: &str = "_avc_op";
/// Synthetic key carrying the status word of a `policy` record.
pub const POLICY_STATUS_KEY: &str = "_policy_status";
/// Synthetic key carrying an unrecognized record prefix.
pub const SEL_PREFIX_KEY: &str = "_sel_prefix";

impl FieldDialect for SelinuxDialect {
    fn handles_type(&self, rec_type: u32) -> bool {
        rec_type == AUDIT_USER_AVC || (AUDIT_AVC..=AUDIT_SELINUX_LAST).contains(&rec_type)
    }

    fn scan(&self, _rec_type: u32, body: &[u8], dest: &mut FieldMap) -> Result<(), ParseError> {
        let first_eq = match body.iter().position(|&c| c == b'=') {
            Some(p) => p,
            None => return Ok(()),
        };
        // The actual first key is the text after the last space before
        // '='; everything before it is the dialect prefix.
        let resume = match body[..first_eq].iter().rposition(|&c| c == b' ') {
            Some(space) => {
                scan_intro(body, space, dest);
                space + 1
            }
            None => 0,
        };
        scan_fields_from(body, resume, dest)
    }
}

/// Convert the prefix `body[..prefix_len]` into synthetic fields.
fn scan_intro(body: &[u8], prefix_len: usize, dest: &mut FieldMap) {
    let prefix = &body[..prefix_len];
    let word_end = prefix
        .iter()
        .position(|&c| c == b' ')
        .unwrap_or(prefix.len());

    match &prefix[..word_end] {
        b"avc:" => {
            if let Some((status, op)) = split_avc(prefix, word_end) {
                dest.insert(body, FieldKey::Name(AVC_STATUS_KEY), status, false);
                dest.insert(body, FieldKey::Name(AVC_OP_KEY), op, false);
                return;
            }
        }
        b"policy" => {
            let status = &prefix[(word_end + 1).min(prefix.len())..];
            if !status.is_empty() && !status.contains(&b' ') {
                dest.insert(
                    body,
                    FieldKey::Name(POLICY_STATUS_KEY),
                    FieldSpan::new(word_end + 1, status.len()),
                    false,
                );
                return;
            }
        }
        _ => {}
    }
    dest.insert(
        body,
        FieldKey::Name(SEL_PREFIX_KEY),
        FieldSpan::new(0, prefix_len),
        false,
    );
}

/// Locate `STATUS` and the braced `{ OP }` of an `avc:` prefix.
/// Returns spans relative to the body start.
fn split_avc(prefix: &[u8], avc_end: usize) -> Option<(FieldSpan, FieldSpan)> {
    let status_start = avc_end + 1;
    if status_start >= prefix.len() {
        return None;
    }
    let status_len = prefix[status_start..]
        .iter()
        .position(|&c| c == b' ')
        .unwrap_or(prefix.len() - status_start);
    if status_len == 0 {
        return None;
    }

    let lbrace = prefix.iter().position(|&c| c == b'{')?;
    let rbrace = prefix[lbrace..].iter().position(|&c| c == b'}')? + lbrace;
    let mut op_start = lbrace + 1;
    let mut op_end = rbrace;
    while op_start < op_end && prefix[op_start] == b' ' {
        op_start += 1;
    }
    while op_end > op_start && prefix[op_end - 1] == b' ' {
        op_end -= 1;
    }
    if op_start == op_end {
        return None;
    }

    Some((
        FieldSpan::new(status_start, status_len),
        FieldSpan::new(op_start, op_end - op_start),
    ))
}
