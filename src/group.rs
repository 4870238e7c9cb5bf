//! One assembled audit event: contiguous records sharing a serial.
//!
//! A [`RecordGroup`] owns the pooled buffers of its records and is
//! moved to the listener when the collector closes the event. Field
//! access is lazy: a record's body is scanned into offsets the first
//! time any lookup touches it, and value strings are only
//! materialized for the fields actually requested.
//!
//! The listener must finish with [`RecordGroup::release`], which
//! consumes the group and returns every buffer to the pool. A group
//! that is dropped instead frees its memory but leaves the pool's
//! small free list unreplenished.

use std::{collections::HashMap, sync::Arc};

use getset::{CopyGetters, Getters};
use log::debug;

use crate::{
    buffer::RecordBuffer,
    dialect::DialectRegistry,
    fields::{scan_fields, FieldMap, FieldSpan},
    hex,
    pool::BufferPool,
};

/// Serial and timestamp shared by every record of a group.
#[derive(Getters, CopyGetters, Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupHeader {
    /// Event serial, compared as a byte string.
    #[getset(get = "pub")]
    serial: String,
    /// Event timestamp, whole seconds.
    #[getset(get_copy = "pub")]
    tsec: u64,
    /// Event timestamp, millisecond part.
    #[getset(get_copy = "pub")]
    tms: u32,
}

impl GroupHeader {
    pub(crate) fn new(serial: String, tsec: u64, tms: u32) -> Self {
        GroupHeader { serial, tsec, tms }
    }
}

/// A record plus its lazily built field offsets.
struct RecordState {
    buf: RecordBuffer,
    fields: FieldMap,
    scanned: bool,
}

/// The records of one kernel event, with lazy field lookup.
pub struct RecordGroup {
    header: GroupHeader,
    records: Vec<RecordState>,
    pool: Arc<BufferPool>,
    dialects: Arc<DialectRegistry>,
}

impl RecordGroup {
    pub(crate) fn new(
        header: GroupHeader,
        pool: Arc<BufferPool>,
        dialects: Arc<DialectRegistry>,
    ) -> Self {
        RecordGroup {
            header,
            records: Vec::new(),
            pool,
            dialects,
        }
    }

    pub(crate) fn push(&mut self, buf: RecordBuffer) {
        self.records.push(RecordState {
            buf,
            fields: FieldMap::new(),
            scanned: false,
        });
    }

    /// The group header.
    pub fn header(&self) -> &GroupHeader {
        &self.header
    }

    /// Event serial shared by all records.
    pub fn serial(&self) -> &str {
        self.header.serial()
    }

    /// Event timestamp, whole seconds.
    pub fn time_seconds(&self) -> u64 {
        self.header.tsec()
    }

    /// Event timestamp, millisecond part.
    pub fn time_ms(&self) -> u32 {
        self.header.tms()
    }

    /// Number of records in the group.
    pub fn num_messages(&self) -> usize {
        self.records.len()
    }

    /// The `i`th record in arrival order.
    pub fn message(&self, i: usize) -> Option<&RecordBuffer> {
        self.records.get(i).map(|state| &state.buf)
    }

    /// The first record with type `rec_type`.
    pub fn message_of_type(&self, rec_type: u32) -> Option<&RecordBuffer> {
        self.records
            .iter()
            .map(|state| &state.buf)
            .find(|buf| buf.rec_type() == rec_type)
    }

    /// Record type of the first record, or 0 for an empty group.
    pub fn rec_type(&self) -> u32 {
        self.records.first().map_or(0, |state| state.buf.rec_type())
    }

    /// Scan the record's body on first touch; scan errors keep the
    /// fields found before the error.
    fn ensure_scanned(&mut self, idx: usize) {
        if self.records[idx].scanned {
            return;
        }
        let dialects = Arc::clone(&self.dialects);
        let state = &mut self.records[idx];
        state.scanned = true;
        if let Err(err) =
            dialects.scan_fields(state.buf.rec_type(), state.buf.data(), &mut state.fields)
        {
            debug!(
                "Field scan of type {} record stopped: {}",
                state.buf.rec_type(),
                err
            );
        }
    }

    /// Locate the `nth` record (among those matching `rec_type`, 0 =
    /// all types) carrying `name`, returning the record index and the
    /// value's span.
    fn find_field(&mut self, name: &str, rec_type: u32, nth: usize) -> Option<(usize, FieldSpan, bool)> {
        let mut hits = 0;
        for idx in 0..self.records.len() {
            if rec_type != 0 && self.records[idx].buf.rec_type() != rec_type {
                continue;
            }
            self.ensure_scanned(idx);
            let state = &self.records[idx];
            if let Some(entry) = state.fields.get(state.buf.data(), name) {
                if hits == nth {
                    return Some((idx, entry.value, entry.quoted));
                }
                hits += 1;
            }
        }
        None
    }

    fn materialize(&self, idx: usize, span: FieldSpan) -> String {
        String::from_utf8_lossy(span.bytes(self.records[idx].buf.data())).into_owned()
    }

    /// Look up a field by name across the group's records in arrival
    /// order. `rec_type` 0 searches every record; otherwise only
    /// records of that type are considered.
    pub fn get_field(&mut self, name: &str, rec_type: u32) -> Option<String> {
        self.get_field_nth(name, rec_type, 0)
    }

    /// Like [`get_field`][RecordGroup::get_field], returning the
    /// occurrence in the `nth` matching record instead of the first.
    pub fn get_field_nth(&mut self, name: &str, rec_type: u32, nth: usize) -> Option<String> {
        self.find_field(name, rec_type, nth)
            .map(|(idx, span, _)| self.materialize(idx, span))
    }

    /// Look up a field whose value may be a hex-encoded path. An
    /// unquoted hex run is decoded; any other value is returned
    /// verbatim, including hex that fails to decode.
    pub fn get_path_field(&mut self, name: &str, rec_type: u32) -> Option<String> {
        let (idx, span, quoted) = self.find_field(name, rec_type, 0)?;
        let state = &self.records[idx];
        let bytes = span.bytes(state.buf.data());
        if !quoted && hex::is_hex(bytes) {
            if let Ok(decoded) = hex::hex_to_ascii(bytes) {
                return Some(String::from_utf8_lossy(&decoded).into_owned());
            }
        }
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Expand a nested `key='subkey=v subkey=v'` payload: the value
    /// of `name` is rescanned with the default grammar and each
    /// sub-field is copied into `dest` as owned strings. Returns
    /// whether the outer field was found.
    pub fn expand_field(
        &mut self,
        name: &str,
        rec_type: u32,
        dest: &mut HashMap<String, String>,
    ) -> bool {
        let value = match self.get_field(name, rec_type) {
            Some(value) => value,
            None => return false,
        };
        let body = value.as_bytes();
        let mut map = FieldMap::new();
        if let Err(err) = scan_fields(body, &mut map) {
            debug!("Nested scan of field {name} stopped: {err}");
        }
        for entry in map.iter() {
            dest.insert(
                String::from_utf8_lossy(entry.key_bytes(body)).into_owned(),
                String::from_utf8_lossy(entry.value_bytes(body)).into_owned(),
            );
        }
        true
    }

    /// Rebuild a command line from the `a0..aN` fields of the first
    /// record matching `rec_type`. The first `skip` fields (usually
    /// `argc`) are ignored. Quoted values pass through verbatim; bare
    /// values are hex-decoded and re-quoted since the encoding
    /// signals an embedded space, with `""` standing in for values
    /// that fail to decode.
    pub fn concat_values(&mut self, rec_type: u32, skip: usize, sep: char) -> String {
        let idx = match self
            .records
            .iter()
            .position(|state| rec_type == 0 || state.buf.rec_type() == rec_type)
        {
            Some(idx) => idx,
            None => return String::new(),
        };
        self.ensure_scanned(idx);

        let state = &self.records[idx];
        let body = state.buf.data();
        let mut out = String::new();
        for entry in state.fields.iter().skip(skip) {
            if !out.is_empty() {
                out.push(sep);
            }
            let bytes = entry.value_bytes(body);
            if entry.quoted {
                out.push_str(&String::from_utf8_lossy(bytes));
            } else {
                match hex::hex_to_ascii(bytes) {
                    Ok(decoded) => {
                        out.push('"');
                        out.push_str(&String::from_utf8_lossy(&decoded));
                        out.push('"');
                    }
                    Err(_) => out.push_str("\"\""),
                }
            }
        }
        out
    }

    /// Return every buffer to the pool and consume the group.
    pub fn release(self) {
        debug!(
            "Releasing group {} with {} records",
            self.header.serial(),
            self.records.len()
        );
        for state in self.records {
            self.pool.recycle(state.buf);
        }
    }
}
