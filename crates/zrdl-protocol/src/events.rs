//! Event batch wire format (spec §3 "Event batch", §6 "Event batch header").

use zrdl_wire::{read_u32_le, write_u32_le};

/// Same numeric magic as the drawlist header; the spec names it `ZREV`
/// ("ZRDL" in source encoding) for both formats.
pub const EVENT_BATCH_MAGIC: u32 = 0x5645_525A;
pub const EVENT_BATCH_VERSION: u32 = 1;
pub const EVENT_BATCH_HEADER_SIZE: u32 = 24;
pub const EVENT_HEADER_SIZE: u32 = 16;

pub const EVENT_KIND_RESIZE: u32 = 5;
pub const RESIZE_RECORD_SIZE: u32 = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventBatchError {
    #[error("malformed event batch: {detail}")]
    Format { detail: String },
}

impl EventBatchError {
    fn format(detail: impl Into<String>) -> Self {
        Self::Format { detail: detail.into() }
    }
}

/// Accumulates events into one batch buffer. Mirrors the drawlist builder's
/// append-then-finalize shape but for the much simpler event batch format.
#[derive(Debug, Default)]
pub struct EventBatchBuilder {
    records: Vec<u8>,
    event_count: u32,
}

impl EventBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_resize(&mut self, cols: u32, rows: u32, time_ms: u32) -> &mut Self {
        write_u32_le(&mut self.records, EVENT_KIND_RESIZE);
        write_u32_le(&mut self.records, RESIZE_RECORD_SIZE);
        write_u32_le(&mut self.records, time_ms);
        write_u32_le(&mut self.records, 0); // flags
        write_u32_le(&mut self.records, cols);
        write_u32_le(&mut self.records, rows);
        write_u32_le(&mut self.records, 0); // reserved0
        write_u32_le(&mut self.records, 0); // reserved1
        self.event_count += 1;
        self
    }

    /// Append a raw, already kind-tagged event body. `kind` and `flags` are
    /// caller-supplied; `body` is the kind-specific payload following the
    /// common 16-byte event header.
    pub fn push_raw(&mut self, kind: u32, time_ms: u32, flags: u32, body: &[u8]) -> &mut Self {
        let record_size = EVENT_HEADER_SIZE + body.len() as u32;
        write_u32_le(&mut self.records, kind);
        write_u32_le(&mut self.records, record_size);
        write_u32_le(&mut self.records, time_ms);
        write_u32_le(&mut self.records, flags);
        self.records.extend_from_slice(body);
        self.event_count += 1;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let total_size = EVENT_BATCH_HEADER_SIZE + self.records.len() as u32;
        let mut out = Vec::with_capacity(total_size as usize);
        write_u32_le(&mut out, EVENT_BATCH_MAGIC);
        write_u32_le(&mut out, EVENT_BATCH_VERSION);
        write_u32_le(&mut out, total_size);
        write_u32_le(&mut out, self.event_count);
        write_u32_le(&mut out, 0); // batch_flags
        write_u32_le(&mut out, 0); // reserved
        out.extend_from_slice(&self.records);
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    pub kind: u32,
    pub time_ms: u32,
    pub flags: u32,
    pub body: &'a [u8],
}

pub fn parse_batch_header(buf: &[u8]) -> Result<(u32, u32), EventBatchError> {
    if buf.len() < EVENT_BATCH_HEADER_SIZE as usize {
        return Err(EventBatchError::format("buffer shorter than batch header"));
    }
    let magic = read_u32_le(buf, 0).unwrap();
    if magic != EVENT_BATCH_MAGIC {
        return Err(EventBatchError::format(format!("bad magic 0x{magic:08X}")));
    }
    let total_size = read_u32_le(buf, 8).unwrap();
    if total_size as usize > buf.len() {
        return Err(EventBatchError::format("total_size exceeds buffer length"));
    }
    let event_count = read_u32_le(buf, 12).unwrap();
    Ok((total_size, event_count))
}

pub fn events(buf: &[u8]) -> Result<Vec<EventRecord<'_>>, EventBatchError> {
    let (total_size, event_count) = parse_batch_header(buf)?;
    let mut out = Vec::with_capacity(event_count as usize);
    let mut offset = EVENT_BATCH_HEADER_SIZE as usize;
    for _ in 0..event_count {
        if offset + EVENT_HEADER_SIZE as usize > total_size as usize {
            return Err(EventBatchError::format("truncated event header"));
        }
        let kind = read_u32_le(buf, offset).unwrap();
        let record_size = read_u32_le(buf, offset + 4).unwrap();
        let time_ms = read_u32_le(buf, offset + 8).unwrap();
        let flags = read_u32_le(buf, offset + 12).unwrap();
        if record_size < EVENT_HEADER_SIZE {
            return Err(EventBatchError::format("record_size smaller than header"));
        }
        let body_start = offset + EVENT_HEADER_SIZE as usize;
        let body_end = offset + record_size as usize;
        if body_end > total_size as usize {
            return Err(EventBatchError::format("event body overruns batch"));
        }
        out.push(EventRecord {
            kind,
            time_ms,
            flags,
            body: &buf[body_start..body_end],
        });
        offset = body_end;
    }
    Ok(out)
}
