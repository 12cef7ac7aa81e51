//! Read-side helpers for the ZRDL binary drawlist format (spec §4.4).
//!
//! Readers never trust a drawlist buffer: every offset and length is
//! bounds-checked against `total_size` and the declared section before use.
//! A malformed buffer yields [`ReadError::Format`] rather than an out-of-
//! bounds read or panic.

use zrdl_wire::{align4, read_u16_le, read_u32_le};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("malformed drawlist: {detail}")]
    Format { detail: String },
}

impl ReadError {
    fn format(detail: impl Into<String>) -> Self {
        Self::Format { detail: detail.into() }
    }
}

/// Parsed ZRDL header (spec §6 "ZRDL header").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub total_size: u32,
    pub cmd_offset: u32,
    pub cmd_bytes: u32,
    pub cmd_count: u32,
    pub strings_span_offset: u32,
    pub strings_count: u32,
    pub strings_bytes_offset: u32,
    pub strings_bytes_len: u32,
    pub blobs_span_offset: u32,
    pub blobs_count: u32,
    pub blobs_bytes_offset: u32,
    pub blobs_bytes_len: u32,
}

const HEADER_MAGIC: u32 = 0x5645_525A;
const HEADER_SIZE: u32 = 64;

/// Parse and validate a ZRDL header. Every section's (offset, length) is
/// checked to lie entirely within `total_size`, and `total_size` itself must
/// not exceed `buf.len()`.
pub fn parse_header(buf: &[u8]) -> Result<Header, ReadError> {
    if buf.len() < HEADER_SIZE as usize {
        return Err(ReadError::format(format!(
            "buffer too short for header: {} bytes",
            buf.len()
        )));
    }
    let word = |idx: usize| -> u32 { read_u32_le(buf, idx * 4).expect("bounds checked above") };

    let magic = word(0);
    if magic != HEADER_MAGIC {
        return Err(ReadError::format(format!("bad magic 0x{magic:08X}")));
    }
    let version = word(1);
    let header_size = word(2);
    if header_size != HEADER_SIZE {
        return Err(ReadError::format(format!("unexpected header_size {header_size}")));
    }
    let total_size = word(3);
    if (total_size as usize) > buf.len() {
        return Err(ReadError::format(format!(
            "total_size {total_size} exceeds buffer length {}",
            buf.len()
        )));
    }
    if total_size % 4 != 0 {
        return Err(ReadError::format(format!("total_size {total_size} is not 4-aligned")));
    }

    let header = Header {
        version,
        total_size,
        cmd_offset: word(4),
        cmd_bytes: word(5),
        cmd_count: word(6),
        strings_span_offset: word(7),
        strings_count: word(8),
        strings_bytes_offset: word(9),
        strings_bytes_len: word(10),
        blobs_span_offset: word(11),
        blobs_count: word(12),
        blobs_bytes_offset: word(13),
        blobs_bytes_len: word(14),
    };

    check_section(&header, header.cmd_offset, header.cmd_bytes, "cmd")?;
    check_section(
        &header,
        header.strings_span_offset,
        header.strings_count.saturating_mul(8),
        "strings_span",
    )?;
    check_section(&header, header.strings_bytes_offset, header.strings_bytes_len, "strings_bytes")?;
    check_section(
        &header,
        header.blobs_span_offset,
        header.blobs_count.saturating_mul(8),
        "blobs_span",
    )?;
    check_section(&header, header.blobs_bytes_offset, header.blobs_bytes_len, "blobs_bytes")?;

    Ok(header)
}

fn check_section(header: &Header, offset: u32, len: u32, name: &str) -> Result<(), ReadError> {
    if len == 0 {
        return Ok(());
    }
    let end = offset
        .checked_add(len)
        .ok_or_else(|| ReadError::format(format!("{name} section overflows")))?;
    if end > header.total_size {
        return Err(ReadError::format(format!(
            "{name} section [{offset}, {end}) exceeds total_size {}",
            header.total_size
        )));
    }
    Ok(())
}

/// One decoded command: its opcode, flags and payload slice.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    pub opcode: u16,
    pub flags: u16,
    pub size: u32,
    pub payload: &'a [u8],
}

/// Iterates the command stream, advancing by `align4(size)` per spec §4.4.
pub struct Commands<'a> {
    buf: &'a [u8],
    end: usize,
    offset: usize,
}

/// Build a command iterator over an already-validated header's cmd section.
pub fn commands<'a>(buf: &'a [u8], header: &Header) -> Commands<'a> {
    let start = header.cmd_offset as usize;
    Commands {
        buf,
        end: start + header.cmd_bytes as usize,
        offset: start,
    }
}

impl<'a> Iterator for Commands<'a> {
    type Item = Result<Command<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }
        if self.offset + 8 > self.end {
            self.offset = self.end;
            return Some(Err(ReadError::format("truncated command header")));
        }
        let opcode = match read_u16_le(self.buf, self.offset) {
            Some(v) => v,
            None => return Some(Err(ReadError::format("command header out of bounds"))),
        };
        let flags = read_u16_le(self.buf, self.offset + 2).unwrap_or(0);
        let size = match read_u32_le(self.buf, self.offset + 4) {
            Some(v) => v,
            None => return Some(Err(ReadError::format("command size out of bounds"))),
        };
        if size < 8 {
            self.offset = self.end;
            return Some(Err(ReadError::format(format!("command size {size} smaller than header"))));
        }
        let padded = align4(size) as usize;
        if self.offset + padded > self.end {
            self.offset = self.end;
            return Some(Err(ReadError::format("command overruns cmd section")));
        }
        let payload_start = self.offset + 8;
        let payload_end = self.offset + size as usize;
        let payload = &self.buf[payload_start..payload_end];
        self.offset += padded;
        Some(Ok(Command {
            opcode,
            flags,
            size,
            payload,
        }))
    }
}

/// Resolve an interned string index to its UTF-8 text.
pub fn resolve_string<'a>(buf: &'a [u8], header: &Header, index: u32) -> Result<&'a str, ReadError> {
    if index >= header.strings_count {
        return Err(ReadError::format(format!(
            "string index {index} out of range (count {})",
            header.strings_count
        )));
    }
    let span_at = header.strings_span_offset as usize + index as usize * 8;
    let rel_offset = read_u32_le(buf, span_at).ok_or_else(|| ReadError::format("string span out of bounds"))?;
    let len = read_u32_le(buf, span_at + 4).ok_or_else(|| ReadError::format("string span out of bounds"))?;
    let start = header.strings_bytes_offset as usize + rel_offset as usize;
    let end = start + len as usize;
    if end > header.strings_bytes_offset as usize + header.strings_bytes_len as usize {
        return Err(ReadError::format(format!("string span [{start}, {end}) escapes strings section")));
    }
    std::str::from_utf8(&buf[start..end]).map_err(|e| ReadError::format(format!("string bytes not valid utf8: {e}")))
}

/// Resolve a blob index to its raw bytes.
pub fn resolve_blob<'a>(buf: &'a [u8], header: &Header, index: u32) -> Result<&'a [u8], ReadError> {
    if index >= header.blobs_count {
        return Err(ReadError::format(format!(
            "blob index {index} out of range (count {})",
            header.blobs_count
        )));
    }
    let span_at = header.blobs_span_offset as usize + index as usize * 8;
    let rel_offset = read_u32_le(buf, span_at).ok_or_else(|| ReadError::format("blob span out of bounds"))?;
    let len = read_u32_le(buf, span_at + 4).ok_or_else(|| ReadError::format("blob span out of bounds"))?;
    let start = header.blobs_bytes_offset as usize + rel_offset as usize;
    let end = start + len as usize;
    if end > header.blobs_bytes_offset as usize + header.blobs_bytes_len as usize {
        return Err(ReadError::format(format!("blob span [{start}, {end}) escapes blobs section")));
    }
    Ok(&buf[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use zrdl_builder::{BuildCaps, DrawlistBuilder, Version};

    #[test]
    fn round_trips_a_builder_output() {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        b.clear().unwrap();
        b.draw_text(0, 0, "hello", None).unwrap();
        let bytes = b.build().unwrap();

        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.cmd_count, 2);
        assert_eq!(header.strings_count, 1);

        let cmds: Vec<_> = commands(&bytes, &header).collect::<Result<_, _>>().unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].opcode, 1);
        assert_eq!(cmds[1].opcode, 3);

        assert_eq!(resolve_string(&bytes, &header, 0).unwrap(), "hello");
        assert!(resolve_string(&bytes, &header, 1).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 64];
        buf[0] = 0xAB;
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let buf = vec![0u8; 10];
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn rejects_section_escaping_total_size() {
        let mut b = DrawlistBuilder::new(Version::V3, BuildCaps::default());
        b.draw_text(0, 0, "hi", None).unwrap();
        let bytes = b.build().unwrap();
        let mut tampered = bytes.to_vec();
        // Shrink total_size so the strings section now overruns it.
        zrdl_wire::put_u32_le_at(&mut tampered, 12, 64);
        assert!(parse_header(&tampered).is_err());
    }
}
