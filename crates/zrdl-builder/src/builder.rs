//! The drawlist builder state machine (spec §4.3).
//!
//! A `DrawlistBuilder` accumulates commands, interned strings and blobs into
//! append-only buffers, then lays them out into one contiguous ZRDL buffer
//! on `build()`. Any validation or cap failure *latches*: the builder is
//! poisoned and every subsequent call (including `build()`) returns the same
//! error until `reset()`.

use std::collections::HashMap;

use zrdl_style::Style;
use zrdl_wire::{align4, write_i32_le, write_u16_le, write_u32_le};

use crate::cache::EncodedStringCache;
use crate::caps::BuildCaps;
use crate::error::BuildError;
use crate::opcode::*;
use crate::output::DrawlistBytes;
use crate::segment::{CursorState, TextRunSegment};

/// Builds one ZRDL drawlist at a time. See module docs.
pub struct DrawlistBuilder {
    version: Version,
    caps: BuildCaps,
    poison: Option<BuildError>,

    cmd_buf: Vec<u8>,
    cmd_count: u32,

    string_index: HashMap<String, u32>,
    string_bytes: Vec<u8>,
    string_spans: Vec<(u32, u32)>,

    blob_bytes: Vec<u8>,
    blob_spans: Vec<(u32, u32)>,

    encoded_cache: EncodedStringCache,

    output_buf: Vec<u8>,
}

impl DrawlistBuilder {
    pub fn new(version: Version, caps: BuildCaps) -> Self {
        Self {
            version,
            encoded_cache: EncodedStringCache::new(caps.encoded_string_cache_cap),
            caps,
            poison: None,
            cmd_buf: Vec::new(),
            cmd_count: 0,
            string_index: HashMap::new(),
            string_bytes: Vec::new(),
            string_spans: Vec::new(),
            blob_bytes: Vec::new(),
            blob_spans: Vec::new(),
            output_buf: Vec::new(),
        }
    }

    pub fn with_caps(caps: BuildCaps) -> Self {
        Self::new(Version::V3, caps)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The latched error, if the builder is poisoned.
    pub fn error(&self) -> Option<&BuildError> {
        self.poison.as_ref()
    }

    pub fn cmd_count(&self) -> u32 {
        self.cmd_count
    }

    pub fn string_count(&self) -> u32 {
        self.string_spans.len() as u32
    }

    pub fn blob_count(&self) -> u32 {
        self.blob_spans.len() as u32
    }

    /// Drop everything built so far, including the poison latch. Caps,
    /// version and the encoded-string cache survive a reset — the cache
    /// exists precisely to amortize across the frames `reset()` separates.
    pub fn reset(&mut self) {
        self.poison = None;
        self.cmd_buf.clear();
        self.cmd_count = 0;
        self.string_index.clear();
        self.string_bytes.clear();
        self.string_spans.clear();
        self.blob_bytes.clear();
        self.blob_spans.clear();
    }

    fn check_alive(&self) -> Result<(), BuildError> {
        match &self.poison {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn poison_and_return<T>(&mut self, err: BuildError) -> Result<T, BuildError> {
        tracing::warn!(
            target: "zrdl.builder",
            code = err.code(),
            detail = %err.detail(),
            "drawlist builder poisoned"
        );
        self.poison = Some(err.clone());
        Err(err)
    }

    fn validate_non_negative(&mut self, value: i32, field: &str) -> Result<i32, BuildError> {
        if value >= 0 {
            return Ok(value);
        }
        if self.caps.validate_params {
            self.poison_and_return(BuildError::bad_params(format!(
                "{field} must be >= 0, got {value}"
            )))
        } else {
            Ok(0)
        }
    }

    fn align4_u64(n: u64) -> u64 {
        (n + 3) & !3
    }

    /// What the final `total_size` would be if `extra_*` were committed on
    /// top of the builder's current buffers. Used to reject a mutation
    /// *before* committing it, so a rejected call leaves no trace.
    fn projected_total_with(
        &self,
        extra_cmd_bytes: u32,
        extra_string_count: u32,
        extra_string_bytes: u32,
        extra_blob_count: u32,
        extra_blob_bytes: u32,
    ) -> u64 {
        let cmd_len = self.cmd_buf.len() as u64 + extra_cmd_bytes as u64;
        let string_count = self.string_spans.len() as u64 + extra_string_count as u64;
        let string_bytes_len = self.string_bytes.len() as u64 + extra_string_bytes as u64;
        let blob_count = self.blob_spans.len() as u64 + extra_blob_count as u64;
        let blob_bytes_len = self.blob_bytes.len() as u64 + extra_blob_bytes as u64;
        HEADER_SIZE as u64
            + cmd_len
            + string_count * 8
            + Self::align4_u64(string_bytes_len)
            + blob_count * 8
            + Self::align4_u64(blob_bytes_len)
    }

    fn intern_string(&mut self, s: &str) -> Result<u32, BuildError> {
        if let Some(&idx) = self.string_index.get(s) {
            return Ok(idx);
        }
        let bytes = self.encoded_cache.get_or_encode(s);
        let new_count = self.string_spans.len() as u64 + 1;
        let new_bytes_len = self.string_bytes.len() as u64 + bytes.len() as u64;
        if new_count > self.caps.max_strings as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "string count {new_count} exceeds max_strings {}",
                self.caps.max_strings
            )));
        }
        if new_bytes_len > self.caps.max_string_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "string bytes {new_bytes_len} exceeds max_string_bytes {}",
                self.caps.max_string_bytes
            )));
        }
        let projected = self.projected_total_with(0, 1, bytes.len() as u32, 0, 0);
        if projected > self.caps.max_drawlist_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "drawlist size {projected} exceeds max_drawlist_bytes {}",
                self.caps.max_drawlist_bytes
            )));
        }
        let offset = self.string_bytes.len() as u32;
        let len = bytes.len() as u32;
        self.string_bytes.extend_from_slice(&bytes);
        let idx = self.string_spans.len() as u32;
        self.string_spans.push((offset, len));
        self.string_index.insert(s.to_string(), idx);
        Ok(idx)
    }

    /// Append an opaque blob. `bytes.len()` must already be a multiple of 4;
    /// callers (e.g. [`Self::add_text_run_blob`]) are responsible for padding
    /// their own payloads before calling this.
    pub fn add_blob(&mut self, bytes: &[u8]) -> Result<u32, BuildError> {
        self.check_alive()?;
        if bytes.len() % 4 != 0 {
            return self.poison_and_return(BuildError::bad_params(format!(
                "blob length {} is not 4-byte aligned",
                bytes.len()
            )));
        }
        let new_count = self.blob_spans.len() as u64 + 1;
        let new_bytes_len = self.blob_bytes.len() as u64 + bytes.len() as u64;
        if new_count > self.caps.max_blobs as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "blob count {new_count} exceeds max_blobs {}",
                self.caps.max_blobs
            )));
        }
        if new_bytes_len > self.caps.max_blob_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "blob bytes {new_bytes_len} exceeds max_blob_bytes {}",
                self.caps.max_blob_bytes
            )));
        }
        let projected = self.projected_total_with(0, 0, 0, 1, bytes.len() as u32);
        if projected > self.caps.max_drawlist_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "drawlist size {projected} exceeds max_drawlist_bytes {}",
                self.caps.max_drawlist_bytes
            )));
        }
        let offset = self.blob_bytes.len() as u32;
        let len = bytes.len() as u32;
        self.blob_bytes.extend_from_slice(bytes);
        let idx = self.blob_spans.len() as u32;
        self.blob_spans.push((offset, len));
        Ok(idx)
    }

    /// Pack a list of styled text segments into a text-run blob (spec §8
    /// scenario 3: count word + one 28-byte record per segment) and store it.
    pub fn add_text_run_blob(&mut self, segments: &[TextRunSegment]) -> Result<u32, BuildError> {
        self.check_alive()?;
        let mut encoded = Vec::with_capacity(segments.len());
        for seg in segments {
            let idx = self.intern_string(&seg.text)?;
            encoded.push((idx, seg.text.len() as u32, seg.style));
        }
        let mut blob = Vec::with_capacity(4 + segments.len() * TEXT_RUN_SEGMENT_SIZE as usize);
        write_u32_le(&mut blob, segments.len() as u32);
        for (idx, byte_len, style) in encoded {
            let (fg, bg, attrs) = zrdl_style::encode_basic(style.as_ref());
            write_u32_le(&mut blob, fg);
            write_u32_le(&mut blob, bg);
            write_u32_le(&mut blob, attrs);
            write_u32_le(&mut blob, 0); // style reserved
            write_u32_le(&mut blob, idx);
            write_u32_le(&mut blob, byte_len);
            write_u32_le(&mut blob, 0); // segment reserved
        }
        self.add_blob(&blob)
    }

    fn emit(&mut self, opcode: u16, expected_size: u32, payload: Vec<u8>) -> Result<(), BuildError> {
        let size = CMD_HEADER_SIZE + payload.len() as u32;
        if size != expected_size {
            return self.poison_and_return(BuildError::format(format!(
                "opcode {opcode} expected size {expected_size}, computed {size}"
            )));
        }
        if self.cmd_count as u64 + 1 > self.caps.max_cmd_count as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "command count {} exceeds max_cmd_count {}",
                self.cmd_count + 1,
                self.caps.max_cmd_count
            )));
        }
        let padded_size = align4(size);
        let projected = self.projected_total_with(padded_size, 0, 0, 0, 0);
        if projected > self.caps.max_drawlist_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "drawlist size {projected} exceeds max_drawlist_bytes {}",
                self.caps.max_drawlist_bytes
            )));
        }
        write_u16_le(&mut self.cmd_buf, opcode);
        write_u16_le(&mut self.cmd_buf, 0);
        write_u32_le(&mut self.cmd_buf, size);
        self.cmd_buf.extend_from_slice(&payload);
        self.cmd_buf.resize(self.cmd_buf.len() + (padded_size - size) as usize, 0);
        self.cmd_count += 1;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), BuildError> {
        self.check_alive()?;
        self.emit(OP_CLEAR, SIZE_CLEAR, Vec::new())
    }

    /// `clear()` followed by a full-canvas `fill_rect` — the common "blank
    /// the screen to a background style" idiom.
    pub fn clear_to(&mut self, cols: i32, rows: i32, style: Option<Style>) -> Result<(), BuildError> {
        self.check_alive()?;
        let cols = self.validate_non_negative(cols, "cols")?;
        let rows = self.validate_non_negative(rows, "rows")?;
        self.clear()?;
        self.fill_rect(0, 0, cols, rows, style)
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, style: Option<Style>) -> Result<(), BuildError> {
        self.check_alive()?;
        let w = self.validate_non_negative(w, "w")?;
        let h = self.validate_non_negative(h, "h")?;
        let (fg, bg, attrs) = zrdl_style::encode_basic(style.as_ref());
        let mut payload = Vec::with_capacity(32);
        write_i32_le(&mut payload, x);
        write_i32_le(&mut payload, y);
        write_i32_le(&mut payload, w);
        write_i32_le(&mut payload, h);
        write_u32_le(&mut payload, fg);
        write_u32_le(&mut payload, bg);
        write_u32_le(&mut payload, attrs);
        write_u32_le(&mut payload, 0); // style reserved
        self.emit(OP_FILL_RECT, SIZE_FILL_RECT, payload)
    }

    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, style: Option<Style>) -> Result<(), BuildError> {
        self.check_alive()?;
        let idx = self.intern_string(text)?;
        let byte_len = text.len() as u32;
        let mut payload = Vec::with_capacity(40);
        write_i32_le(&mut payload, x);
        write_i32_le(&mut payload, y);
        write_u32_le(&mut payload, idx);
        write_u32_le(&mut payload, 0); // string reserved
        write_u32_le(&mut payload, byte_len);
        if self.version.supports_extended_style() {
            let (fg, bg, attrs, reserved, underline_color) = zrdl_style::encode_extended(style.as_ref());
            write_u32_le(&mut payload, fg);
            write_u32_le(&mut payload, bg);
            write_u32_le(&mut payload, attrs);
            write_u32_le(&mut payload, 0); // basic style reserved
            write_u32_le(&mut payload, reserved);
            write_u32_le(&mut payload, underline_color);
            write_u32_le(&mut payload, 0); // trailing reserved
            self.emit(OP_DRAW_TEXT, SIZE_DRAW_TEXT_V3, payload)
        } else {
            let (fg, bg, attrs) = zrdl_style::encode_basic(style.as_ref());
            write_u32_le(&mut payload, fg);
            write_u32_le(&mut payload, bg);
            write_u32_le(&mut payload, attrs);
            write_u32_le(&mut payload, 0); // style reserved
            write_u32_le(&mut payload, 0); // trailing reserved
            self.emit(OP_DRAW_TEXT, SIZE_DRAW_TEXT_V1, payload)
        }
    }

    pub fn push_clip(&mut self, x: i32, y: i32, w: i32, h: i32) -> Result<(), BuildError> {
        self.check_alive()?;
        let w = self.validate_non_negative(w, "w")?;
        let h = self.validate_non_negative(h, "h")?;
        let mut payload = Vec::with_capacity(16);
        write_i32_le(&mut payload, x);
        write_i32_le(&mut payload, y);
        write_i32_le(&mut payload, w);
        write_i32_le(&mut payload, h);
        self.emit(OP_PUSH_CLIP, SIZE_PUSH_CLIP, payload)
    }

    pub fn pop_clip(&mut self) -> Result<(), BuildError> {
        self.check_alive()?;
        self.emit(OP_POP_CLIP, SIZE_POP_CLIP, Vec::new())
    }

    pub fn draw_text_run(&mut self, x: i32, y: i32, blob_index: u32) -> Result<(), BuildError> {
        self.check_alive()?;
        if blob_index as usize >= self.blob_spans.len() {
            return self.poison_and_return(BuildError::bad_params(format!(
                "blob index {blob_index} out of range"
            )));
        }
        let mut payload = Vec::with_capacity(16);
        write_i32_le(&mut payload, x);
        write_i32_le(&mut payload, y);
        write_u32_le(&mut payload, blob_index);
        write_u32_le(&mut payload, 0);
        self.emit(OP_DRAW_TEXT_RUN, SIZE_DRAW_TEXT_RUN, payload)
    }

    pub fn set_cursor(&mut self, state: CursorState) -> Result<(), BuildError> {
        self.check_alive()?;
        if !self.version.supports_cursor() {
            return self.poison_and_return(BuildError::bad_params(format!(
                "SET_CURSOR requires version >= 2, builder is v{}",
                self.version.0
            )));
        }
        let mut payload = Vec::with_capacity(12);
        write_i32_le(&mut payload, state.x);
        write_i32_le(&mut payload, state.y);
        let packed = state.shape as u8 as u32 | (state.visible as u32) << 8 | (state.blink as u32) << 16;
        write_u32_le(&mut payload, packed);
        self.emit(OP_SET_CURSOR, SIZE_SET_CURSOR, payload)
    }

    pub fn hide_cursor(&mut self) -> Result<(), BuildError> {
        self.set_cursor(CursorState::HIDDEN)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_graphics(
        &mut self,
        opcode: u16,
        expected_size: u32,
        blob_index: u32,
        width: u32,
        height: u32,
        blitter: u32,
        format: u32,
        z_layer: u32,
        image_id: u32,
    ) -> Result<(), BuildError> {
        self.check_alive()?;
        if !self.version.supports_graphics() {
            return self.poison_and_return(BuildError::bad_params(
                "DRAW_CANVAS/DRAW_IMAGE require version >= 3",
            ));
        }
        if blob_index as usize >= self.blob_spans.len() {
            return self.poison_and_return(BuildError::bad_params(format!(
                "blob index {blob_index} out of range"
            )));
        }
        let (blob_offset, blob_len) = self.blob_spans[blob_index as usize];
        let mut payload = Vec::with_capacity(32);
        write_u32_le(&mut payload, blob_offset);
        write_u32_le(&mut payload, blob_len);
        write_u32_le(&mut payload, width);
        write_u32_le(&mut payload, height);
        write_u32_le(&mut payload, blitter);
        write_u32_le(&mut payload, format);
        write_u32_le(&mut payload, z_layer);
        write_u32_le(&mut payload, image_id);
        self.emit(opcode, expected_size, payload)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_canvas(
        &mut self,
        blob_index: u32,
        width: u32,
        height: u32,
        blitter: u32,
        format: u32,
        z_layer: u32,
        image_id: u32,
    ) -> Result<(), BuildError> {
        self.draw_graphics(OP_DRAW_CANVAS, SIZE_DRAW_CANVAS, blob_index, width, height, blitter, format, z_layer, image_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_image(
        &mut self,
        blob_index: u32,
        width: u32,
        height: u32,
        blitter: u32,
        format: u32,
        z_layer: u32,
        image_id: u32,
    ) -> Result<(), BuildError> {
        self.draw_graphics(OP_DRAW_IMAGE, SIZE_DRAW_IMAGE, blob_index, width, height, blitter, format, z_layer, image_id)
    }

    pub fn set_link(&mut self, url: &str) -> Result<(), BuildError> {
        self.check_alive()?;
        if !self.version.supports_graphics() {
            return self.poison_and_return(BuildError::bad_params("SET_LINK requires version >= 3"));
        }
        let idx = self.intern_string(url)?;
        let mut payload = Vec::with_capacity(8);
        write_u32_le(&mut payload, idx);
        write_u32_le(&mut payload, 0);
        self.emit(OP_SET_LINK, SIZE_SET_LINK, payload)
    }

    /// Lay out header + sections into one contiguous buffer and return it.
    ///
    /// String and blob span-table offsets are relative to the start of their
    /// own bytes section (not the start of the whole buffer) — readers add
    /// the section's base offset from the header when resolving a span.
    pub fn build(&mut self) -> Result<DrawlistBytes<'_>, BuildError> {
        if let Some(err) = &self.poison {
            return Err(err.clone());
        }

        let cmd_bytes = self.cmd_buf.len() as u32;
        let strings_count = self.string_spans.len() as u32;
        let strings_bytes_len = self.string_bytes.len() as u32;
        let blobs_count = self.blob_spans.len() as u32;
        let blobs_bytes_len = self.blob_bytes.len() as u32;

        let strings_span_bytes = strings_count * 8;
        let blobs_span_bytes = blobs_count * 8;
        let strings_bytes_aligned = align4(strings_bytes_len);
        let blobs_bytes_aligned = align4(blobs_bytes_len);

        let cmd_offset = HEADER_SIZE;
        let strings_span_offset = cmd_offset + cmd_bytes;
        let strings_bytes_offset = strings_span_offset + strings_span_bytes;
        let blobs_span_offset = strings_bytes_offset + strings_bytes_aligned;
        let blobs_bytes_offset = blobs_span_offset + blobs_span_bytes;
        let total_size = blobs_bytes_offset + blobs_bytes_aligned;

        for (name, value) in [
            ("cmd_offset", cmd_offset),
            ("strings_span_offset", strings_span_offset),
            ("strings_bytes_offset", strings_bytes_offset),
            ("blobs_span_offset", blobs_span_offset),
            ("blobs_bytes_offset", blobs_bytes_offset),
            ("total_size", total_size),
        ] {
            if value % 4 != 0 {
                return self.poison_and_return(BuildError::internal(format!("{name} {value} is not 4-aligned")));
            }
        }

        if total_size as u64 > self.caps.max_drawlist_bytes as u64 {
            return self.poison_and_return(BuildError::too_large(format!(
                "final drawlist size {total_size} exceeds max_drawlist_bytes {}",
                self.caps.max_drawlist_bytes
            )));
        }

        self.output_buf.clear();
        self.output_buf.reserve(total_size as usize);

        write_u32_le(&mut self.output_buf, HEADER_MAGIC);
        write_u32_le(&mut self.output_buf, self.version.0);
        write_u32_le(&mut self.output_buf, HEADER_SIZE);
        write_u32_le(&mut self.output_buf, total_size);
        write_u32_le(&mut self.output_buf, if cmd_bytes == 0 { 0 } else { cmd_offset });
        write_u32_le(&mut self.output_buf, cmd_bytes);
        write_u32_le(&mut self.output_buf, self.cmd_count);
        write_u32_le(&mut self.output_buf, if strings_count == 0 { 0 } else { strings_span_offset });
        write_u32_le(&mut self.output_buf, strings_count);
        write_u32_le(&mut self.output_buf, if strings_bytes_len == 0 { 0 } else { strings_bytes_offset });
        write_u32_le(&mut self.output_buf, strings_bytes_len);
        write_u32_le(&mut self.output_buf, if blobs_count == 0 { 0 } else { blobs_span_offset });
        write_u32_le(&mut self.output_buf, blobs_count);
        write_u32_le(&mut self.output_buf, if blobs_bytes_len == 0 { 0 } else { blobs_bytes_offset });
        write_u32_le(&mut self.output_buf, blobs_bytes_len);
        write_u32_le(&mut self.output_buf, 0); // reserved

        self.output_buf.extend_from_slice(&self.cmd_buf);

        for &(offset, len) in &self.string_spans {
            write_u32_le(&mut self.output_buf, offset);
            write_u32_le(&mut self.output_buf, len);
        }
        self.output_buf.extend_from_slice(&self.string_bytes);
        self.output_buf
            .resize(self.output_buf.len() + (strings_bytes_aligned - strings_bytes_len) as usize, 0);

        for &(offset, len) in &self.blob_spans {
            write_u32_le(&mut self.output_buf, offset);
            write_u32_le(&mut self.output_buf, len);
        }
        self.output_buf.extend_from_slice(&self.blob_bytes);
        self.output_buf
            .resize(self.output_buf.len() + (blobs_bytes_aligned - blobs_bytes_len) as usize, 0);

        debug_assert_eq!(self.output_buf.len() as u32, total_size);

        if self.caps.reuse_output_buffer {
            Ok(DrawlistBytes::Borrowed(&self.output_buf))
        } else {
            Ok(DrawlistBytes::Owned(self.output_buf.clone()))
        }
    }
}
