//! Command opcodes and their declared wire sizes (spec §3, §4.3, §6).

/// Fixed header magic number (spec §3 "Header").
pub const HEADER_MAGIC: u32 = 0x5645_525A;

/// Header size in bytes: magic, version, header_size, total_size, then four
/// (offset, count/len) pairs for cmd/strings/blobs, plus one reserved word.
pub const HEADER_SIZE: u32 = 64;

pub const OP_CLEAR: u16 = 1;
pub const OP_FILL_RECT: u16 = 2;
pub const OP_DRAW_TEXT: u16 = 3;
pub const OP_PUSH_CLIP: u16 = 4;
pub const OP_POP_CLIP: u16 = 5;
pub const OP_DRAW_TEXT_RUN: u16 = 6;
pub const OP_SET_CURSOR: u16 = 7;
pub const OP_DRAW_CANVAS: u16 = 8;
pub const OP_DRAW_IMAGE: u16 = 9;
pub const OP_SET_LINK: u16 = 10;

/// Command header size in bytes (opcode u16 + flags u16 + size u32).
pub const CMD_HEADER_SIZE: u32 = 8;

pub const SIZE_CLEAR: u32 = 8;
pub const SIZE_FILL_RECT: u32 = 40;
pub const SIZE_DRAW_TEXT_V1: u32 = 48;
pub const SIZE_DRAW_TEXT_V3: u32 = 56;
pub const SIZE_PUSH_CLIP: u32 = 24;
pub const SIZE_POP_CLIP: u32 = 8;
pub const SIZE_DRAW_TEXT_RUN: u32 = 24;
pub const SIZE_SET_CURSOR: u32 = 20;
/// DRAW_CANVAS / DRAW_IMAGE share one v3 payload layout (DESIGN.md Open
/// Question (a)): blob_offset, blob_len, width, height, blitter, format,
/// z_layer, image_id — eight u32 words after the 8 byte command header.
pub const SIZE_DRAW_CANVAS: u32 = 40;
pub const SIZE_DRAW_IMAGE: u32 = 40;
/// SET_LINK carries one string span: string_index, reserved.
pub const SIZE_SET_LINK: u32 = 16;

/// Text-run blob segment size: style (4 words) + string_index + byte_len +
/// reserved = 7 words = 28 bytes (spec §8 scenario 3).
pub const TEXT_RUN_SEGMENT_SIZE: u32 = 28;

/// Builder ZRDL version. Feature gates: v2 adds SET_CURSOR, v3 adds extended
/// style fields, DRAW_CANVAS/DRAW_IMAGE, and SET_LINK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u32);

impl Version {
    pub const V1: Version = Version(1);
    pub const V2: Version = Version(2);
    pub const V3: Version = Version(3);

    pub fn supports_cursor(self) -> bool {
        self.0 >= 2
    }

    pub fn supports_extended_style(self) -> bool {
        self.0 >= 3
    }

    pub fn supports_graphics(self) -> bool {
        self.0 >= 3
    }
}
