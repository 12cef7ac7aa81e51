//! Supporting value types for text-run blobs and the software cursor.

use zrdl_style::Style;

/// One segment of a text run: a span of text sharing a single style.
#[derive(Debug, Clone, Default)]
pub struct TextRunSegment {
    pub text: String,
    pub style: Option<Style>,
}

impl TextRunSegment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    pub fn with_style(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style: Some(style),
        }
    }
}

/// Cursor shape, as negotiated by `SET_CURSOR` (v2+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Block = 0,
    Underline = 1,
    Bar = 2,
}

impl CursorShape {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CursorShape::Block),
            1 => Some(CursorShape::Underline),
            2 => Some(CursorShape::Bar),
            _ => None,
        }
    }
}

/// Cursor state as passed to `set_cursor`. `x == -1 || y == -1` means
/// "leave that axis unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub x: i32,
    pub y: i32,
    pub shape: CursorShape,
    pub visible: bool,
    pub blink: bool,
}

impl CursorState {
    pub const HIDDEN: CursorState = CursorState {
        x: -1,
        y: -1,
        shape: CursorShape::Block,
        visible: false,
        blink: false,
    };
}
