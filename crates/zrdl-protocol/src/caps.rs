//! Terminal capability record (spec §3 "Terminal caps"), queried from the
//! native engine once at `init` and reported back via the `caps` message.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorMode {
    None = 0,
    Palette16 = 1,
    Palette256 = 2,
    TrueColor = 3,
}

impl ColorMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ColorMode::None),
            1 => Some(ColorMode::Palette16),
            2 => Some(ColorMode::Palette256),
            3 => Some(ColorMode::TrueColor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCaps {
    pub color_mode: ColorMode,
    pub mouse: bool,
    pub bracketed_paste: bool,
    pub focus_events: bool,
    pub osc52_clipboard: bool,
    pub synchronized_update: bool,
    pub scroll_region: bool,
    pub cursor_shape: bool,
    pub output_wait_writable: bool,
    pub sgr_attrs_supported: u32,
}

impl Default for TerminalCaps {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::None,
            mouse: false,
            bracketed_paste: false,
            focus_events: false,
            osc52_clipboard: false,
            synchronized_update: false,
            scroll_region: false,
            cursor_shape: false,
            output_wait_writable: false,
            sgr_attrs_supported: 0,
        }
    }
}
