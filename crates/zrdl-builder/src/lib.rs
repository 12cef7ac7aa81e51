//! Builder for ZRDL drawlists: the mutable, poison-on-error state machine
//! that application code drives once per frame to produce the bytes the
//! reader and renderer consume (spec §4.3).

mod builder;
mod cache;
mod caps;
mod error;
mod opcode;
mod output;
mod segment;

pub use builder::DrawlistBuilder;
pub use caps::BuildCaps;
pub use error::BuildError;
pub use opcode::{Version, HEADER_MAGIC, HEADER_SIZE};
pub use output::DrawlistBytes;
pub use segment::{CursorShape, CursorState, TextRunSegment};

pub use zrdl_style::{Style, StyleAttrs, UnderlineVariant};
pub use zrdl_wire::Rgb;
