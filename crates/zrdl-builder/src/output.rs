//! Return type of [`crate::DrawlistBuilder::build`].
//!
//! When `BuildCaps::reuse_output_buffer` is set, `build()` must not allocate
//! a fresh `Vec` per frame; it hands back a borrow of the builder's internal
//! buffer instead. Tying that borrow's lifetime to `&mut self` (rather than
//! documenting "don't call build() again before you're done with this") is
//! the whole point: the compiler, not a runtime warning, rejects code that
//! retains the slice across the next `build()`.

use std::ops::Deref;

#[derive(Debug)]
pub enum DrawlistBytes<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl<'a> Deref for DrawlistBytes<'a> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DrawlistBytes::Owned(v) => v.as_slice(),
            DrawlistBytes::Borrowed(s) => s,
        }
    }
}

impl<'a> AsRef<[u8]> for DrawlistBytes<'a> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl<'a> PartialEq<[u8]> for DrawlistBytes<'a> {
    fn eq(&self, other: &[u8]) -> bool {
        self.deref() == other
    }
}
