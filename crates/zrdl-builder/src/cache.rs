//! Optional per-builder UTF-8 encoding cache (spec §4.3 "Interning and
//! growth", §9 "UTF-8 encoding cache").
//!
//! Not part of the wire contract — an implementation may omit it entirely.
//! Kept here for fidelity to the spec: short strings (<= 96 bytes) seen
//! across repeated `build()`/`reset()` cycles on the same builder skip
//! re-encoding. The cache is cleared wholesale (not LRU) once it reaches
//! `cap` distinct entries, matching the spec's "cleared when full" policy.
//! Unlike the builder's own buffers, this cache is intentionally NOT
//! cleared by `reset()`: its entire purpose is amortizing cost across the
//! frames that `reset()` separates.

use std::collections::HashMap;

const MAX_CACHEABLE_LEN: usize = 96;

pub(crate) struct EncodedStringCache {
    cap: usize,
    entries: HashMap<String, Box<[u8]>>,
}

impl EncodedStringCache {
    pub(crate) fn new(cap: i32) -> Self {
        Self {
            cap: cap.max(0) as usize,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get_or_encode(&mut self, s: &str) -> Vec<u8> {
        if self.cap == 0 {
            return s.as_bytes().to_vec();
        }
        if let Some(bytes) = self.entries.get(s) {
            return bytes.to_vec();
        }
        let bytes = s.as_bytes().to_vec();
        if s.len() <= MAX_CACHEABLE_LEN {
            if self.entries.len() >= self.cap {
                self.entries.clear();
            }
            self.entries
                .insert(s.to_string(), bytes.clone().into_boxed_slice());
        }
        bytes
    }
}
