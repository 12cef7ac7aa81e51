//! Per-builder configuration caps (spec §3 "Build caps").

/// Capacity and behavior caps for a [`crate::DrawlistBuilder`]. All byte/count
/// caps are positive `i32`; `encoded_string_cache_cap` additionally accepts
/// `0` to mean "disabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildCaps {
    pub max_drawlist_bytes: i32,
    pub max_cmd_count: i32,
    pub max_blob_bytes: i32,
    pub max_blobs: i32,
    pub max_string_bytes: i32,
    pub max_strings: i32,
    pub validate_params: bool,
    pub reuse_output_buffer: bool,
    pub encoded_string_cache_cap: i32,
}

impl Default for BuildCaps {
    fn default() -> Self {
        Self {
            max_drawlist_bytes: 2 * 1024 * 1024,
            max_cmd_count: 100_000,
            max_blob_bytes: 512 * 1024,
            max_blobs: 10_000,
            max_string_bytes: 512 * 1024,
            max_strings: 10_000,
            validate_params: true,
            reuse_output_buffer: false,
            encoded_string_cache_cap: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let caps = BuildCaps::default();
        assert_eq!(caps.max_drawlist_bytes, 2 * 1024 * 1024);
        assert_eq!(caps.max_cmd_count, 100_000);
        assert_eq!(caps.max_blob_bytes, 512 * 1024);
        assert_eq!(caps.max_blobs, 10_000);
        assert_eq!(caps.max_string_bytes, 512 * 1024);
        assert_eq!(caps.max_strings, 10_000);
        assert!(caps.validate_params);
        assert!(!caps.reuse_output_buffer);
        assert_eq!(caps.encoded_string_cache_cap, 0);
    }
}
