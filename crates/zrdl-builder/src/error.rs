//! Builder error taxonomy (spec §4.3 "Validation and error taxonomy").

/// The four error codes a builder can latch. Each carries a human-readable
/// `detail` but no structured payload beyond that — callers branch on the
/// enum discriminant, not on string content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Non-integer or out-of-range inputs, wrong argument types, malformed
    /// segment objects, blob length not 4-aligned, blob index out of range.
    #[error("bad params: {detail}")]
    BadParams { detail: String },

    /// Any cap exceeded (bytes, count, blob count, string count, command
    /// count), including post-write size estimation.
    #[error("too large: {detail}")]
    TooLarge { detail: String },

    /// Internal framing invariant violated at build time (misaligned
    /// offsets, section length mismatches).
    #[error("format: {detail}")]
    Format { detail: String },

    /// Impossible states (span table inconsistent, cursor misalignment).
    #[error("internal: {detail}")]
    Internal { detail: String },
}

impl BuildError {
    pub fn bad_params(detail: impl Into<String>) -> Self {
        Self::BadParams { detail: detail.into() }
    }

    pub fn too_large(detail: impl Into<String>) -> Self {
        Self::TooLarge { detail: detail.into() }
    }

    pub fn format(detail: impl Into<String>) -> Self {
        Self::Format { detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal { detail: detail.into() }
    }

    /// Stable error code string, mirroring the spec's `error_code` field.
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::BadParams { .. } => "BAD_PARAMS",
            BuildError::TooLarge { .. } => "TOO_LARGE",
            BuildError::Format { .. } => "FORMAT",
            BuildError::Internal { .. } => "INTERNAL",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            BuildError::BadParams { detail }
            | BuildError::TooLarge { detail }
            | BuildError::Format { detail }
            | BuildError::Internal { detail } => detail,
        }
    }
}
