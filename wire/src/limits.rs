//! Configurable limits for bounded decoding.

/// Wire-level limits for frame and message decoding.
///
/// These limits are enforced during decoding so a misbehaving peer cannot
/// force unbounded allocation. A frame that exceeds them is malformed and
/// ends the connection it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum frame payload size in bytes (excluding the length prefix).
    pub max_frame_bytes: usize,

    /// Maximum length of an entity kind tag in bytes.
    pub max_kind_len: usize,

    /// Maximum length of an input action name in bytes.
    pub max_action_len: usize,

    /// Maximum length of free-form text (reject reasons) in bytes.
    pub max_text_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // Messages are small; 64 KB leaves plenty of headroom.
            max_frame_bytes: 64 * 1024,
            max_kind_len: 64,
            max_action_len: 64,
            max_text_len: 256,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_frame_bytes: 1024,
            max_kind_len: 16,
            max_action_len: 16,
            max_text_len: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_bytes: usize::MAX,
            max_kind_len: usize::MAX,
            max_action_len: usize::MAX,
            max_text_len: usize::MAX,
        }
    }
}
