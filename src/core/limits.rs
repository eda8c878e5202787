//! Decode safety limits.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest versioned metadata blob accepted, envelope included.
    pub max_metadata_bytes: usize,
    pub max_cbor_map_entries: usize,
    pub max_cbor_text_string_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_metadata_bytes: 16 * 1024 * 1024,
            max_cbor_map_entries: 16,
            max_cbor_text_string_len: 256,
        }
    }
}
