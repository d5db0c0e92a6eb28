//! Serializer options

use serde::{Deserialize, Serialize};

/// Options controlling validation and emission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Spaces per nesting level in the text form
    pub indent: usize,
    /// Warn about InputTags naming local labels that are not registered
    pub check_input_tags: bool,
    /// zstd level for the binary form
    pub compression_level: i32,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            check_input_tags: true,
            compression_level: 3,
        }
    }
}
