//! Error types for the configuration engine
//!
//! Every failure is fatal to the build. Errors that concern a specific
//! parameter carry a `path`; inner layers report the local name and each
//! enclosing layer prefixes its own segment via [`ConfigError::prefixed`],
//! so the error that reaches the caller names the full path from the
//! process root.

use thiserror::Error;

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building, validating or serializing a process
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Kind mismatch on read or override
    #[error("Type error at '{path}': expected {expected}, found {found}")]
    Type {
        path: String,
        expected: String,
        found: String,
    },

    /// Missing parameter, label or fragment
    #[error("Not found: '{path}'")]
    NotFound { path: String },

    /// Malformed literal (InputTag, EventID, EventRange, wire text, ...)
    #[error("Parse error in {what} '{input}': {reason}")]
    Parse {
        what: String,
        input: String,
        reason: String,
    },

    /// Integer width overflow
    #[error("Range error at '{path}': {value} does not fit in {kind}")]
    Range {
        path: String,
        value: String,
        kind: String,
    },

    /// Label re-used across incompatible roles, or a role not admitted where used
    #[error("Role conflict for '{label}': {reason}")]
    RoleConflict { label: String, reason: String },

    /// More than one Source registered
    #[error("Duplicate source: '{existing}' is already registered, cannot add '{label}'")]
    DuplicateSource { existing: String, label: String },

    /// A path, sequence or task references a label not in the registry
    #[error("Unresolved label '{label}' referenced from '{referrer}'")]
    UnresolvedLabel { label: String, referrer: String },

    /// Sequence or task nesting forms a cycle
    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    /// Mutation after serialization
    #[error("Process '{0}' is frozen after serialization")]
    Frozen(String),

    /// FileInPath lookup missed every search-path entry
    #[error("File '{file}' for '{path}' not found in search path [{search_path}]")]
    FileInPathNotFound {
        path: String,
        file: String,
        search_path: String,
    },

    /// JSON export error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error, including zstd encode and decode failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create a type error
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::Type {
            path: path.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a parse error
    pub fn parse(
        what: impl Into<String>,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            what: what.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a role conflict
    pub fn role_conflict(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RoleConflict {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Prefix the parameter path of this error with an enclosing segment.
    ///
    /// Index segments (`[0]`) are glued without a dot. Errors that carry no
    /// parameter path are returned unchanged.
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            Self::Type {
                path,
                expected,
                found,
            } => Self::Type {
                path: join_path(prefix, &path),
                expected,
                found,
            },
            Self::NotFound { path } => Self::NotFound {
                path: join_path(prefix, &path),
            },
            Self::Range { path, value, kind } => Self::Range {
                path: join_path(prefix, &path),
                value,
                kind,
            },
            Self::FileInPathNotFound {
                path,
                file,
                search_path,
            } => Self::FileInPathNotFound {
                path: join_path(prefix, &path),
                file,
                search_path,
            },
            other => other,
        }
    }
}

/// Join two dotted path fragments
pub(crate) fn join_path(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        prefix.to_string()
    } else if rest.starts_with('[') {
        format!("{}{}", prefix, rest)
    } else {
        format!("{}.{}", prefix, rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_builds_full_path() {
        let err = ConfigError::type_mismatch("tag", "string", "int32")
            .prefixed("[0]")
            .prefixed("ListOfRecordToMerge")
            .prefixed("siStripQualityESProducer")
            .prefixed("process");

        match err {
            ConfigError::Type { path, .. } => {
                assert_eq!(path, "process.siStripQualityESProducer.ListOfRecordToMerge[0].tag");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prefixed_leaves_pathless_errors_alone() {
        let err = ConfigError::Frozen("Reader".to_string()).prefixed("process");
        assert!(matches!(err, ConfigError::Frozen(name) if name == "Reader"));
    }

    #[test]
    fn test_display_messages() {
        let err = ConfigError::not_found("process.reader.pt_cut");
        assert_eq!(err.to_string(), "Not found: 'process.reader.pt_cut'");
    }
}
