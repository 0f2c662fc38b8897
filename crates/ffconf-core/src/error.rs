//! Error types for configuration resolution.

use crate::node::NodeKind;
use std::fmt;

/// Kinds of named entities that must be unique within their scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Region,
    Variable,
    Sample,
    Systematic,
    TruthBlock,
    Cutflow,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Region => "region",
            Self::Variable => "variable",
            Self::Sample => "sample",
            Self::Systematic => "systematic",
            Self::TruthBlock => "truth block",
            Self::Cutflow => "cutflow",
        };
        f.write_str(label)
    }
}

/// Kinds of names that can appear in include/exclude/match lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Region,
    Sample,
    Variable,
    Campaign,
    TruthLevel,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Region => "region",
            Self::Sample => "sample",
            Self::Variable => "variable",
            Self::Campaign => "campaign",
            Self::TruthLevel => "truth level",
        };
        f.write_str(label)
    }
}

/// Every way a configuration can be rejected.
///
/// `block` / `owner` fields carry a human label such as `sample 'ttbar'` so the
/// rendered message names both the entity and the field at fault.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Keys present in a block that no accessor ever read.
    #[error("key(s) {keys:?} used in {block} are not supported")]
    UnconsumedKey { block: String, keys: Vec<String> },

    /// A value is present but its shape is not one of the accepted kinds.
    #[error("option '{key}' in {block} has invalid type {found} (allowed: {})", join_kinds(.expected))]
    TypeMismatch {
        block: String,
        key: String,
        expected: Vec<NodeKind>,
        found: NodeKind,
    },

    #[error("missing required option '{field}' in {block}")]
    MissingField { block: String, field: String },

    #[error("invalid binning for variable '{variable}': {reason}")]
    Binning { variable: String, reason: String },

    #[error("unknown {kind} '{name}' referenced by {owner}")]
    UnknownReference {
        kind: ReferenceKind,
        name: String,
        owner: String,
    },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("options '{first}' and '{second}' cannot both be set in {owner}")]
    MutuallyExclusive {
        owner: String,
        first: String,
        second: String,
    },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    #[error("invalid pattern '{pattern}' in {owner}: {source}")]
    InvalidPattern {
        owner: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for '{key}' in {block}: {reason}")]
    InvalidValue {
        block: String,
        key: String,
        reason: String,
    },

    /// The raw document could not be turned into a node tree.
    #[error("document error: {0}")]
    Document(String),
}

impl ConfigError {
    pub fn missing(block: &str, field: &str) -> Self {
        Self::MissingField {
            block: block.to_string(),
            field: field.to_string(),
        }
    }

    pub fn unknown(kind: ReferenceKind, name: &str, owner: &str) -> Self {
        Self::UnknownReference {
            kind,
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }

    pub fn exclusive(owner: &str, first: &str, second: &str) -> Self {
        Self::MutuallyExclusive {
            owner: owner.to_string(),
            first: first.to_string(),
            second: second.to_string(),
        }
    }

    pub fn invalid_value(block: &str, key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            block: block.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

fn join_kinds(kinds: &[NodeKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_message_lists_allowed_kinds() {
        let err = ConfigError::TypeMismatch {
            block: "general block".to_string(),
            key: "number_of_cpus".to_string(),
            expected: vec![NodeKind::Int],
            found: NodeKind::Str,
        };
        assert_eq!(
            err.to_string(),
            "option 'number_of_cpus' in general block has invalid type string (allowed: integer)"
        );
    }

    #[test]
    fn unknown_reference_names_owner() {
        let err = ConfigError::unknown(ReferenceKind::Region, "CR", "sample 'ttbar'");
        assert_eq!(
            err.to_string(),
            "unknown region 'CR' referenced by sample 'ttbar'"
        );
    }
}
