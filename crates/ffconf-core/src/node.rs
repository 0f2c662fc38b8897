//! Raw document tree handed to the engine by the document parser.
//!
//! YAML, TOML and JSON documents are all folded into the same closed
//! [`Node`] shape so block readers can check value kinds against
//! [`NodeKind`] instead of a runtime type list.

use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Node>),
    Map(BTreeMap<String, Node>),
}

/// Closed set of value shapes used for option type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Seq,
    Map,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Seq => "list",
            Self::Map => "mapping",
        };
        f.write_str(label)
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Null => NodeKind::Null,
            Self::Bool(_) => NodeKind::Bool,
            Self::Int(_) => NodeKind::Int,
            Self::Float(_) => NodeKind::Float,
            Self::Str(_) => NodeKind::Str,
            Self::Seq(_) => NodeKind::Seq,
            Self::Map(_) => NodeKind::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Map lookup; `None` for missing keys and non-map nodes.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Numeric view accepting both integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

/// Serialization formats accepted for configuration documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    /// Pick a format from a file extension; unknown extensions read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse document text into a node tree.
pub fn parse_str(text: &str, format: Format) -> Result<Node> {
    match format {
        Format::Yaml => {
            let value: serde_yaml::Value = serde_yaml::from_str(text)
                .map_err(|e| ConfigError::Document(format!("invalid yaml: {e}")))?;
            Node::try_from(value)
        }
        Format::Toml => {
            let table: toml::Table = toml::from_str(text)
                .map_err(|e| ConfigError::Document(format!("invalid toml: {e}")))?;
            Ok(Node::from(toml::Value::Table(table)))
        }
        Format::Json => {
            let value: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| ConfigError::Document(format!("invalid json: {e}")))?;
            Ok(Node::from(value))
        }
    }
}

/// Shorthand used heavily by tests and callers that embed YAML.
pub fn parse_yaml(text: &str) -> Result<Node> {
    parse_str(text, Format::Yaml)
}

impl TryFrom<serde_yaml::Value> for Node {
    type Error = ConfigError;

    fn try_from(value: serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value;
        Ok(match value {
            Value::Null => Node::Null,
            Value::Bool(flag) => Node::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Node::Int(int),
                None => Node::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => Node::Str(text),
            Value::Sequence(items) => Node::Seq(
                items
                    .into_iter()
                    .map(Node::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, item) in mapping {
                    let Value::String(key) = key else {
                        return Err(ConfigError::Document(format!(
                            "mapping keys must be strings, found {key:?}"
                        )));
                    };
                    map.insert(key, Node::try_from(item)?);
                }
                Node::Map(map)
            }
            Value::Tagged(tagged) => Node::try_from(tagged.value)?,
        })
    }
}

impl From<toml::Value> for Node {
    fn from(value: toml::Value) -> Self {
        use toml::Value;
        match value {
            Value::String(text) => Node::Str(text),
            Value::Integer(int) => Node::Int(int),
            Value::Float(float) => Node::Float(float),
            Value::Boolean(flag) => Node::Bool(flag),
            Value::Datetime(datetime) => Node::Str(datetime.to_string()),
            Value::Array(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::Table(table) => Node::Map(
                table
                    .into_iter()
                    .map(|(key, item)| (key, Node::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Node::Null,
            Value::Bool(flag) => Node::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Node::Int(int),
                None => Node::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => Node::Str(text),
            Value::Array(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::Object(object) => Node::Map(
                object
                    .into_iter()
                    .map(|(key, item)| (key, Node::from(item)))
                    .collect(),
            ),
        }
    }
}
