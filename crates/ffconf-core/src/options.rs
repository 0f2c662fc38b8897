//! Strict block readers.
//!
//! Every configuration block is read through an [`OptionsGetter`], which
//! records each key it hands out. Dropping the getter without calling
//! [`OptionsGetter::finish`] skips the check, so the type is `#[must_use]`
//! and every reader in this crate ends with `finish()?`.

use crate::error::{ConfigError, Result};
use crate::node::{Node, NodeKind};
use crate::systematic::Direction;
use std::collections::{BTreeMap, BTreeSet};

#[must_use = "call finish() so unread keys are reported"]
#[derive(Debug)]
pub struct OptionsGetter {
    block: String,
    entries: BTreeMap<String, Node>,
    used: BTreeSet<String>,
}

impl OptionsGetter {
    /// Wrap a mapping node. `block` is the label used in error messages,
    /// e.g. `sample 'ttbar'`.
    pub fn new(block: impl Into<String>, node: &Node) -> Result<Self> {
        let block = block.into();
        match node {
            Node::Map(entries) => Ok(Self {
                block,
                entries: entries.clone(),
                used: BTreeSet::new(),
            }),
            // An empty YAML block (`general:`) parses as null.
            Node::Null => Ok(Self {
                block,
                entries: BTreeMap::new(),
                used: BTreeSet::new(),
            }),
            other => Err(ConfigError::TypeMismatch {
                key: block.clone(),
                block: "configuration".to_string(),
                expected: vec![NodeKind::Map],
                found: other.kind(),
            }),
        }
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Mark `key` as read and return its value when present and non-null,
    /// rejecting kinds outside `allowed`.
    pub fn get(&mut self, key: &str, allowed: &[NodeKind]) -> Result<Option<Node>> {
        self.used.insert(key.to_string());
        match self.entries.get(key) {
            None | Some(Node::Null) => Ok(None),
            Some(node) if allowed.is_empty() || allowed.contains(&node.kind()) => {
                Ok(Some(node.clone()))
            }
            Some(node) => Err(self.mismatch(key, allowed, node.kind())),
        }
    }

    pub fn get_str(&mut self, key: &str) -> Result<Option<String>> {
        Ok(match self.get(key, &[NodeKind::Str])? {
            Some(Node::Str(value)) => Some(value),
            _ => None,
        })
    }

    pub fn str_or(&mut self, key: &str, default: &str) -> Result<String> {
        Ok(self.get_str(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn require_str(&mut self, key: &str) -> Result<String> {
        self.get_str(key)?
            .ok_or_else(|| ConfigError::missing(&self.block, key))
    }

    pub fn get_bool(&mut self, key: &str) -> Result<Option<bool>> {
        Ok(match self.get(key, &[NodeKind::Bool])? {
            Some(Node::Bool(value)) => Some(value),
            _ => None,
        })
    }

    pub fn bool_or(&mut self, key: &str, default: bool) -> Result<bool> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    pub fn get_int(&mut self, key: &str) -> Result<Option<i64>> {
        Ok(match self.get(key, &[NodeKind::Int])? {
            Some(Node::Int(value)) => Some(value),
            _ => None,
        })
    }

    /// Integers are accepted wherever a float is expected.
    pub fn get_float(&mut self, key: &str) -> Result<Option<f64>> {
        Ok(self
            .get(key, &[NodeKind::Int, NodeKind::Float])?
            .and_then(|node| node.as_f64()))
    }

    pub fn get_str_list(&mut self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(items) = self.get_seq(key)? else {
            return Ok(None);
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Node::Str(value) => Ok(value),
                other => Err(self.element_mismatch(key, index, &[NodeKind::Str], other.kind())),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn str_list_or(&mut self, key: &str, default: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .get_str_list(key)?
            .unwrap_or_else(|| default.iter().map(|item| item.to_string()).collect()))
    }

    pub fn get_int_list(&mut self, key: &str) -> Result<Option<Vec<i64>>> {
        let Some(items) = self.get_seq(key)? else {
            return Ok(None);
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Node::Int(value) => Ok(value),
                other => Err(self.element_mismatch(key, index, &[NodeKind::Int], other.kind())),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    pub fn get_float_list(&mut self, key: &str) -> Result<Option<Vec<f64>>> {
        let Some(items) = self.get_seq(key)? else {
            return Ok(None);
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_f64().ok_or_else(|| {
                    self.element_mismatch(
                        key,
                        index,
                        &[NodeKind::Int, NodeKind::Float],
                        item.kind(),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// A list whose every element must itself be a mapping block.
    pub fn get_map_list(&mut self, key: &str) -> Result<Option<Vec<Node>>> {
        let Some(items) = self.get_seq(key)? else {
            return Ok(None);
        };
        for (index, item) in items.iter().enumerate() {
            if item.kind() != NodeKind::Map {
                return Err(self.element_mismatch(key, index, &[NodeKind::Map], item.kind()));
            }
        }
        Ok(Some(items))
    }

    pub fn get_map(&mut self, key: &str) -> Result<Option<BTreeMap<String, Node>>> {
        Ok(match self.get(key, &[NodeKind::Map])? {
            Some(Node::Map(map)) => Some(map),
            _ => None,
        })
    }

    /// Keys present in the block that were never requested.
    pub fn unused_options(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| !self.used.contains(*key))
            .cloned()
            .collect()
    }

    /// Consume the getter, failing when any key was left unread.
    pub fn finish(self) -> Result<()> {
        let keys = self.unused_options();
        if keys.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::UnconsumedKey {
                block: self.block,
                keys,
            })
        }
    }

    fn get_seq(&mut self, key: &str) -> Result<Option<Vec<Node>>> {
        Ok(match self.get(key, &[NodeKind::Seq])? {
            Some(Node::Seq(items)) => Some(items),
            _ => None,
        })
    }

    fn mismatch(&self, key: &str, allowed: &[NodeKind], found: NodeKind) -> ConfigError {
        ConfigError::TypeMismatch {
            block: self.block.clone(),
            key: key.to_string(),
            expected: allowed.to_vec(),
            found,
        }
    }

    fn element_mismatch(
        &self,
        key: &str,
        index: usize,
        allowed: &[NodeKind],
        found: NodeKind,
    ) -> ConfigError {
        self.mismatch(&format!("{key}[{index}]"), allowed, found)
    }
}

/// Reader for a systematic `variation` block, where the up and down
/// variants share one mapping and are addressed as `<option>_<direction>`.
#[must_use = "call finish() so unread keys are reported"]
#[derive(Debug)]
pub struct VariationOptionsGetter {
    inner: OptionsGetter,
}

impl VariationOptionsGetter {
    pub fn new(block: impl Into<String>, node: &Node) -> Result<Self> {
        Ok(Self {
            inner: OptionsGetter::new(block, node)?,
        })
    }

    /// `option = ""` reads the bare `up` / `down` key.
    pub fn key(option: &str, direction: Direction) -> String {
        if option.is_empty() {
            direction.as_str().to_string()
        } else {
            format!("{option}_{}", direction.as_str())
        }
    }

    pub fn get_str(&mut self, option: &str, direction: Direction) -> Result<Option<String>> {
        self.inner.get_str(&Self::key(option, direction))
    }

    pub fn unused_options(&self) -> Vec<String> {
        self.inner.unused_options()
    }

    pub fn finish(self) -> Result<()> {
        self.inner.finish()
    }
}
