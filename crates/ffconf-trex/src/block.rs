//! Text model of a TRExFitter config: keyword blocks holding ordered
//! `Key: value` lines, grouped into commented sections.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(text) if needs_quotes(text) => write!(f, "\"{text}\""),
            Self::Str(text) => f.write_str(text),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
        }
    }
}

fn needs_quotes(text: &str) -> bool {
    text.contains(char::is_whitespace) || text.contains('#')
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub keyword: &'static str,
    pub name: String,
    entries: Vec<(String, Value)>,
}

impl Block {
    pub fn new(keyword: &'static str, name: impl Into<String>) -> Self {
        Self {
            keyword,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Replace the value of `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(known, _)| known == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Append comma-separated names to `key`, extending an existing list.
    pub fn extend_list(&mut self, key: &str, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let joined = names.join(",");
        match self.entries.iter_mut().find(|(known, _)| known == key) {
            Some((_, Value::Str(existing))) => {
                existing.push(',');
                existing.push_str(&joined);
            }
            Some((_, slot)) => *slot = Value::Str(joined),
            None => self.entries.push((key.to_string(), Value::Str(joined))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(known, _)| known == key)
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: \"{}\"", self.keyword, self.name)?;
        for (key, value) in &self.entries {
            writeln!(f, "\t{key}: {value}")?;
        }
        writeln!(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(title: &'static str, blocks: Vec<Block>) -> Self {
        Self { title, blocks }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(self.title.len() + 4);
        writeln!(f, "% {rule} %")?;
        writeln!(f, "% - {} - %", self.title)?;
        writeln!(f, "% {rule} %")?;
        writeln!(f)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
