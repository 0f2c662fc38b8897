use crate::error::Result;
use crate::node::Node;
use crate::options::OptionsGetter;
use serde::Serialize;

/// A derived column defined on the dataframe before any selection runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomColumn {
    pub name: String,
    pub definition: String,
}

/// Read a `define_custom_columns` list; `owner` labels the enclosing block.
pub fn read_custom_columns(nodes: &[Node], owner: &str) -> Result<Vec<CustomColumn>> {
    nodes
        .iter()
        .map(|node| {
            let mut getter = OptionsGetter::new(format!("custom column of {owner}"), node)?;
            let name = getter.require_str("name")?;
            let definition = getter.require_str("definition")?;
            getter.finish()?;
            Ok(CustomColumn { name, definition })
        })
        .collect()
}
