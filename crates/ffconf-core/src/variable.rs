use crate::error::{ConfigError, EntityKind, Result};
use crate::node::{Node, NodeKind};
use crate::options::OptionsGetter;
use serde::Serialize;

/// Token reserved for the nominal variation; observables may not carry it.
pub const NOSYS: &str = "NOSYS";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binning {
    Regular { min: f64, max: f64, count: u32 },
    Irregular { edges: Vec<f64> },
}

impl Binning {
    /// Read a `binning` block: either `min`/`max`/`number_of_bins` or
    /// `bin_edges`, never both.
    pub fn from_node(variable: &str, node: &Node) -> Result<Self> {
        let mut getter = OptionsGetter::new(format!("binning of variable '{variable}'"), node)?;
        let min = getter.get_float("min")?.unwrap_or(0.0);
        let max = getter.get_float("max")?.unwrap_or(0.0);
        let count = getter.get_int("number_of_bins")?.unwrap_or(0);
        let edges = getter.get_float_list("bin_edges")?.unwrap_or_default();
        getter.finish()?;

        let fail = |reason: &str| ConfigError::Binning {
            variable: variable.to_string(),
            reason: reason.to_string(),
        };

        let regular = min < max && count > 0;
        if edges.is_empty() != regular {
            return Err(fail(
                "specify either bin_edges or min, max and number_of_bins",
            ));
        }

        if !edges.is_empty() {
            if edges.len() < 2 {
                return Err(fail("at least 2 bin edges are required"));
            }
            if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(fail("bin edges must be strictly increasing"));
            }
            return Ok(Self::Irregular { edges });
        }

        let count = u32::try_from(count).map_err(|_| fail("number_of_bins is too large"))?;
        Ok(Self::Regular { min, max, count })
    }

    pub fn bin_count(&self) -> usize {
        match self {
            Self::Regular { count, .. } => *count as usize,
            Self::Irregular { edges } => edges.len() - 1,
        }
    }

    /// Lower edges of every bin plus the upper edge of the last one.
    pub fn edges(&self) -> Vec<f64> {
        match self {
            Self::Regular { min, max, count } => {
                let width = (max - min) / f64::from(*count);
                (0..=*count)
                    .map(|index| min + width * f64::from(index))
                    .collect()
            }
            Self::Irregular { edges } => edges.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub title: String,
    pub definition: String,
    pub binning: Binning,
}

impl Variable {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut getter = OptionsGetter::new("variable block", node)?;
        let name = getter.require_str("name")?;
        if name.contains(NOSYS) {
            return Err(ConfigError::InvalidName {
                kind: EntityKind::Variable,
                name,
                reason: format!("must not contain '{NOSYS}'"),
            });
        }
        let block = format!("variable '{name}'");
        let title = getter.str_or("title", "")?;
        let definition = getter
            .get_str("definition")?
            .ok_or_else(|| ConfigError::missing(&block, "definition"))?;
        let binning_node = getter
            .get("binning", &[NodeKind::Map])?
            .ok_or_else(|| ConfigError::missing(&block, "binning"))?;
        let binning = Binning::from_node(&name, &binning_node)?;
        getter.finish()?;
        Ok(Self {
            name,
            title,
            definition,
            binning,
        })
    }
}

/// Build a list of variables, rejecting repeated names within it.
pub fn read_variables(nodes: &[Node]) -> Result<Vec<Variable>> {
    let mut variables: Vec<Variable> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let variable = Variable::from_node(node)?;
        if variables.iter().any(|known| known.name == variable.name) {
            return Err(ConfigError::DuplicateName {
                kind: EntityKind::Variable,
                name: variable.name,
            });
        }
        variables.push(variable);
    }
    Ok(variables)
}
