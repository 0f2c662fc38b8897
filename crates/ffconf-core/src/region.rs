use crate::error::{ConfigError, ReferenceKind, Result};
use crate::node::Node;
use crate::options::OptionsGetter;
use crate::variable::{Variable, read_variables};
use serde::Serialize;

/// A pair of variables filled together into a 2D histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariablePair {
    pub x: String,
    pub y: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub name: String,
    pub selection: String,
    pub variables: Vec<Variable>,
    pub histograms_2d: Vec<VariablePair>,
}

impl Region {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut getter = OptionsGetter::new("region block", node)?;
        let name = getter.require_str("name")?;
        let block = format!("region '{name}'");
        let selection = getter.str_or("selection", "")?;
        let variables = read_variables(&getter.get_map_list("variables")?.unwrap_or_default())?;

        let mut histograms_2d = Vec::new();
        for pair_node in getter.get_map_list("histograms_2d")?.unwrap_or_default() {
            let mut pair = OptionsGetter::new(format!("histograms_2d of {block}"), &pair_node)?;
            let x = pair.require_str("x")?;
            let y = pair.require_str("y")?;
            pair.finish()?;
            for axis in [&x, &y] {
                if !variables.iter().any(|variable| &variable.name == axis) {
                    return Err(ConfigError::unknown(ReferenceKind::Variable, axis, &block));
                }
            }
            histograms_2d.push(VariablePair { x, y });
        }

        getter.finish()?;
        Ok(Self {
            name,
            selection,
            variables,
            histograms_2d,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.variables.iter().map(|variable| variable.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_yaml;

    const SR: &str = r#"
name: SR
selection: "nJets >= 2"
variables:
  - name: pt
    definition: jet_pt
    binning: {min: 0, max: 200, number_of_bins: 10}
  - name: eta
    definition: jet_eta
    binning: {bin_edges: [-2.5, 0, 2.5]}
"#;

    #[test]
    fn reads_variables_in_order() {
        let region = Region::from_node(&parse_yaml(SR).unwrap()).unwrap();
        assert_eq!(region.selection, "nJets >= 2");
        assert_eq!(region.variable_names().collect::<Vec<_>>(), vec!["pt", "eta"]);
        assert!(region.variable("eta").is_some());
    }

    #[test]
    fn histograms_2d_must_reference_declared_variables() {
        let ok = format!("{SR}histograms_2d:\n  - {{x: pt, y: eta}}\n");
        let region = Region::from_node(&parse_yaml(&ok).unwrap()).unwrap();
        assert_eq!(region.histograms_2d.len(), 1);

        let bad = format!("{SR}histograms_2d:\n  - {{x: pt, y: phi}}\n");
        let err = Region::from_node(&parse_yaml(&bad).unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown variable 'phi' referenced by region 'SR'"
        );
    }

    #[test]
    fn missing_name_is_reported() {
        let err = Region::from_node(&parse_yaml("selection: x\n").unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "name"));
    }
}
