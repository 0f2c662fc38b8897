use crate::column::{CustomColumn, read_custom_columns};
use crate::error::{ConfigError, ReferenceKind, Result};
use crate::node::Node;
use crate::options::OptionsGetter;
use crate::variable::{Variable, read_variables};
use serde::Serialize;

/// A reco-level variable paired with the truth-level variable it unfolds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPair {
    pub reco: String,
    pub truth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruthBlock {
    pub name: String,
    pub truth_tree_name: String,
    pub selection: String,
    pub event_weight: String,
    pub match_variables: Vec<MatchPair>,
    pub variables: Vec<Variable>,
    pub produce_unfolding: bool,
    pub custom_columns: Vec<CustomColumn>,
}

impl TruthBlock {
    /// `sample` names the owning sample for error messages.
    pub fn from_node(node: &Node, sample: &str) -> Result<Self> {
        let mut getter = OptionsGetter::new(format!("truth block of sample '{sample}'"), node)?;
        let name = getter.require_str("name")?;
        let block = format!("truth block '{name}' of sample '{sample}'");
        let missing = |field: &str| ConfigError::missing(&block, field);

        let truth_tree_name = getter
            .get_str("truth_tree_name")?
            .ok_or_else(|| missing("truth_tree_name"))?;
        let selection = getter.str_or("selection", "")?;
        let event_weight = getter
            .get_str("event_weight")?
            .ok_or_else(|| missing("event_weight"))?;
        let match_nodes = getter
            .get_map_list("match_variables")?
            .ok_or_else(|| missing("match_variables"))?;
        let variables = read_variables(&getter.get_map_list("variables")?.unwrap_or_default())?;
        if variables.is_empty() {
            return Err(missing("variables"));
        }
        let produce_unfolding = getter.bool_or("produce_unfolding", false)?;
        let custom_columns = read_custom_columns(
            &getter.get_map_list("define_custom_columns")?.unwrap_or_default(),
            &block,
        )?;
        getter.finish()?;

        let mut match_variables = Vec::with_capacity(match_nodes.len());
        for match_node in &match_nodes {
            let mut pair = OptionsGetter::new(format!("match_variables of {block}"), match_node)?;
            let reco = pair.require_str("reco")?;
            let truth = pair.require_str("truth")?;
            pair.finish()?;
            if !variables.iter().any(|variable| variable.name == truth) {
                return Err(ConfigError::unknown(ReferenceKind::Variable, &truth, &block));
            }
            match_variables.push(MatchPair { reco, truth });
        }

        Ok(Self {
            name,
            truth_tree_name,
            selection,
            event_weight,
            match_variables,
            variables,
            produce_unfolding,
            custom_columns,
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// Check every matched reco variable against the variables reachable
    /// through the owning sample's regions.
    pub fn check_reco_variables<'a>(
        &self,
        sample: &str,
        reco_variables: impl Iterator<Item = &'a str> + Clone,
    ) -> Result<()> {
        for pair in &self.match_variables {
            if !reco_variables.clone().any(|name| name == pair.reco) {
                return Err(ConfigError::unknown(
                    ReferenceKind::Variable,
                    &pair.reco,
                    &format!("truth block '{}' of sample '{sample}'", self.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_yaml;

    const PARTON: &str = r#"
name: parton
truth_tree_name: truth
event_weight: weight_mc
match_variables:
  - {reco: jet_pt, truth: parton_pt}
variables:
  - name: parton_pt
    definition: t_pt
    binning: {min: 0, max: 500, number_of_bins: 5}
"#;

    #[test]
    fn reads_a_truth_block() {
        let truth = TruthBlock::from_node(&parse_yaml(PARTON).unwrap(), "ttbar").unwrap();
        assert_eq!(truth.selection, "");
        assert!(!truth.produce_unfolding);
        assert_eq!(truth.match_variables[0].reco, "jet_pt");
        assert!(truth.variable("parton_pt").is_some());
    }

    #[test]
    fn match_truth_must_be_a_block_variable() {
        let yaml = PARTON.replace("truth: parton_pt", "truth: parton_eta");
        let err = TruthBlock::from_node(&parse_yaml(&yaml).unwrap(), "ttbar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown variable 'parton_eta' referenced by truth block 'parton' of sample 'ttbar'"
        );
    }

    #[test]
    fn reco_variables_are_checked_later() {
        let truth = TruthBlock::from_node(&parse_yaml(PARTON).unwrap(), "ttbar").unwrap();
        assert!(truth.check_reco_variables("ttbar", ["jet_pt", "met"].into_iter()).is_ok());
        let err = truth
            .check_reco_variables("ttbar", ["met"].into_iter())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownReference {
                kind: ReferenceKind::Variable,
                ..
            }
        ));
    }

    #[test]
    fn event_weight_is_required() {
        let yaml = PARTON.replace("event_weight: weight_mc\n", "");
        let err = TruthBlock::from_node(&parse_yaml(&yaml).unwrap(), "ttbar").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "event_weight"));
    }
}
