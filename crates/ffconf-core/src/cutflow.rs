use crate::error::{ConfigError, ReferenceKind, Result};
use crate::graph::SampleId;
use crate::node::Node;
use crate::options::OptionsGetter;
use crate::sample::Sample;
use crate::selector::{Selector, compile_patterns};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutflowStep {
    pub selection: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cutflow {
    pub name: String,
    pub steps: Vec<CutflowStep>,
    pub sample_selector: Selector,
    pub samples: Vec<SampleId>,
}

impl Cutflow {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut getter = OptionsGetter::new("cutflow block", node)?;
        let name = getter.require_str("name")?;
        let block = format!("cutflow '{name}'");
        let step_nodes = getter
            .get_map_list("selections")?
            .ok_or_else(|| ConfigError::missing(&block, "selections"))?;
        let sample_selector = match getter.get_str_list("samples")? {
            Some(raw) => Selector::Include(compile_patterns(&raw, &block)?),
            None => Selector::All,
        };
        getter.finish()?;

        let steps = step_nodes
            .iter()
            .map(|step| {
                let mut step_getter = OptionsGetter::new(format!("selection of {block}"), step)?;
                let selection = step_getter.require_str("selection")?;
                let title = step_getter.require_str("title")?;
                step_getter.finish()?;
                Ok(CutflowStep { selection, title })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name,
            steps,
            sample_selector,
            samples: Vec::new(),
        })
    }

    pub fn resolve_samples(&mut self, samples: &[Sample]) -> Result<()> {
        let owner = format!("cutflow '{}'", self.name);
        let names = samples.iter().map(|sample| sample.name.as_str());
        self.sample_selector
            .check_references(names, ReferenceKind::Sample, &owner)?;
        self.samples = samples
            .iter()
            .enumerate()
            .filter(|(_, sample)| self.sample_selector.selects(&sample.name))
            .map(|(index, _)| SampleId(index))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_yaml;

    #[test]
    fn reads_steps_in_order() {
        let cutflow = Cutflow::from_node(
            &parse_yaml(
                "name: main\nselections:\n  - {selection: \"n_jets > 1\", title: jets}\n  - {selection: \"met > 20\", title: met}\n",
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(cutflow.steps.len(), 2);
        assert_eq!(cutflow.steps[1].title, "met");
        assert!(cutflow.sample_selector.is_all());
    }

    #[test]
    fn step_title_is_required() {
        let err = Cutflow::from_node(
            &parse_yaml("name: main\nselections:\n  - {selection: x}\n").unwrap(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required option 'title' in selection of cutflow 'main'"
        );
    }
}
