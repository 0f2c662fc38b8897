use crate::error::{ConfigError, ReferenceKind, Result};
use crate::graph::SampleId;
use crate::node::Node;
use crate::options::OptionsGetter;
use crate::region::Region;
use crate::sample::Sample;
use crate::selector::{Pattern, Selector, compile_patterns, matches_any};
use serde::Serialize;

const BLOCK: &str = "ntuple block";

/// Rules for the flat-ntuple output step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NtupleRule {
    pub sample_selector: Selector,
    pub region_patterns: Option<Vec<Pattern>>,
    /// Either the configured selection or the OR of the matched regions.
    /// `None` keeps every event.
    pub selection: Option<String>,
    pub branches: Vec<String>,
    pub exclude_branches: Vec<String>,
    pub copy_trees: Vec<String>,
    pub samples: Vec<SampleId>,
}

impl NtupleRule {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut getter = OptionsGetter::new(BLOCK, node)?;
        let sample_selector = Selector::from_options(&mut getter, "samples", "exclude_samples")?;
        let selection = getter.get_str("selection")?;
        let regions = getter.get_str_list("regions")?;
        if selection.is_some() && regions.is_some() {
            return Err(ConfigError::exclusive(BLOCK, "selection", "regions"));
        }
        let region_patterns = regions
            .map(|raw| compile_patterns(&raw, BLOCK))
            .transpose()?;
        let branches = getter.str_list_or("branches", &[])?;
        let exclude_branches = getter.str_list_or("exclude_branches", &[])?;
        let copy_trees = getter.str_list_or("copy_trees", &[])?;
        getter.finish()?;
        Ok(Self {
            sample_selector,
            region_patterns,
            selection,
            branches,
            exclude_branches,
            copy_trees,
            samples: Vec::new(),
        })
    }

    /// Combine the selections of the matched regions into one expression.
    pub fn resolve_selection(&mut self, regions: &[Region]) -> Result<()> {
        let Some(patterns) = &self.region_patterns else {
            return Ok(());
        };
        let names = regions.iter().map(|region| region.name.as_str());
        Selector::Include(patterns.clone()).check_references(names, ReferenceKind::Region, BLOCK)?;
        let parts: Vec<String> = regions
            .iter()
            .filter(|region| matches_any(patterns, &region.name) && !region.selection.is_empty())
            .map(|region| format!("({})", region.selection))
            .collect();
        self.selection = if parts.is_empty() {
            None
        } else {
            Some(format!("({})", parts.join(" || ")))
        };
        Ok(())
    }

    pub fn resolve_samples(&mut self, samples: &[Sample]) -> Result<()> {
        let names = samples.iter().map(|sample| sample.name.as_str());
        let selected = self
            .sample_selector
            .resolve(names, ReferenceKind::Sample, BLOCK)?;
        self.samples = samples
            .iter()
            .enumerate()
            .filter(|(_, sample)| selected.contains(&sample.name.as_str()))
            .map(|(index, _)| SampleId(index))
            .collect();
        Ok(())
    }
}
