//! Configuration resolution: read every block, then cross-link samples,
//! regions and systematics in one ordered pass.

use crate::cutflow::Cutflow;
use crate::error::{ConfigError, EntityKind, ReferenceKind, Result};
use crate::general::{General, RunOverrides};
use crate::graph::{Configuration, PairIds, RegionId, SystematicId};
use crate::node::{Node, NodeKind};
use crate::ntuple::NtupleRule;
use crate::options::OptionsGetter;
use crate::region::Region;
use crate::sample::Sample;
use crate::selector::matches_any;
use crate::systematic::{Direction, Systematic, SystematicPair, strip_direction_suffix};
use crate::variable::NOSYS;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

const COMMAND_LINE: &str = "command line";

/// Source of systematic variation names available for a sample, such as the
/// folders present in its produced histogram file.
pub trait SystematicsCatalog {
    fn systematics_for(&self, sample: &Sample) -> Vec<String>;
}

impl<F> SystematicsCatalog for F
where
    F: Fn(&Sample) -> Vec<String>,
{
    fn systematics_for(&self, sample: &Sample) -> Vec<String> {
        self(sample)
    }
}

#[derive(Default)]
pub struct Resolver<'a> {
    overrides: RunOverrides,
    catalog: Option<&'a dyn SystematicsCatalog>,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(mut self, overrides: RunOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_catalog(mut self, catalog: &'a dyn SystematicsCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn resolve(&self, root: &Node) -> Result<Configuration> {
        let mut top = OptionsGetter::new("configuration", root)?;
        let general_node = top.get("general", &[NodeKind::Map])?.unwrap_or(Node::Null);
        let region_nodes = top.get_map_list("regions")?.unwrap_or_default();
        let sample_nodes = top.get_map_list("samples")?.unwrap_or_default();
        let systematic_nodes = top.get_map_list("systematics")?.unwrap_or_default();
        let ntuple_node = top.get("ntuples", &[NodeKind::Map])?;
        let cutflow_nodes = top.get_map_list("cutflows")?.unwrap_or_default();
        top.finish()?;

        let general = General::from_node(&general_node, &self.overrides)?;
        let regions = read_regions(&region_nodes)?;
        let samples = self.read_samples(&sample_nodes, &general)?;
        let selected: Option<Vec<&str>> = self
            .overrides
            .samples
            .as_ref()
            .map(|_| samples.iter().map(|sample| sample.name.as_str()).collect());

        let mut pairs = Vec::with_capacity(systematic_nodes.len());
        for node in &systematic_nodes {
            let mut pair = SystematicPair::from_node(node, &general)?;
            if let Some(selected) = &selected {
                for systematic in pair.up.iter_mut().chain(pair.down.iter_mut()) {
                    systematic.sample_selector.retain_matching(selected.iter().copied());
                }
            }
            pairs.push(pair);
        }

        let mut ntuple = ntuple_node
            .as_ref()
            .map(NtupleRule::from_node)
            .transpose()?;
        let mut cutflows = read_cutflows(&cutflow_nodes)?;
        if let Some(selected) = &selected {
            if let Some(ntuple) = ntuple.as_mut() {
                ntuple.sample_selector.retain_matching(selected.iter().copied());
            }
            for cutflow in &mut cutflows {
                cutflow.sample_selector.retain_matching(selected.iter().copied());
            }
        }

        let mut graph = Graph::new(general, regions, samples);
        graph.register_systematics(pairs)?;
        graph.adjust_regions()?;
        graph.check_truth_reco_variables()?;
        graph.adjust_systematics()?;
        graph.discover_systematics(self.catalog);
        graph.warn_unused_systematics();

        if let Some(ntuple) = ntuple.as_mut() {
            ntuple.resolve_selection(&graph.regions)?;
            ntuple.resolve_samples(&graph.samples)?;
        }
        for cutflow in &mut cutflows {
            cutflow.resolve_samples(&graph.samples)?;
        }

        for sample in &graph.samples {
            info!(
                sample = %sample.name,
                regions = sample.regions.len(),
                variables = sample.variables.len(),
                systematics = sample.systematics.len(),
                "resolved sample"
            );
        }

        Ok(Configuration {
            general: graph.general,
            regions: graph.regions,
            samples: graph.samples,
            systematics: graph.systematics,
            systematic_pairs: graph.pairs,
            ntuple,
            cutflows,
        })
    }

    /// Every sample block is read and validated; only the selected ones are
    /// kept when the command line restricts the run.
    fn read_samples(&self, nodes: &[Node], general: &General) -> Result<Vec<Sample>> {
        let mut samples: Vec<Sample> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let sample = Sample::from_node(node, general)?;
            if samples.iter().any(|known| known.name == sample.name) {
                return Err(ConfigError::DuplicateName {
                    kind: EntityKind::Sample,
                    name: sample.name,
                });
            }
            samples.push(sample);
        }

        let Some(selected) = &self.overrides.samples else {
            return Ok(samples);
        };
        for name in selected {
            if !samples.iter().any(|sample| &sample.name == name) {
                return Err(ConfigError::unknown(ReferenceKind::Sample, name, COMMAND_LINE));
            }
        }
        samples.retain(|sample| selected.contains(&sample.name));
        debug!(kept = samples.len(), "restricted samples from the command line");
        Ok(samples)
    }
}

/// Resolve with no overrides and no systematics catalog.
pub fn resolve(root: &Node) -> Result<Configuration> {
    Resolver::new().resolve(root)
}

fn read_regions(nodes: &[Node]) -> Result<Vec<Region>> {
    let mut regions: Vec<Region> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let region = Region::from_node(node)?;
        if regions.iter().any(|known| known.name == region.name) {
            return Err(ConfigError::DuplicateName {
                kind: EntityKind::Region,
                name: region.name,
            });
        }
        regions.push(region);
    }
    Ok(regions)
}

fn read_cutflows(nodes: &[Node]) -> Result<Vec<Cutflow>> {
    let mut cutflows: Vec<Cutflow> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let cutflow = Cutflow::from_node(node)?;
        if cutflows.iter().any(|known| known.name == cutflow.name) {
            return Err(ConfigError::DuplicateName {
                kind: EntityKind::Cutflow,
                name: cutflow.name,
            });
        }
        cutflows.push(cutflow);
    }
    Ok(cutflows)
}

/// Mutable state of the cross-resolution pass.
struct Graph {
    general: General,
    regions: Vec<Region>,
    samples: Vec<Sample>,
    systematics: Vec<Systematic>,
    pairs: Vec<PairIds>,
    names: BTreeSet<String>,
}

impl Graph {
    fn new(general: General, regions: Vec<Region>, samples: Vec<Sample>) -> Self {
        let nominal = Systematic::nominal(&general);
        let names = BTreeSet::from([nominal.name.clone()]);
        Self {
            general,
            regions,
            samples,
            systematics: vec![nominal],
            pairs: Vec::new(),
            names,
        }
    }

    fn push_systematic(&mut self, systematic: Systematic) -> Result<SystematicId> {
        if !self.names.insert(systematic.name.clone()) {
            return Err(ConfigError::DuplicateName {
                kind: EntityKind::Systematic,
                name: systematic.name,
            });
        }
        self.systematics.push(systematic);
        Ok(SystematicId(self.systematics.len() - 1))
    }

    fn register_systematics(&mut self, pairs: Vec<SystematicPair>) -> Result<()> {
        for pair in pairs {
            let up = pair.up.map(|up| self.push_systematic(up)).transpose()?;
            let down = pair.down.map(|down| self.push_systematic(down)).transpose()?;
            self.pairs.push(PairIds { up, down });
        }
        Ok(())
    }

    fn region_names(&self) -> Vec<&str> {
        self.regions.iter().map(|region| region.name.as_str()).collect()
    }

    fn region_ids(&self, names: &[&str]) -> Vec<RegionId> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| names.contains(&region.name.as_str()))
            .map(|(index, _)| RegionId(index))
            .collect()
    }

    /// Region membership for samples and systematics, then the variable
    /// filter of each sample over its regions.
    fn adjust_regions(&mut self) -> Result<()> {
        let universe = self.region_names();
        let mut sample_regions = Vec::with_capacity(self.samples.len());
        for sample in &self.samples {
            let names = sample.region_selector.resolve(
                universe.iter().copied(),
                ReferenceKind::Region,
                &sample.label(),
            )?;
            sample_regions.push(self.region_ids(&names));
        }
        let mut systematic_regions = Vec::with_capacity(self.systematics.len());
        for systematic in &self.systematics {
            let names = systematic.region_selector.resolve(
                universe.iter().copied(),
                ReferenceKind::Region,
                &systematic.label(),
            )?;
            systematic_regions.push(self.region_ids(&names));
        }

        for (sample, regions) in self.samples.iter_mut().zip(sample_regions) {
            sample.regions = regions;
        }
        for (systematic, regions) in self.systematics.iter_mut().zip(systematic_regions) {
            systematic.regions = regions;
        }

        for index in 0..self.samples.len() {
            let available = self.sample_variable_union(index);
            let sample = &self.samples[index];
            let variables = sample.variable_selector.resolve(
                available.iter().map(String::as_str),
                ReferenceKind::Variable,
                &sample.label(),
            )?;
            let variables = variables.into_iter().map(str::to_string).collect();
            self.samples[index].variables = variables;
        }
        Ok(())
    }

    /// Variable names over the sample's regions, first-seen order, no repeats.
    fn sample_variable_union(&self, index: usize) -> Vec<String> {
        let mut union: Vec<String> = Vec::new();
        for region_id in &self.samples[index].regions {
            for variable in &self.regions[region_id.0].variables {
                if !union.contains(&variable.name) {
                    union.push(variable.name.clone());
                }
            }
        }
        union
    }

    fn check_truth_reco_variables(&self) -> Result<()> {
        for (index, sample) in self.samples.iter().enumerate() {
            if sample.truths.is_empty() {
                continue;
            }
            let union = self.sample_variable_union(index);
            for truth in &sample.truths {
                truth.check_reco_variables(&sample.name, union.iter().map(String::as_str))?;
            }
        }
        Ok(())
    }

    /// Link every sample to the systematics that apply to it.
    fn adjust_systematics(&mut self) -> Result<()> {
        let sample_names: Vec<String> = self.samples.iter().map(|s| s.name.clone()).collect();
        for systematic in &self.systematics {
            systematic.sample_selector.check_references(
                sample_names.iter().map(String::as_str),
                ReferenceKind::Sample,
                &systematic.label(),
            )?;
        }

        for sample in &mut self.samples {
            sample.systematics = self
                .systematics
                .iter()
                .enumerate()
                .filter(|(_, systematic)| applies_to(systematic, sample))
                .map(|(index, _)| SystematicId(index))
                .collect();
            debug!(
                sample = %sample.name,
                linked = sample.systematics.len(),
                "linked systematics"
            );
        }
        Ok(())
    }

    /// Add catalogued variations to samples that ask for them.
    fn discover_systematics(&mut self, catalog: Option<&dyn SystematicsCatalog>) {
        let wanted: Vec<usize> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, sample)| sample.automatic_systematics && !sample.is_data())
            .map(|(index, _)| index)
            .collect();
        if wanted.is_empty() {
            return;
        }
        let Some(catalog) = catalog else {
            warn!(
                samples = wanted.len(),
                "automatic systematics requested but no systematics catalog is available"
            );
            return;
        };

        let all_regions: Vec<RegionId> = (0..self.regions.len()).map(RegionId).collect();
        let mut discovered_pairs: BTreeMap<String, usize> = BTreeMap::new();
        for index in wanted {
            let names = catalog.systematics_for(&self.samples[index]);
            for name in names {
                if name == NOSYS || matches_any(&self.samples[index].exclude_systematics, &name) {
                    continue;
                }
                let id = match self.systematics.iter().position(|known| known.name == name) {
                    // A declared block keeps its own sample, campaign and
                    // nominal-only restrictions.
                    Some(position)
                        if !applies_to(&self.systematics[position], &self.samples[index]) =>
                    {
                        debug!(
                            systematic = %name,
                            sample = %self.samples[index].name,
                            "catalogued systematic not applicable to sample"
                        );
                        continue;
                    }
                    Some(position) => SystematicId(position),
                    None => {
                        let mut systematic = Systematic::automatic(&name, &self.general);
                        systematic.regions = all_regions.clone();
                        let direction = systematic.direction;
                        self.names.insert(name.clone());
                        self.systematics.push(systematic);
                        let id = SystematicId(self.systematics.len() - 1);
                        self.pair_discovered(&mut discovered_pairs, &name, direction, id);
                        debug!(systematic = %name, "discovered systematic");
                        id
                    }
                };
                let sample = &mut self.samples[index];
                if !sample.systematics.contains(&id) {
                    sample.systematics.push(id);
                }
            }
        }
    }

    fn pair_discovered(
        &mut self,
        pairs: &mut BTreeMap<String, usize>,
        name: &str,
        direction: Direction,
        id: SystematicId,
    ) {
        let stem = strip_direction_suffix(name).to_string();
        let slot = *pairs.entry(stem).or_insert_with(|| {
            self.pairs.push(PairIds {
                up: None,
                down: None,
            });
            self.pairs.len() - 1
        });
        let side = match direction {
            Direction::Up => &mut self.pairs[slot].up,
            Direction::Down => &mut self.pairs[slot].down,
        };
        if side.is_none() {
            *side = Some(id);
            return;
        }
        // Same stem and direction twice: keep it as its own one-sided pair.
        self.pairs.push(match direction {
            Direction::Up => PairIds {
                up: Some(id),
                down: None,
            },
            Direction::Down => PairIds {
                up: None,
                down: Some(id),
            },
        });
    }

    fn warn_unused_systematics(&self) {
        for (index, systematic) in self.systematics.iter().enumerate().skip(1) {
            let id = SystematicId(index);
            if !self.samples.iter().any(|sample| sample.has_systematic(id)) {
                warn!(systematic = %systematic.name, "systematic is not linked to any sample");
            }
        }
    }
}

/// Data never picks up a variation unless the variation names it explicitly.
fn applies_to(systematic: &Systematic, sample: &Sample) -> bool {
    if systematic.is_nominal() {
        return true;
    }
    if sample.nominal_only {
        return false;
    }
    if !systematic.sample_selector.selects(&sample.name) {
        return false;
    }
    if sample.is_data() && !systematic.sample_selector.is_include() {
        return false;
    }
    match &systematic.campaigns {
        Some(campaigns) => sample
            .campaigns()
            .any(|campaign| campaigns.iter().any(|wanted| wanted == campaign)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_yaml;

    const BASE: &str = r#"
general:
  default_event_weights: weight_mc
  luminosity: {c1: 10.0}
regions:
  - name: SR
    selection: "nJets >= 2"
    variables:
      - {name: pt, definition: jet_pt, binning: {min: 0, max: 200, number_of_bins: 10}}
      - {name: eta, definition: jet_eta, binning: {bin_edges: [-2.5, 0, 2.5]}}
  - name: CR
    selection: "nJets < 2"
    variables:
      - {name: pt, definition: jet_pt, binning: {min: 0, max: 200, number_of_bins: 10}}
samples:
  - {name: Data, simulation_type: data, campaigns: [c1]}
  - {name: mc1, simulation_type: mc, dsids: [1], campaigns: [c1]}
  - {name: mc2, simulation_type: mc, dsids: [2], campaigns: [c1], exclude_regions: [CR]}
"#;

    fn resolve_with(extra: &str) -> Result<Configuration> {
        resolve(&parse_yaml(&format!("{BASE}{extra}")).unwrap())
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let err = resolve_with("sample:\n  - {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnconsumedKey { .. }));
    }

    #[test]
    fn duplicate_regions_are_rejected() {
        let err = resolve(
            &parse_yaml("regions:\n  - {name: SR}\n  - {name: SR}\n").unwrap(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateName {
                kind: EntityKind::Region,
                ..
            }
        ));
    }

    #[test]
    fn variable_union_keeps_first_seen_order() {
        let config = resolve_with("").unwrap();
        assert_eq!(config.sample_by_name("mc1").unwrap().variables, vec!["pt", "eta"]);
        assert_eq!(
            config.sample_by_name("mc2").unwrap().regions,
            vec![config.region_id("SR").unwrap()]
        );
    }

    #[test]
    fn systematic_colliding_with_another_is_rejected() {
        let err = resolve_with(
            "systematics:\n  - variation: {up: JES_UP}\n  - variation: {up: JES_UP}\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateName {
                kind: EntityKind::Systematic,
                ..
            }
        ));
    }

    #[test]
    fn campaigns_restrict_linking() {
        let config = resolve(
            &parse_yaml(&format!(
                "{}  - {{name: mc3, simulation_type: mc, dsids: [3], campaigns: [mc20a]}}\nsystematics:\n  - {{variation: {{up: LUMI}}, campaigns: [mc20a]}}\n",
                BASE
            ))
            .unwrap(),
        )
        .unwrap();
        let id = config.systematic_id("LUMI").unwrap();
        let linked: Vec<&str> = config
            .samples_with_systematic(id)
            .map(|sample| sample.name.as_str())
            .collect();
        assert_eq!(linked, vec!["mc3"]);
    }

    #[test]
    fn closures_work_as_catalogs() {
        let catalog = |sample: &Sample| {
            if sample.name == "mc1" {
                vec!["NOSYS".to_string(), "JET_JER__1up".to_string(), "JET_JER__1down".to_string()]
            } else {
                Vec::new()
            }
        };
        let node = parse_yaml(&BASE.replace(
            "default_event_weights: weight_mc",
            "default_event_weights: weight_mc\n  automatic_systematics: true",
        ))
        .unwrap();
        let config = Resolver::new().with_catalog(&catalog).resolve(&node).unwrap();
        assert_eq!(config.systematics().len(), 3);
        assert_eq!(config.systematic_pairs().len(), 1);
        let pair = config.systematic_pairs()[0];
        assert_eq!(config.systematic(pair.up.unwrap()).name, "JET_JER__1up");
        assert_eq!(config.systematic(pair.down.unwrap()).name, "JET_JER__1down");
        assert!(
            config
                .sample_by_name("Data")
                .unwrap()
                .systematics
                .iter()
                .all(|id| config.systematic(*id).is_nominal())
        );
    }

    fn linked_names<'a>(config: &'a Configuration, sample: &str) -> Vec<&'a str> {
        config
            .sample_systematics(config.sample_by_name(sample).unwrap())
            .map(|systematic| systematic.name.as_str())
            .collect()
    }

    fn automatic(extra_general: &str) -> String {
        BASE.replace(
            "default_event_weights: weight_mc",
            &format!("default_event_weights: weight_mc\n  automatic_systematics: true{extra_general}"),
        )
    }

    #[test]
    fn nominal_only_sample_keeps_just_the_nominal() {
        let node = parse_yaml(&format!(
            "{}systematics:\n  - variation: {{up: JES_UP, down: JES_DOWN}}\n",
            BASE.replace("exclude_regions: [CR]}", "exclude_regions: [CR], nominal_only: true}")
        ))
        .unwrap();
        let config = resolve(&node).unwrap();
        assert_eq!(linked_names(&config, "mc2"), vec![NOSYS]);
        assert_eq!(linked_names(&config, "mc1"), vec![NOSYS, "JES_UP", "JES_DOWN"]);
    }

    #[test]
    fn catalog_respects_declared_sample_selectors() {
        let catalog = |_: &Sample| vec!["JES_UP".to_string(), "JES_DOWN".to_string()];
        let node = parse_yaml(&format!(
            "{}systematics:\n  - variation: {{up: JES_UP, down: JES_DOWN}}\n    exclude_samples: [mc2]\n",
            automatic("")
        ))
        .unwrap();
        let config = Resolver::new().with_catalog(&catalog).resolve(&node).unwrap();
        assert_eq!(config.systematics().len(), 3);
        assert_eq!(linked_names(&config, "mc1"), vec![NOSYS, "JES_UP", "JES_DOWN"]);
        assert_eq!(linked_names(&config, "mc2"), vec![NOSYS]);
        assert_eq!(linked_names(&config, "Data"), vec![NOSYS]);
    }

    #[test]
    fn catalog_names_matching_exclude_systematics_are_dropped() {
        let catalog = |_: &Sample| {
            vec![
                "NOSYS".to_string(),
                "JET_JER__1up".to_string(),
                "MUON_EFF__1up".to_string(),
            ]
        };
        // mc1 replaces the inherited exclusion list with its own.
        let node = parse_yaml(&automatic("\n  exclude_systematics: [\"MUON_.*\"]").replace(
            "dsids: [1], campaigns: [c1]}",
            "dsids: [1], campaigns: [c1], exclude_systematics: [JET_JER]}",
        ))
        .unwrap();
        let config = Resolver::new().with_catalog(&catalog).resolve(&node).unwrap();
        assert_eq!(linked_names(&config, "mc1"), vec![NOSYS, "MUON_EFF__1up"]);
        assert_eq!(linked_names(&config, "mc2"), vec![NOSYS, "JET_JER__1up"]);
        assert_eq!(linked_names(&config, "Data"), vec![NOSYS]);
    }
}
