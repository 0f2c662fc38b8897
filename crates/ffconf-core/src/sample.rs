use crate::column::{CustomColumn, read_custom_columns};
use crate::error::{ConfigError, EntityKind, ReferenceKind, Result};
use crate::general::General;
use crate::graph::{RegionId, SystematicId};
use crate::node::Node;
use crate::options::OptionsGetter;
use crate::selector::{Pattern, Selector, compile_patterns};
use crate::truth::TruthBlock;
use serde::Serialize;
use std::fmt;

pub const DATA_SIMULATION: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Data,
    Mc,
}

/// One physical dataset slice: dataset id, campaign and simulation type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UniqueSampleId {
    pub dsid: u32,
    pub campaign: String,
    pub simulation: String,
}

impl fmt::Display for UniqueSampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.dsid, self.campaign, self.simulation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub name: String,
    pub kind: SampleKind,
    pub simulation_type: String,
    pub unique_ids: Vec<UniqueSampleId>,
    /// `(event_weights)*(weight_suffix)` when a suffix is configured.
    pub event_weights: String,
    pub selection_suffix: String,
    pub reco_tree_name: String,
    pub reco_to_truth_pairing_indices: Vec<String>,
    pub custom_columns: Vec<CustomColumn>,
    pub truths: Vec<TruthBlock>,
    pub automatic_systematics: bool,
    pub nominal_only: bool,
    pub exclude_systematics: Vec<Pattern>,
    pub region_selector: Selector,
    pub variable_selector: Selector,
    /// Filled during cross-resolution.
    pub regions: Vec<RegionId>,
    pub variables: Vec<String>,
    pub systematics: Vec<SystematicId>,
}

impl Sample {
    pub fn from_node(node: &Node, general: &General) -> Result<Self> {
        let mut getter = OptionsGetter::new("sample block", node)?;
        let name = getter.require_str("name")?;
        let block = format!("sample '{name}'");
        let missing = |field: &str| ConfigError::missing(&block, field);

        let simulation_type = getter
            .get_str("simulation_type")?
            .ok_or_else(|| missing("simulation_type"))?;
        let kind = if simulation_type.eq_ignore_ascii_case(DATA_SIMULATION) {
            SampleKind::Data
        } else {
            SampleKind::Mc
        };

        let dsids = match (getter.get_int_list("dsids")?, kind) {
            (Some(dsids), _) => dsids
                .into_iter()
                .map(|dsid| {
                    u32::try_from(dsid).map_err(|_| {
                        ConfigError::invalid_value(&block, "dsids", format!("invalid dsid {dsid}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            (None, SampleKind::Data) => Vec::new(),
            (None, SampleKind::Mc) => return Err(missing("dsids")),
        };

        let campaigns = getter
            .get_str_list("campaigns")?
            .ok_or_else(|| missing("campaigns"))?;
        if kind == SampleKind::Mc {
            for campaign in &campaigns {
                if !general.campaign_is_defined(campaign) {
                    return Err(ConfigError::unknown(ReferenceKind::Campaign, campaign, &block));
                }
            }
        }

        let selection_suffix = getter.str_or("selection_suffix", "")?;
        let region_selector = Selector::from_options(&mut getter, "regions", "exclude_regions")?;
        let variable_selector =
            Selector::from_options(&mut getter, "variables", "exclude_variables")?;

        let event_weights = match (getter.get_str("event_weights")?, kind) {
            (Some(weights), _) => weights,
            (None, SampleKind::Data) => "1".to_string(),
            (None, SampleKind::Mc) => general
                .default_event_weights
                .clone()
                .ok_or_else(|| missing("event_weights"))?,
        };
        let event_weights = match getter.get_str("weight_suffix")? {
            Some(suffix) => format!("({event_weights})*({suffix})"),
            None => event_weights,
        };

        let reco_tree_name = getter.str_or("reco_tree_name", &general.default_reco_tree_name)?;
        let reco_to_truth_pairing_indices = getter
            .get_str_list("reco_to_truth_pairing_indices")?
            .unwrap_or_else(|| general.reco_to_truth_pairing_indices.clone());
        let custom_columns = match getter.get_map_list("define_custom_columns")? {
            Some(nodes) => read_custom_columns(&nodes, &block)?,
            None => general.custom_columns.clone(),
        };

        let truth_nodes = getter.get_map_list("truth")?.unwrap_or_default();
        let mut truths: Vec<TruthBlock> = Vec::with_capacity(truth_nodes.len());
        for node in &truth_nodes {
            let truth = TruthBlock::from_node(node, &name)?;
            if truths.iter().any(|known| known.name == truth.name) {
                return Err(ConfigError::DuplicateName {
                    kind: EntityKind::TruthBlock,
                    name: truth.name,
                });
            }
            truths.push(truth);
        }

        let automatic_systematics = getter.get_bool("automatic_systematics")?;
        let nominal_only = getter.get_bool("nominal_only")?;
        // Setting one flag on the sample switches off the inherited other one.
        let (automatic_systematics, nominal_only) = match (automatic_systematics, nominal_only) {
            (Some(true), Some(true)) => {
                return Err(ConfigError::exclusive(
                    &block,
                    "automatic_systematics",
                    "nominal_only",
                ));
            }
            (Some(automatic), Some(nominal)) => (automatic, nominal),
            (Some(automatic), None) => (automatic, !automatic && general.nominal_only),
            (None, Some(nominal)) => (!nominal && general.automatic_systematics, nominal),
            (None, None) => (general.automatic_systematics, general.nominal_only),
        };
        let exclude_systematics = match getter.get_str_list("exclude_systematics")? {
            Some(raw) => compile_patterns(&raw, &block)?,
            None => general.exclude_systematics.clone(),
        };
        getter.finish()?;

        let unique_ids = expand_unique_ids(kind, &simulation_type, &dsids, &campaigns);
        Ok(Self {
            name,
            kind,
            simulation_type,
            unique_ids,
            event_weights,
            selection_suffix,
            reco_tree_name,
            reco_to_truth_pairing_indices,
            custom_columns,
            truths,
            automatic_systematics,
            nominal_only,
            exclude_systematics,
            region_selector,
            variable_selector,
            regions: Vec::new(),
            variables: Vec::new(),
            systematics: Vec::new(),
        })
    }

    pub fn is_data(&self) -> bool {
        self.kind == SampleKind::Data
    }

    pub fn label(&self) -> String {
        format!("sample '{}'", self.name)
    }

    pub fn truth(&self, name: &str) -> Option<&TruthBlock> {
        self.truths.iter().find(|truth| truth.name == name)
    }

    pub fn has_systematic(&self, id: SystematicId) -> bool {
        self.systematics.contains(&id)
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        for id in &self.unique_ids {
            if !seen.contains(&id.campaign.as_str()) {
                seen.push(&id.campaign);
            }
        }
        seen.into_iter()
    }
}

/// Data gets one id per campaign with dsid 0; MC gets campaigns x dsids.
pub fn expand_unique_ids(
    kind: SampleKind,
    simulation_type: &str,
    dsids: &[u32],
    campaigns: &[String],
) -> Vec<UniqueSampleId> {
    match kind {
        SampleKind::Data => campaigns
            .iter()
            .map(|campaign| UniqueSampleId {
                dsid: 0,
                campaign: campaign.clone(),
                simulation: DATA_SIMULATION.to_string(),
            })
            .collect(),
        SampleKind::Mc => campaigns
            .iter()
            .flat_map(|campaign| {
                dsids.iter().map(move |dsid| UniqueSampleId {
                    dsid: *dsid,
                    campaign: campaign.clone(),
                    simulation: simulation_type.to_string(),
                })
            })
            .collect(),
    }
}
