//! Inclusive / unfolding partition of a resolved [`Configuration`].
//!
//! The split never touches the graph; it only produces views over it.

use crate::error::{ConfigError, ReferenceKind, Result};
use crate::graph::{Configuration, PairIds, SampleId};
use crate::sample::Sample;
use crate::systematic::pair_stem;
use serde::Serialize;
use std::str::FromStr;

const OWNER: &str = "unfolding descriptor";

pub const HISTO_FOLDER_UP: &str = "HistoFolderNameUp";
pub const HISTO_FOLDER_DOWN: &str = "HistoFolderNameDown";

/// Folder keys an unfolding systematic uses in place of each histogram
/// folder key.
const UNFOLDING_FOLDERS: [(&str, [&str; 3]); 2] = [
    (
        HISTO_FOLDER_UP,
        [
            "AcceptanceFolderNameUp",
            "MigrationFolderNameUp",
            "SelectionEffFolderNameUp",
        ],
    ),
    (
        HISTO_FOLDER_DOWN,
        [
            "AcceptanceFolderNameDown",
            "MigrationFolderNameDown",
            "SelectionEffFolderNameDown",
        ],
    ),
];

/// `sample,truth_level,truth_variable,reco_variable`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnfoldingDescriptor {
    pub sample_name: String,
    pub truth_level_name: String,
    pub truth_variable_name: String,
    pub reco_variable_name: String,
}

impl FromStr for UnfoldingDescriptor {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let [sample, level, truth, reco] = parts.as_slice() else {
            return Err(ConfigError::invalid_value(
                OWNER,
                "unfolding",
                format!("expected sample,truth_level,truth_variable,reco_variable, got '{value}'"),
            ));
        };
        if parts.iter().any(|part| part.is_empty()) {
            return Err(ConfigError::invalid_value(
                OWNER,
                "unfolding",
                format!("empty field in '{value}'"),
            ));
        }
        Ok(Self {
            sample_name: sample.to_string(),
            truth_level_name: level.to_string(),
            truth_variable_name: truth.to_string(),
            reco_variable_name: reco.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Inclusive,
    Unfolding,
}

/// A systematic pair restricted to a set of MC samples, with the folder keys
/// its branch writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystematicView {
    pub branch: Branch,
    pub pair: PairIds,
    pub name: String,
    pub samples: Vec<SampleId>,
    /// Folder keys in emission order, each mapped to the systematic name.
    pub folder_keys: Vec<(String, String)>,
}

impl SystematicView {
    pub fn new(config: &Configuration, pair: PairIds, branch: Branch, samples: Vec<SampleId>) -> Self {
        Self {
            branch,
            name: pair_name(config, &pair),
            folder_keys: folder_keys(config, &pair, branch),
            pair,
            samples,
        }
    }
}

/// One inclusive view per systematic pair over every MC sample it reaches.
/// Pairs reaching no MC sample are skipped.
pub fn systematic_views(config: &Configuration) -> Vec<SystematicView> {
    config
        .systematic_pairs()
        .iter()
        .filter_map(|pair| {
            let samples = mc_samples_linked(config, pair);
            (!samples.is_empty())
                .then(|| SystematicView::new(config, *pair, Branch::Inclusive, samples))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnfoldingSplit {
    pub descriptor: UnfoldingDescriptor,
    pub unfolding_samples: Vec<SampleId>,
    pub inclusive_samples: Vec<SampleId>,
    pub inclusive_systematics: Vec<SystematicView>,
    pub unfolding_systematics: Vec<SystematicView>,
}

impl UnfoldingSplit {
    pub fn new(config: &Configuration, descriptor: UnfoldingDescriptor) -> Result<Self> {
        check_descriptor(config, &descriptor)?;

        let (unfolding_samples, inclusive_samples): (Vec<SampleId>, Vec<SampleId>) = config
            .sample_ids()
            .filter(|id| !config.sample(*id).is_data())
            .partition(|id| is_unfolding_sample(config.sample(*id), &descriptor));

        if !unfolding_samples
            .iter()
            .any(|id| config.sample(*id).name == descriptor.sample_name)
        {
            return Err(ConfigError::unknown(
                ReferenceKind::Sample,
                &descriptor.sample_name,
                OWNER,
            ));
        }

        let mut inclusive_systematics = Vec::new();
        let mut unfolding_systematics = Vec::new();
        for pair in config.systematic_pairs() {
            let (unfolding, inclusive): (Vec<SampleId>, Vec<SampleId>) = mc_samples_linked(config, pair)
                .into_iter()
                .partition(|id| unfolding_samples.contains(id));
            if !inclusive.is_empty() {
                inclusive_systematics.push(SystematicView::new(
                    config,
                    *pair,
                    Branch::Inclusive,
                    inclusive,
                ));
            }
            if !unfolding.is_empty() {
                unfolding_systematics.push(SystematicView::new(
                    config,
                    *pair,
                    Branch::Unfolding,
                    unfolding,
                ));
            }
        }

        Ok(Self {
            descriptor,
            unfolding_samples,
            inclusive_samples,
            inclusive_systematics,
            unfolding_systematics,
        })
    }

    pub fn is_unfolding(&self, id: SampleId) -> bool {
        self.unfolding_samples.contains(&id)
    }
}

fn mc_samples_linked(config: &Configuration, pair: &PairIds) -> Vec<SampleId> {
    config
        .sample_ids()
        .filter(|id| {
            let sample = config.sample(*id);
            !sample.is_data() && pair.ids().any(|systematic| sample.has_systematic(systematic))
        })
        .collect()
}

fn is_unfolding_sample(sample: &Sample, descriptor: &UnfoldingDescriptor) -> bool {
    sample
        .truth(&descriptor.truth_level_name)
        .is_some_and(|truth| truth.variable(&descriptor.truth_variable_name).is_some())
}

fn check_descriptor(config: &Configuration, descriptor: &UnfoldingDescriptor) -> Result<()> {
    let levels: Vec<_> = config
        .samples()
        .iter()
        .filter_map(|sample| sample.truth(&descriptor.truth_level_name))
        .collect();
    if levels.is_empty() {
        return Err(ConfigError::unknown(
            ReferenceKind::TruthLevel,
            &descriptor.truth_level_name,
            OWNER,
        ));
    }
    if !levels
        .iter()
        .any(|truth| truth.variable(&descriptor.truth_variable_name).is_some())
    {
        return Err(ConfigError::unknown(
            ReferenceKind::Variable,
            &descriptor.truth_variable_name,
            OWNER,
        ));
    }
    // An unknown sample is reported by the caller; fall back to every region.
    let has_reco = match config.sample_by_name(&descriptor.sample_name) {
        Some(sample) => config
            .sample_regions(sample)
            .any(|region| region.variable(&descriptor.reco_variable_name).is_some()),
        None => config
            .regions()
            .iter()
            .any(|region| region.variable(&descriptor.reco_variable_name).is_some()),
    };
    if !has_reco {
        return Err(ConfigError::unknown(
            ReferenceKind::Variable,
            &descriptor.reco_variable_name,
            OWNER,
        ));
    }
    Ok(())
}

fn pair_name(config: &Configuration, pair: &PairIds) -> String {
    pair_stem(
        pair.up.map(|id| config.systematic(id).name.as_str()),
        pair.down.map(|id| config.systematic(id).name.as_str()),
    )
}

fn folder_keys(config: &Configuration, pair: &PairIds, branch: Branch) -> Vec<(String, String)> {
    let sides = [(HISTO_FOLDER_UP, pair.up), (HISTO_FOLDER_DOWN, pair.down)];
    let mut keys = Vec::new();
    for (key, id) in sides {
        let Some(id) = id else { continue };
        let folder = config.systematic(id).name.clone();
        match branch {
            Branch::Inclusive => keys.push((key.to_string(), folder)),
            Branch::Unfolding => {
                let renamed = UNFOLDING_FOLDERS
                    .iter()
                    .find(|(histo, _)| *histo == key)
                    .map_or(&[][..], |(_, renamed)| &renamed[..]);
                keys.extend(
                    renamed
                        .iter()
                        .map(|renamed| (renamed.to_string(), folder.clone())),
                );
            }
        }
    }
    keys
}
