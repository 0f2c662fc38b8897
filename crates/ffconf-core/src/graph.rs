//! The resolved entity graph.
//!
//! Entities live in flat arenas owned by [`Configuration`]; memberships are
//! stored as typed indices into those arenas, so a serialized graph refers
//! to regions, samples and systematics by their position in the emitted
//! `regions`, `samples` and `systematics` arrays.

use crate::cutflow::Cutflow;
use crate::error::{ConfigError, Result};
use crate::general::General;
use crate::ntuple::NtupleRule;
use crate::region::Region;
use crate::sample::Sample;
use crate::systematic::Systematic;
use serde::Serialize;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_id!(RegionId);
arena_id!(SampleId);
arena_id!(SystematicId);

/// Arena handles for the two halves of one variation pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairIds {
    pub up: Option<SystematicId>,
    pub down: Option<SystematicId>,
}

impl PairIds {
    pub fn ids(&self) -> impl Iterator<Item = SystematicId> {
        self.up.into_iter().chain(self.down)
    }

    /// The side used for shared properties such as regions.
    pub fn primary(&self) -> Option<SystematicId> {
        self.up.or(self.down)
    }
}

/// Fully cross-resolved configuration. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub(crate) general: General,
    pub(crate) regions: Vec<Region>,
    pub(crate) samples: Vec<Sample>,
    pub(crate) systematics: Vec<Systematic>,
    pub(crate) systematic_pairs: Vec<PairIds>,
    pub(crate) ntuple: Option<NtupleRule>,
    pub(crate) cutflows: Vec<Cutflow>,
}

impl Configuration {
    pub fn general(&self) -> &General {
        &self.general
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    pub fn region_id(&self, name: &str) -> Option<RegionId> {
        self.regions
            .iter()
            .position(|region| region.name == name)
            .map(RegionId)
    }

    pub fn region_by_name(&self, name: &str) -> Option<&Region> {
        self.region_id(name).map(|id| self.region(id))
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, id: SampleId) -> &Sample {
        &self.samples[id.0]
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = SampleId> + use<> {
        (0..self.samples.len()).map(SampleId)
    }

    pub fn sample_id(&self, name: &str) -> Option<SampleId> {
        self.samples
            .iter()
            .position(|sample| sample.name == name)
            .map(SampleId)
    }

    pub fn sample_by_name(&self, name: &str) -> Option<&Sample> {
        self.sample_id(name).map(|id| self.sample(id))
    }

    pub fn mc_samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|sample| !sample.is_data())
    }

    pub fn systematics(&self) -> &[Systematic] {
        &self.systematics
    }

    pub fn systematic(&self, id: SystematicId) -> &Systematic {
        &self.systematics[id.0]
    }

    pub fn systematic_id(&self, name: &str) -> Option<SystematicId> {
        self.systematics
            .iter()
            .position(|systematic| systematic.name == name)
            .map(SystematicId)
    }

    pub fn systematic_by_name(&self, name: &str) -> Option<&Systematic> {
        self.systematic_id(name).map(|id| self.systematic(id))
    }

    /// The synthetic nominal always sits first in the arena.
    pub fn nominal(&self) -> &Systematic {
        &self.systematics[0]
    }

    /// Pairs of non-nominal systematics, declared ones first, then any
    /// discovered through a catalog.
    pub fn systematic_pairs(&self) -> &[PairIds] {
        &self.systematic_pairs
    }

    /// Reverse lookup; not stored on the systematic.
    pub fn samples_with_systematic(&self, id: SystematicId) -> impl Iterator<Item = &Sample> {
        self.samples
            .iter()
            .filter(move |sample| sample.has_systematic(id))
    }

    pub fn sample_regions<'a>(&'a self, sample: &'a Sample) -> impl Iterator<Item = &'a Region> {
        sample.regions.iter().map(|id| self.region(*id))
    }

    pub fn sample_systematics<'a>(
        &'a self,
        sample: &'a Sample,
    ) -> impl Iterator<Item = &'a Systematic> {
        sample.systematics.iter().map(|id| self.systematic(*id))
    }

    pub fn systematic_regions<'a>(
        &'a self,
        systematic: &'a Systematic,
    ) -> impl Iterator<Item = &'a Region> {
        systematic.regions.iter().map(|id| self.region(*id))
    }

    pub fn ntuple(&self) -> Option<&NtupleRule> {
        self.ntuple.as_ref()
    }

    /// The ntuple step cannot run without an `ntuples` block.
    pub fn require_ntuple(&self) -> Result<&NtupleRule> {
        self.ntuple
            .as_ref()
            .ok_or_else(|| ConfigError::missing("configuration", "ntuples"))
    }

    pub fn cutflows(&self) -> &[Cutflow] {
        &self.cutflows
    }

    /// Every `(region, variable)` name pair in declaration order.
    pub fn region_variable_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.regions.iter().flat_map(|region| {
            region
                .variables
                .iter()
                .map(move |variable| (region.name.as_str(), variable.name.as_str()))
        })
    }
}
