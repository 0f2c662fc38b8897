//! # FFConf Core
//!
//! Resolution engine for analysis configuration documents: every block is
//! read strictly (unknown keys are errors), defaults flow from `general`
//! into regions, samples and systematics, and the many-to-many links
//! between them are resolved once into an immutable [`Configuration`].
//!
//! ## Pipeline
//!
//! ```text
//! Node                  ← raw YAML / TOML / JSON tree
//!     │
//! General               ← defaults, campaigns, job splitting
//!     │
//! Region → Variable     ← binning, 2D pairs
//!     │
//! Sample, Systematic    ← selectors, truth blocks, variations
//!     │
//! Resolver              ← cross-linking, discovery, ntuple / cutflow rules
//!     │
//! Configuration         ← arenas + typed ids
//!     │
//! UnfoldingSplit        ← optional inclusive / unfolding views
//! ```
//!
//! The crate performs no file I/O.

pub mod column;
pub mod compaction;
pub mod cutflow;
pub mod error;
pub mod general;
pub mod graph;
pub mod node;
pub mod ntuple;
pub mod options;
pub mod region;
pub mod resolve;
pub mod sample;
pub mod selector;
pub mod systematic;
pub mod truth;
pub mod unfolding;
pub mod variable;

pub use column::CustomColumn;
pub use compaction::{Compacted, compact};
pub use cutflow::{Cutflow, CutflowStep};
pub use error::{ConfigError, EntityKind, ReferenceKind, Result};
pub use general::{DebugLevel, General, JobSplitting, RunOverrides};
pub use graph::{Configuration, PairIds, RegionId, SampleId, SystematicId};
pub use node::{Format, Node, NodeKind, parse_str, parse_yaml};
pub use ntuple::NtupleRule;
pub use options::{OptionsGetter, VariationOptionsGetter};
pub use region::{Region, VariablePair};
pub use resolve::{Resolver, SystematicsCatalog, resolve};
pub use sample::{Sample, SampleKind, UniqueSampleId};
pub use selector::{Pattern, Selector};
pub use systematic::{Direction, Origin, Systematic, SystematicPair, pair_stem};
pub use truth::{MatchPair, TruthBlock};
pub use unfolding::{
    Branch, SystematicView, UnfoldingDescriptor, UnfoldingSplit, systematic_views,
};
pub use variable::{Binning, NOSYS, Variable};
