//! # FFConf TREx
//!
//! Writes a TRExFitter config from a resolved [`ffconf_core::Configuration`]:
//! one `Job` and `Fit` block, a `Region` per region and variable, a `Sample`
//! per sample, the signal `NormFactor` and a `Systematic` per variation pair.
//! Membership lists go through [`ffconf_core::compact`], so each block names
//! whichever of its included or excluded entries is shorter.
//!
//! With an [`ffconf_core::UnfoldingSplit`] the unfolding half of the MC
//! samples is written as `UnfoldingSample` / `UnfoldingSystematic` blocks.

pub mod block;
pub mod error;
pub mod export;
pub mod settings;

pub use block::{Block, Section, Value};
pub use error::{ExportError, Result};
pub use export::{TrexExport, fit_region_name};
pub use settings::{FitSettings, SampleSettings, Settings};
