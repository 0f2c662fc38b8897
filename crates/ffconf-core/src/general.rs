//! The `general` block: run-wide settings and the defaults inherited by
//! samples, systematics and truth blocks.

use crate::column::{CustomColumn, read_custom_columns};
use crate::error::{ConfigError, Result};
use crate::node::{Node, NodeKind};
use crate::options::OptionsGetter;
use crate::selector::{Pattern, compile_patterns};
use crate::variable::NOSYS;
use serde::Serialize;
use std::collections::BTreeMap;

const BLOCK: &str = "general block";

/// Campaigns known without any `luminosity` entry, each at 1.0.
pub const DEFAULT_CAMPAIGNS: [&str; 5] = ["mc20a", "mc20d", "mc20e", "mc23a", "mc23c"];

pub const DEFAULT_XSECTION_FILE: &str = "data/XSection-MC16-13TeV.data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebugLevel {
    Error,
    #[default]
    Warning,
    Info,
    Debug,
}

impl DebugLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARNING" => Some(Self::Warning),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Peek at `general.debug_level` without resolving the document, so the
    /// caller can set up logging before resolution starts.
    pub fn from_document(root: &Node) -> Result<Self> {
        match root.get("general").and_then(|general| general.get("debug_level")) {
            None | Some(Node::Null) => Ok(Self::default()),
            Some(Node::Str(value)) => Self::parse(value).ok_or_else(|| {
                ConfigError::invalid_value(
                    BLOCK,
                    "debug_level",
                    format!("unknown level '{value}' (allowed: ERROR, WARNING, INFO, DEBUG)"),
                )
            }),
            Some(other) => Err(ConfigError::TypeMismatch {
                block: BLOCK.to_string(),
                key: "debug_level".to_string(),
                expected: vec![NodeKind::Str],
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSplitting {
    pub split_n_jobs: u32,
    pub job_index: u32,
}

impl Default for JobSplitting {
    fn default() -> Self {
        Self {
            split_n_jobs: 1,
            job_index: 0,
        }
    }
}

/// Values given on the command line. Each one beats the `general` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Restrict the run to these samples; `None` keeps every sample.
    pub samples: Option<Vec<String>>,
    pub split_n_jobs: Option<u32>,
    pub job_index: Option<u32>,
    pub min_event: Option<u64>,
    pub max_event: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct General {
    pub debug_level: DebugLevel,
    pub input_filelist_path: Option<String>,
    pub input_sumweights_path: Option<String>,
    pub output_path_histograms: String,
    pub output_path_ntuples: String,
    pub custom_frame_name: String,
    pub automatic_systematics: bool,
    pub nominal_only: bool,
    pub create_tlorentz_vectors_for: Vec<String>,
    pub number_of_cpus: u32,
    pub xsection_files: Vec<String>,
    pub luminosity: BTreeMap<String, f64>,
    pub min_event: Option<u64>,
    pub max_event: Option<u64>,
    pub default_sumweights: String,
    pub default_event_weights: Option<String>,
    pub default_reco_tree_name: String,
    pub custom_columns: Vec<CustomColumn>,
    pub reco_to_truth_pairing_indices: Vec<String>,
    pub exclude_systematics: Vec<Pattern>,
    pub job_splitting: JobSplitting,
}

impl General {
    pub fn from_node(node: &Node, overrides: &RunOverrides) -> Result<Self> {
        let mut getter = OptionsGetter::new(BLOCK, node)?;

        let debug_level = match getter.get_str("debug_level")? {
            None => DebugLevel::default(),
            Some(value) => DebugLevel::parse(&value).ok_or_else(|| {
                ConfigError::invalid_value(BLOCK, "debug_level", format!("unknown level '{value}'"))
            })?,
        };
        let input_filelist_path = getter.get_str("input_filelist_path")?;
        let input_sumweights_path = getter.get_str("input_sumweights_path")?;
        let output_path_histograms = getter.str_or("output_path_histograms", "")?;
        let output_path_ntuples = getter.str_or("output_path_ntuples", "")?;
        let custom_frame_name = getter.str_or("custom_frame_name", "")?;

        let automatic_systematics = getter.bool_or("automatic_systematics", false)?;
        let nominal_only = getter.bool_or("nominal_only", false)?;
        if automatic_systematics && nominal_only {
            return Err(ConfigError::exclusive(
                BLOCK,
                "automatic_systematics",
                "nominal_only",
            ));
        }

        let create_tlorentz_vectors_for = getter.str_list_or("create_tlorentz_vectors_for", &[])?;
        let number_of_cpus = match getter.get_int("number_of_cpus")? {
            None => 1,
            Some(value) => u32::try_from(value)
                .ok()
                .filter(|cpus| *cpus >= 1)
                .ok_or_else(|| {
                    ConfigError::invalid_value(BLOCK, "number_of_cpus", "must be at least 1")
                })?,
        };
        let xsection_files = getter.str_list_or("xsection_files", &[DEFAULT_XSECTION_FILE])?;
        let luminosity = read_luminosity(getter.get_map("luminosity")?)?;

        let min_event = read_event_index(&mut getter, "min_event")?;
        let min_event = overrides.min_event.or(min_event);
        let max_event = read_event_index(&mut getter, "max_event")?;
        let max_event = overrides.max_event.or(max_event);
        if let (Some(min), Some(max)) = (min_event, max_event)
            && min > max
        {
            return Err(ConfigError::invalid_value(
                BLOCK,
                "min_event",
                format!("min_event ({min}) is larger than max_event ({max})"),
            ));
        }

        let default_sumweights = getter.str_or("default_sumweights", NOSYS)?;
        let default_event_weights = getter.get_str("default_event_weights")?;
        let default_reco_tree_name = getter.str_or("default_reco_tree_name", "reco")?;
        let custom_columns = read_custom_columns(
            &getter.get_map_list("define_custom_columns")?.unwrap_or_default(),
            BLOCK,
        )?;
        let reco_to_truth_pairing_indices =
            getter.str_list_or("reco_to_truth_pairing_indices", &["eventNumber"])?;
        let exclude_systematics =
            compile_patterns(&getter.str_list_or("exclude_systematics", &[])?, BLOCK)?;
        let job_splitting = read_job_splitting(&mut getter, overrides)?;

        getter.finish()?;
        Ok(Self {
            debug_level,
            input_filelist_path,
            input_sumweights_path,
            output_path_histograms,
            output_path_ntuples,
            custom_frame_name,
            automatic_systematics,
            nominal_only,
            create_tlorentz_vectors_for,
            number_of_cpus,
            xsection_files,
            luminosity,
            min_event,
            max_event,
            default_sumweights,
            default_event_weights,
            default_reco_tree_name,
            custom_columns,
            reco_to_truth_pairing_indices,
            exclude_systematics,
            job_splitting,
        })
    }

    pub fn campaign_is_defined(&self, campaign: &str) -> bool {
        self.luminosity.contains_key(campaign)
    }

    pub fn luminosity(&self, campaign: &str) -> Option<f64> {
        self.luminosity.get(campaign).copied()
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &str> + Clone {
        self.luminosity.keys().map(String::as_str)
    }
}

fn read_luminosity(entries: Option<BTreeMap<String, Node>>) -> Result<BTreeMap<String, f64>> {
    let mut luminosity: BTreeMap<String, f64> = DEFAULT_CAMPAIGNS
        .iter()
        .map(|campaign| (campaign.to_string(), 1.0))
        .collect();
    let Some(entries) = entries else {
        tracing::info!("no luminosity block, using default campaigns");
        return Ok(luminosity);
    };
    for (campaign, value) in entries {
        let value = value.as_f64().ok_or_else(|| ConfigError::TypeMismatch {
            block: BLOCK.to_string(),
            key: format!("luminosity.{campaign}"),
            expected: vec![NodeKind::Int, NodeKind::Float],
            found: value.kind(),
        })?;
        luminosity.insert(campaign, value);
    }
    Ok(luminosity)
}

fn read_event_index(getter: &mut OptionsGetter, key: &str) -> Result<Option<u64>> {
    getter
        .get_int(key)?
        .map(|value| {
            u64::try_from(value)
                .map_err(|_| ConfigError::invalid_value(BLOCK, key, "must not be negative"))
        })
        .transpose()
}

fn read_job_splitting(getter: &mut OptionsGetter, overrides: &RunOverrides) -> Result<JobSplitting> {
    let mut read = |key: &str, default: u32| -> Result<u32> {
        match getter.get_int(key)? {
            None => Ok(default),
            Some(value) => u32::try_from(value)
                .map_err(|_| ConfigError::invalid_value(BLOCK, key, "must not be negative")),
        }
    };
    let from_block = JobSplitting {
        split_n_jobs: read("split_n_jobs", 1)?,
        job_index: read("job_index", 0)?,
    };
    let splitting = JobSplitting {
        split_n_jobs: overrides.split_n_jobs.unwrap_or(from_block.split_n_jobs),
        job_index: overrides.job_index.unwrap_or(from_block.job_index),
    };
    if splitting.split_n_jobs == 0 {
        return Err(ConfigError::invalid_value(
            BLOCK,
            "split_n_jobs",
            "must be at least 1",
        ));
    }
    if splitting.job_index >= splitting.split_n_jobs {
        return Err(ConfigError::invalid_value(
            BLOCK,
            "job_index",
            format!(
                "job_index {} is out of range for {} jobs",
                splitting.job_index, splitting.split_n_jobs
            ),
        ));
    }
    Ok(splitting)
}
