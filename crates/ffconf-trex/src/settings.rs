//! Optional overlay read from a small YAML file next to the analysis
//! config. Every key is checked, like the analysis blocks.

use crate::block::Value;
use ffconf_core::{ConfigError, EntityKind, Node, NodeKind, OptionsGetter};

/// Per-sample presentation overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSettings {
    pub name: String,
    pub kind: Option<String>,
    pub title: Option<String>,
    /// Sets both fill and line colour unless those are given separately.
    pub color: Option<i64>,
    pub fill_color: Option<i64>,
    pub line_color: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    pub fit_type: String,
    pub fit_region: String,
    pub poi_asimov: Value,
    pub fit_blind: Value,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            fit_type: "SPLUSB".to_string(),
            fit_region: "CRSR".to_string(),
            poi_asimov: Value::Int(1),
            fit_blind: Value::Bool(true),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub samples: Vec<SampleSettings>,
    pub fit: FitSettings,
}

impl Settings {
    pub fn from_node(node: &Node) -> Result<Self, ConfigError> {
        let mut getter = OptionsGetter::new("trex settings", node)?;
        let sample_nodes = getter.get_map_list("samples")?.unwrap_or_default();
        let fit_node = getter.get("Fit", &[NodeKind::Map])?.unwrap_or(Node::Null);
        getter.finish()?;

        let mut samples: Vec<SampleSettings> = Vec::with_capacity(sample_nodes.len());
        for node in &sample_nodes {
            let sample = read_sample(node)?;
            if samples.iter().any(|known| known.name == sample.name) {
                return Err(ConfigError::DuplicateName {
                    kind: EntityKind::Sample,
                    name: sample.name,
                });
            }
            samples.push(sample);
        }

        Ok(Self {
            samples,
            fit: read_fit(&fit_node)?,
        })
    }

    pub fn sample(&self, name: &str) -> Option<&SampleSettings> {
        self.samples.iter().find(|sample| sample.name == name)
    }
}

fn read_sample(node: &Node) -> Result<SampleSettings, ConfigError> {
    let mut getter = OptionsGetter::new("sample of trex settings", node)?;
    let sample = SampleSettings {
        name: getter.require_str("name")?,
        kind: getter.get_str("Type")?,
        title: getter.get_str("Title")?,
        color: getter.get_int("Color")?,
        fill_color: getter.get_int("FillColor")?,
        line_color: getter.get_int("LineColor")?,
    };
    getter.finish()?;
    Ok(sample)
}

fn read_fit(node: &Node) -> Result<FitSettings, ConfigError> {
    let mut getter = OptionsGetter::new("Fit of trex settings", node)?;
    let defaults = FitSettings::default();
    let fit_type = getter.str_or("FitType", &defaults.fit_type)?;
    let fit_region = getter.str_or("FitRegion", &defaults.fit_region)?;
    let poi_asimov = match getter.get("POIAsimov", &[NodeKind::Int, NodeKind::Float])? {
        Some(Node::Int(value)) => Value::Int(value),
        Some(Node::Float(value)) => Value::Float(value),
        _ => defaults.poi_asimov,
    };
    let fit_blind = match getter.get("FitBlind", &[NodeKind::Bool, NodeKind::Str])? {
        Some(Node::Bool(value)) => Value::Bool(value),
        Some(Node::Str(value)) => Value::Str(value),
        _ => defaults.fit_blind,
    };
    getter.finish()?;
    Ok(FitSettings {
        fit_type,
        fit_region,
        poi_asimov,
        fit_blind,
    })
}
