use crate::error::{ConfigError, EntityKind, ReferenceKind, Result};
use crate::general::General;
use crate::graph::RegionId;
use crate::node::{Node, NodeKind};
use crate::options::{OptionsGetter, VariationOptionsGetter};
use crate::selector::Selector;
use crate::variable::NOSYS;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Up, Direction::Down];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Guess the direction of a discovered variation name.
    pub fn from_variation_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with("__1down") || lower.ends_with("_down") {
            Self::Down
        } else {
            Self::Up
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Nominal,
    Declared,
    /// Found through a systematics catalog rather than a `systematics` block.
    Automatic,
}

/// One directional variation after resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Systematic {
    pub name: String,
    pub direction: Direction,
    pub origin: Origin,
    pub weight_suffix: String,
    pub sum_weights_override: Option<String>,
    /// The override when present, otherwise the general default.
    pub sum_weights: String,
    pub sample_selector: Selector,
    pub region_selector: Selector,
    pub campaigns: Option<Vec<String>>,
    pub regions: Vec<RegionId>,
}

impl Systematic {
    pub fn nominal(general: &General) -> Self {
        Self {
            name: NOSYS.to_string(),
            direction: Direction::Up,
            origin: Origin::Nominal,
            weight_suffix: String::new(),
            sum_weights_override: None,
            sum_weights: general.default_sumweights.clone(),
            sample_selector: Selector::All,
            region_selector: Selector::All,
            campaigns: None,
            regions: Vec::new(),
        }
    }

    pub fn automatic(name: &str, general: &General) -> Self {
        Self {
            name: name.to_string(),
            direction: Direction::from_variation_name(name),
            origin: Origin::Automatic,
            ..Self::nominal(general)
        }
    }

    pub fn is_nominal(&self) -> bool {
        self.origin == Origin::Nominal
    }

    pub fn label(&self) -> String {
        format!("systematic '{}'", self.name)
    }
}

/// The up and down halves declared by one `systematics` entry. Either side
/// may be absent, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystematicPair {
    pub up: Option<Systematic>,
    pub down: Option<Systematic>,
}

impl SystematicPair {
    pub fn from_node(node: &Node, general: &General) -> Result<Self> {
        let mut getter = OptionsGetter::new("systematic block", node)?;
        let label = getter.get_str("name")?;
        let variation = getter
            .get("variation", &[NodeKind::Map])?
            .ok_or_else(|| ConfigError::missing(&block_label(label.as_deref(), None), "variation"))?;

        let mut variations = VariationOptionsGetter::new("variation block", &variation)?;
        let mut sides: Vec<(Direction, String, String, Option<String>)> = Vec::new();
        for direction in Direction::BOTH {
            let name = variations.get_str("", direction)?;
            let weight_suffix = variations.get_str("weight_suffix", direction)?;
            let sum_weights = variations.get_str("sum_weights", direction)?;
            if let Some(name) = name {
                sides.push((direction, name, weight_suffix.unwrap_or_default(), sum_weights));
            }
        }
        let first_name = sides.first().map(|(_, name, _, _)| name.clone());
        let owner = block_label(label.as_deref(), first_name.as_deref());
        variations.finish().map_err(|err| match err {
            ConfigError::UnconsumedKey { keys, .. } => ConfigError::UnconsumedKey {
                block: format!("variation of {owner}"),
                keys,
            },
            other => other,
        })?;
        if sides.is_empty() {
            return Err(ConfigError::missing(&format!("variation of {owner}"), "up"));
        }

        let sample_selector = Selector::from_options(&mut getter, "samples", "exclude_samples")?;
        let region_selector = Selector::from_options(&mut getter, "regions", "exclude_regions")?;
        let campaigns = getter.get_str_list("campaigns")?;
        if let Some(campaigns) = &campaigns {
            for campaign in campaigns {
                if !general.campaign_is_defined(campaign) {
                    return Err(ConfigError::unknown(ReferenceKind::Campaign, campaign, &owner));
                }
            }
        }
        getter.finish()?;

        let mut pair = Self { up: None, down: None };
        for (direction, name, weight_suffix, sum_weights_override) in sides {
            if name == NOSYS {
                return Err(ConfigError::DuplicateName {
                    kind: EntityKind::Systematic,
                    name,
                });
            }
            let systematic = Systematic {
                name,
                direction,
                origin: Origin::Declared,
                weight_suffix,
                sum_weights: sum_weights_override
                    .clone()
                    .unwrap_or_else(|| general.default_sumweights.clone()),
                sum_weights_override,
                sample_selector: sample_selector.clone(),
                region_selector: region_selector.clone(),
                campaigns: campaigns.clone(),
                regions: Vec::new(),
            };
            match direction {
                Direction::Up => pair.up = Some(systematic),
                Direction::Down => pair.down = Some(systematic),
            }
        }
        Ok(pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Systematic> {
        self.up.iter().chain(self.down.iter())
    }

    pub fn into_systematics(self) -> impl Iterator<Item = Systematic> {
        self.up.into_iter().chain(self.down)
    }
}

fn block_label(label: Option<&str>, first_name: Option<&str>) -> String {
    match (label, first_name) {
        (Some(label), _) => format!("systematic '{label}'"),
        (None, Some(name)) => format!("systematic '{name}'"),
        (None, None) => "systematic block".to_string(),
    }
}

/// Name shared by both halves of a pair. Direction markers are dropped first;
/// when the stems still differ the common prefix is used. `_` is trimmed
/// from both ends.
pub fn pair_stem(up: Option<&str>, down: Option<&str>) -> String {
    let stem = match (up, down) {
        (Some(up), Some(down)) => {
            let (up_stem, down_stem) = (strip_direction_suffix(up), strip_direction_suffix(down));
            if up_stem == down_stem {
                up_stem
            } else {
                common_prefix(up, down)
            }
        }
        (Some(name), None) | (None, Some(name)) => strip_direction_suffix(name),
        (None, None) => "",
    };
    stem.trim_matches('_').to_string()
}

fn common_prefix<'a>(first: &'a str, second: &str) -> &'a str {
    let end = first
        .char_indices()
        .zip(second.chars())
        .take_while(|((_, a), b)| a == b)
        .last()
        .map(|((index, ch), _)| index + ch.len_utf8())
        .unwrap_or(0);
    &first[..end]
}

/// Drop a trailing direction marker such as `__1up` or `_down`.
pub fn strip_direction_suffix(name: &str) -> &str {
    for suffix in ["__1up", "__1down", "_up", "_down", "_UP", "_DOWN", "_Up", "_Down"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            return stem;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general::RunOverrides;
    use crate::node::parse_yaml;

    fn general() -> General {
        General::from_node(&Node::Null, &RunOverrides::default()).unwrap()
    }

    fn pair(yaml: &str) -> Result<SystematicPair> {
        SystematicPair::from_node(&parse_yaml(yaml).unwrap(), &general())
    }

    #[test]
    fn both_directions_share_selectors() {
        let pair = pair(
            "variation: {up: JET_UP, down: JET_DOWN, weight_suffix_down: w_dn}\nsamples: [mc1]\n",
        )
        .unwrap();
        let up = pair.up.as_ref().unwrap();
        let down = pair.down.as_ref().unwrap();
        assert_eq!(up.name, "JET_UP");
        assert_eq!(up.weight_suffix, "");
        assert_eq!(down.weight_suffix, "w_dn");
        assert_eq!(up.sample_selector, down.sample_selector);
        assert!(up.sample_selector.is_include());
        assert_eq!(up.sum_weights, "NOSYS");
        assert_eq!(pair.iter().count(), 2);
    }

    #[test]
    fn one_sided_pair() {
        let pair = pair("variation: {down: EG_RES__1down, sum_weights_down: w}\n").unwrap();
        assert!(pair.up.is_none());
        let down = pair.down.unwrap();
        assert_eq!(down.direction, Direction::Down);
        assert_eq!(down.sum_weights_override.as_deref(), Some("w"));
    }

    #[test]
    fn empty_variation_is_missing() {
        let err = pair("variation: {weight_suffix_up: w}\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn variation_typo_is_unconsumed() {
        let err = pair("name: jes\nvariation: {up: JES_UP, weight_sufix_up: w}\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"key(s) ["weight_sufix_up"] used in variation of systematic 'jes' are not supported"#
        );
    }

    #[test]
    fn samples_and_exclude_samples_are_exclusive() {
        let err = pair("variation: {up: A}\nsamples: [x]\nexclude_samples: [y]\n").unwrap_err();
        assert!(matches!(err, ConfigError::MutuallyExclusive { .. }));
    }

    #[test]
    fn unknown_campaign_fails() {
        let err = pair("variation: {up: A}\ncampaigns: [mc99z]\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownReference {
                kind: ReferenceKind::Campaign,
                ..
            }
        ));
    }

    #[test]
    fn nominal_name_cannot_be_redeclared() {
        let err = pair("variation: {up: NOSYS}\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { .. }));
    }

    #[test]
    fn stems() {
        assert_eq!(pair_stem(Some("JET_JER__1up"), Some("JET_JER__1down")), "JET_JER");
        assert_eq!(pair_stem(Some("JES_UP"), Some("JES_DOWN")), "JES");
        assert_eq!(pair_stem(Some("FT_B_up_2"), Some("FT_B_down_2")), "FT_B");
        assert_eq!(pair_stem(Some("EG_SCALE__1up"), None), "EG_SCALE");
        assert_eq!(Direction::from_variation_name("MUON_ID__1down"), Direction::Down);
        assert_eq!(Direction::from_variation_name("MUON_ID__1up"), Direction::Up);
    }
}
