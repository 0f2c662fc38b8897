//! Include/exclude selector algebra shared by every block that picks
//! regions, samples, variables or systematics by name.
//!
//! A pattern selects a name when the name equals it, or when the pattern
//! compiled as a regex matches at the start of the name. Matching is not
//! anchored at the end: `SR` also selects `SR_high`.

use crate::error::{ConfigError, ReferenceKind, Result};
use crate::options::OptionsGetter;
use regex::Regex;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(raw: &str, owner: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{raw})")).map_err(|source| {
            ConfigError::InvalidPattern {
                owner: owner.to_string(),
                pattern: raw.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: raw.to_string(),
            regex,
        })
    }

    /// A pattern that selects `name` and nothing else.
    ///
    /// Escaped names always parse; only the compiled size limit can reject
    /// one, so the error is reserved for absurdly long names.
    pub fn exact(name: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^{}$", regex::escape(name))).map_err(|source| {
            ConfigError::InvalidPattern {
                owner: "exact name".to_string(),
                pattern: name.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: name.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, name: &str) -> bool {
        name == self.raw || self.regex.is_match(name)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

pub fn compile_patterns(raw: &[String], owner: &str) -> Result<Vec<Pattern>> {
    raw.iter().map(|item| Pattern::new(item, owner)).collect()
}

pub fn matches_any(patterns: &[Pattern], name: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(name))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "mode", content = "patterns", rename_all = "snake_case")]
pub enum Selector {
    #[default]
    All,
    Include(Vec<Pattern>),
    Exclude(Vec<Pattern>),
}

impl Selector {
    /// Read a mutually exclusive `include_key` / `exclude_key` pair.
    pub fn from_options(
        getter: &mut OptionsGetter,
        include_key: &str,
        exclude_key: &str,
    ) -> Result<Self> {
        let include = getter.get_str_list(include_key)?;
        let exclude = getter.get_str_list(exclude_key)?;
        let owner = getter.block().to_string();
        match (include, exclude) {
            (Some(_), Some(_)) => Err(ConfigError::exclusive(&owner, include_key, exclude_key)),
            (Some(include), None) => Ok(Self::Include(compile_patterns(&include, &owner)?)),
            (None, Some(exclude)) => Ok(Self::Exclude(compile_patterns(&exclude, &owner)?)),
            (None, None) => Ok(Self::All),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// True for an explicit allow-list.
    pub fn is_include(&self) -> bool {
        matches!(self, Self::Include(_))
    }

    pub fn patterns(&self) -> &[Pattern] {
        match self {
            Self::All => &[],
            Self::Include(patterns) | Self::Exclude(patterns) => patterns,
        }
    }

    pub fn selects(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(patterns) => matches_any(patterns, name),
            Self::Exclude(patterns) => !matches_any(patterns, name),
        }
    }

    /// Fail when any pattern selects nothing in `universe`.
    pub fn check_references<'a, I>(&self, universe: I, kind: ReferenceKind, owner: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        for pattern in self.patterns() {
            if !universe.clone().into_iter().any(|name| pattern.matches(name)) {
                return Err(ConfigError::unknown(kind, pattern.as_str(), owner));
            }
        }
        Ok(())
    }

    /// Resolve against `universe`, keeping its order. Resolving twice with the
    /// same universe yields the same result.
    pub fn resolve<'a, I>(&self, universe: I, kind: ReferenceKind, owner: &str) -> Result<Vec<&'a str>>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.check_references(universe.clone(), kind, owner)?;
        Ok(universe
            .into_iter()
            .filter(|name| self.selects(name))
            .collect())
    }

    /// Drop patterns that select none of `kept`. Used when the command line
    /// restricts the run to a subset of samples.
    pub fn retain_matching<'a, I>(&mut self, kept: I)
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        if let Self::Include(patterns) | Self::Exclude(patterns) = self {
            patterns.retain(|pattern| kept.clone().into_iter().any(|name| pattern.matches(name)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::parse_yaml;

    const REGIONS: [&str; 3] = ["A", "B", "C"];

    fn include(raw: &[&str]) -> Selector {
        let raw: Vec<String> = raw.iter().map(|item| item.to_string()).collect();
        Selector::Include(compile_patterns(&raw, "test").unwrap())
    }

    fn exclude(raw: &[&str]) -> Selector {
        let raw: Vec<String> = raw.iter().map(|item| item.to_string()).collect();
        Selector::Exclude(compile_patterns(&raw, "test").unwrap())
    }

    #[test]
    fn exclude_keeps_the_rest_in_order() {
        let resolved = exclude(&["A"])
            .resolve(REGIONS, ReferenceKind::Region, "sample 'mc'")
            .unwrap();
        assert_eq!(resolved, vec!["B", "C"]);
    }

    #[test]
    fn all_resolves_to_universe() {
        let resolved = Selector::All
            .resolve(REGIONS, ReferenceKind::Region, "sample 'mc'")
            .unwrap();
        assert_eq!(resolved, REGIONS.to_vec());
    }

    #[test]
    fn regex_patterns_are_prefix_anchored() {
        let selector = include(&["SR.*"]);
        assert!(selector.selects("SR_high"));
        assert!(!selector.selects("CR_SR"));
        assert!(include(&["SR"]).selects("SR_high"));
    }

    #[test]
    fn exact_names_with_metacharacters_still_match() {
        assert!(include(&["pt(jet)"]).selects("pt(jet)"));
    }

    #[test]
    fn exact_pattern_is_anchored_at_both_ends() {
        let pattern = Pattern::exact("SR.*[1]").unwrap();
        let selector = Selector::Include(vec![pattern]);
        assert!(selector.selects("SR.*[1]"));
        assert!(!selector.selects("SR_high1"));
        assert!(!selector.selects("SR.*[1]_tail"));
    }

    #[test]
    fn unknown_names_fail_for_both_forms() {
        for selector in [include(&["D"]), exclude(&["D"])] {
            let err = selector
                .resolve(REGIONS, ReferenceKind::Region, "sample 'mc'")
                .unwrap_err();
            assert_eq!(err.to_string(), "unknown region 'D' referenced by sample 'mc'");
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let selector = include(&["A", "C"]);
        let first = selector.resolve(REGIONS, ReferenceKind::Region, "x").unwrap();
        let second = selector.resolve(REGIONS, ReferenceKind::Region, "x").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn both_keys_are_mutually_exclusive() {
        let node = parse_yaml("regions: [SR]\nexclude_regions: [CR]\n").unwrap();
        let mut getter = OptionsGetter::new("sample 'mc'", &node).unwrap();
        let err = Selector::from_options(&mut getter, "regions", "exclude_regions").unwrap_err();
        assert!(matches!(err, ConfigError::MutuallyExclusive { .. }));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = Pattern::new("SR(", "sample 'mc'").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn retain_matching_keeps_include_distinct_from_all() {
        let mut selector = include(&["mc2"]);
        selector.retain_matching(["mc1"]);
        assert_eq!(selector, Selector::Include(Vec::new()));
        assert!(!selector.selects("mc1"));
    }
}
