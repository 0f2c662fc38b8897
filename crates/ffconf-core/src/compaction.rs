//! Shortest list form of a resolved set, for writers that may express a
//! membership either as an allow-list or as a deny-list.

use crate::error::Result;
use crate::selector::{Pattern, Selector};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "form", content = "names", rename_all = "snake_case")]
pub enum Compacted {
    /// The selection is the whole universe; nothing needs writing.
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Exclude form when more than half the universe is selected, include form
/// otherwise (ties stay include). Names outside `universe` are ignored.
pub fn compact(selected: &[&str], universe: &[&str]) -> Compacted {
    let (kept, dropped): (Vec<&str>, Vec<&str>) = universe
        .iter()
        .copied()
        .partition(|name| selected.contains(name));
    if dropped.is_empty() {
        return Compacted::All;
    }
    if 2 * kept.len() > universe.len() {
        Compacted::Exclude(dropped.into_iter().map(str::to_string).collect())
    } else {
        Compacted::Include(kept.into_iter().map(str::to_string).collect())
    }
}

impl Compacted {
    /// A selector that resolves back to exactly the compacted set.
    pub fn to_selector(&self) -> Result<Selector> {
        let exact = |names: &[String]| -> Result<Vec<Pattern>> {
            names.iter().map(|name| Pattern::exact(name)).collect()
        };
        Ok(match self {
            Self::All => Selector::All,
            Self::Include(names) => Selector::Include(exact(names)?),
            Self::Exclude(names) => Selector::Exclude(exact(names)?),
        })
    }

    pub fn names(&self) -> &[String] {
        match self {
            Self::All => &[],
            Self::Include(names) | Self::Exclude(names) => names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReferenceKind;

    const UNIVERSE: [&str; 4] = ["SR", "SR_high", "CR", "VR"];

    #[test]
    fn picks_the_shorter_form() {
        assert_eq!(compact(&["SR"], &UNIVERSE), Compacted::Include(vec!["SR".into()]));
        assert_eq!(
            compact(&["SR", "SR_high", "CR"], &UNIVERSE),
            Compacted::Exclude(vec!["VR".into()])
        );
        assert_eq!(compact(&UNIVERSE, &UNIVERSE), Compacted::All);
    }

    #[test]
    fn half_stays_include() {
        assert_eq!(
            compact(&["CR", "SR"], &UNIVERSE),
            Compacted::Include(vec!["SR".into(), "CR".into()])
        );
    }

    #[test]
    fn both_forms_round_trip() {
        for selected in [vec!["SR"], vec!["SR", "SR_high", "VR"], vec![], vec!["CR", "VR"]] {
            let compacted = compact(&selected, &UNIVERSE);
            let resolved = compacted
                .to_selector()
                .unwrap()
                .resolve(UNIVERSE, ReferenceKind::Region, "round trip")
                .unwrap();
            let mut expected: Vec<&str> = UNIVERSE
                .iter()
                .copied()
                .filter(|name| selected.contains(name))
                .collect();
            expected.sort_unstable();
            let mut resolved = resolved;
            resolved.sort_unstable();
            assert_eq!(resolved, expected);
        }
    }
}
