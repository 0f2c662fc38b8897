use crate::cli::InputArgs;
use ffconf_core::{
    Configuration, DebugLevel, Format, Node, Resolver, RunOverrides, Sample, SystematicsCatalog,
    parse_str,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::Level;

pub fn read_text_or_exit(path: &str, label: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {label} {path}: {e}");
        std::process::exit(1);
    })
}

/// Read and parse a document, picking the format from its extension.
pub fn read_document_or_exit(path: &str, label: &str) -> Node {
    let text = read_text_or_exit(path, label);
    parse_str(&text, Format::from_path(Path::new(path))).unwrap_or_else(|e| {
        eprintln!("error: {path}: {e}");
        std::process::exit(1);
    })
}

pub fn tracing_level(level: DebugLevel) -> Level {
    match level {
        DebugLevel::Error => Level::ERROR,
        DebugLevel::Warning => Level::WARN,
        DebugLevel::Info => Level::INFO,
        DebugLevel::Debug => Level::DEBUG,
    }
}

/// Start logging at `--log-level`, or at the document's `debug_level` when
/// the flag is absent.
pub fn init_logging_or_exit(flag: Option<Level>, root: &Node) {
    let level = match flag {
        Some(level) => level,
        None => tracing_level(DebugLevel::from_document(root).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        })),
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `None` and `all` keep every sample.
pub fn parse_sample_list(arg: Option<&str>) -> Option<Vec<String>> {
    match arg.map(str::trim) {
        None | Some("all") => None,
        Some(list) => Some(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    }
}

/// Variation names per sample, read from a JSON object of string lists.
pub struct FileCatalog {
    systematics: BTreeMap<String, Vec<String>>,
}

impl FileCatalog {
    pub fn read_or_exit(path: &str) -> Self {
        let text = read_text_or_exit(path, "systematics catalog");
        let systematics = serde_json::from_str(&text).unwrap_or_else(|e| {
            eprintln!("error: invalid systematics catalog {path}: {e}");
            std::process::exit(1);
        });
        Self { systematics }
    }
}

impl SystematicsCatalog for FileCatalog {
    fn systematics_for(&self, sample: &Sample) -> Vec<String> {
        self.systematics
            .get(&sample.name)
            .cloned()
            .unwrap_or_default()
    }
}

pub fn resolve_or_exit(root: &Node, input: &InputArgs, overrides: RunOverrides) -> Configuration {
    let catalog = input
        .systematics_catalog
        .as_deref()
        .map(FileCatalog::read_or_exit);
    let mut resolver = Resolver::new().with_overrides(overrides);
    if let Some(catalog) = &catalog {
        resolver = resolver.with_catalog(catalog);
    }
    resolver.resolve(root).unwrap_or_else(|e| {
        eprintln!("error: {}: {e}", input.config);
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_list_all_keeps_everything() {
        assert_eq!(parse_sample_list(None), None);
        assert_eq!(parse_sample_list(Some("all")), None);
        assert_eq!(
            parse_sample_list(Some("ttbar, wjets,")),
            Some(vec!["ttbar".to_string(), "wjets".to_string()])
        );
    }

    #[test]
    fn debug_levels_map_onto_tracing() {
        assert_eq!(tracing_level(DebugLevel::Warning), Level::WARN);
        assert_eq!(tracing_level(DebugLevel::Debug), Level::DEBUG);
    }
}
