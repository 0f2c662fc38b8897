//! End-to-end resolution of the configurations under tests/fixtures/.

use ffconf_core::{
    Binning, ConfigError, Configuration, Node, ReferenceKind, Resolver, RunOverrides, SampleKind,
    UnfoldingDescriptor, UnfoldingSplit, parse_yaml, resolve,
};
use std::path::PathBuf;

fn fixture(name: &str) -> Node {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    parse_yaml(&text).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn resolve_fixture(name: &str) -> Configuration {
    resolve(&fixture(name)).unwrap_or_else(|e| panic!("failed to resolve {name}: {e}"))
}

fn linked(config: &Configuration, systematic: &str) -> Vec<String> {
    let id = config
        .systematic_id(systematic)
        .unwrap_or_else(|| panic!("no systematic {systematic}"));
    config
        .samples_with_systematic(id)
        .map(|sample| sample.name.clone())
        .collect()
}

fn region_names(config: &Configuration, sample: &str) -> Vec<String> {
    let sample = config.sample_by_name(sample).unwrap();
    config
        .sample_regions(sample)
        .map(|region| region.name.clone())
        .collect()
}

#[test]
fn basic_configuration_resolves() {
    let config = resolve_fixture("basic.yaml");

    assert_eq!(config.regions().len(), 1);
    let region = &config.regions()[0];
    assert_eq!(region.selection, "nJets>=2");
    assert_eq!(
        region.variables[0].binning,
        Binning::Regular {
            min: 0.0,
            max: 200.0,
            count: 10
        }
    );

    assert_eq!(config.samples().len(), 2);
    let data = config.sample_by_name("Data").unwrap();
    let mc = config.sample_by_name("mc").unwrap();
    assert_eq!(data.kind, SampleKind::Data);
    assert_eq!(data.unique_ids.len(), 1);
    assert_eq!(data.unique_ids[0].dsid, 0);
    assert_eq!(mc.unique_ids.len(), 2);
    assert_eq!(region_names(&config, "Data"), vec!["SR"]);
    assert_eq!(region_names(&config, "mc"), vec!["SR"]);
}

#[test]
fn allow_list_links_only_named_samples() {
    let config = resolve_fixture("systematics.yaml");
    assert_eq!(linked(&config, "JET_UP"), vec!["mc1"]);
    assert_eq!(linked(&config, "JET_DOWN"), vec!["mc1"]);

    let mc2 = config.sample_by_name("mc2").unwrap();
    let names: Vec<&str> = config
        .sample_systematics(mc2)
        .map(|systematic| systematic.name.as_str())
        .collect();
    assert!(!names.contains(&"JET_UP"));
    assert!(!names.contains(&"JET_DOWN"));
}

#[test]
fn data_only_gets_systematics_that_name_it() {
    let config = resolve_fixture("systematics.yaml");
    assert_eq!(linked(&config, "LUMI_UP"), vec!["mc1", "mc2"]);
    assert_eq!(linked(&config, "FAKES_UP"), vec!["Data", "mc2"]);

    let data = config.sample_by_name("Data").unwrap();
    let names: Vec<&str> = config
        .sample_systematics(data)
        .map(|systematic| systematic.name.as_str())
        .collect();
    assert_eq!(names, vec!["NOSYS", "FAKES_UP"]);
}

#[test]
fn exclude_regions_keeps_the_rest() {
    let config = resolve_fixture("systematics.yaml");
    assert_eq!(region_names(&config, "mc1"), vec!["A", "B", "C"]);
    assert_eq!(region_names(&config, "mc2"), vec!["B", "C"]);
    assert_eq!(
        config.sample_by_name("mc2").unwrap().variables,
        vec!["pt", "eta"]
    );
}

#[test]
fn systematic_regions_and_weights_resolve() {
    let config = resolve_fixture("systematics.yaml");
    let fakes = config.systematic_by_name("FAKES_UP").unwrap();
    let regions: Vec<&str> = config
        .systematic_regions(fakes)
        .map(|region| region.name.as_str())
        .collect();
    assert_eq!(regions, vec!["C"]);

    assert_eq!(config.systematic_by_name("LUMI_UP").unwrap().weight_suffix, "1.02");
    assert_eq!(config.systematic_by_name("LUMI_DOWN").unwrap().weight_suffix, "0.98");
    assert_eq!(config.systematic_by_name("LUMI_UP").unwrap().sum_weights, "NOSYS");
    assert_eq!(config.systematic_pairs().len(), 3);
}

#[test]
fn nominal_is_unique_and_everywhere() {
    let config = resolve_fixture("systematics.yaml");
    let nominals = config
        .systematics()
        .iter()
        .filter(|systematic| systematic.is_nominal())
        .count();
    assert_eq!(nominals, 1);

    let nominal = config.nominal();
    assert_eq!(nominal.name, "NOSYS");
    assert_eq!(nominal.regions.len(), config.regions().len());
    let nominal_id = config.systematic_id("NOSYS").unwrap();
    assert!(config.samples().iter().all(|sample| sample.has_systematic(nominal_id)));
}

#[test]
fn resolving_twice_gives_the_same_graph() {
    let node = fixture("systematics.yaml");
    let first = serde_json::to_value(resolve(&node).unwrap()).unwrap();
    let second = serde_json::to_value(resolve(&node).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn nosys_in_variable_name_fails_before_binning() {
    let node = parse_yaml(
        "regions:\n  - name: SR\n    variables:\n      - {name: pt_NOSYS, definition: x, binning: {min: 5, max: 1}}\n",
    )
    .unwrap();
    let err = resolve(&node).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidName { .. }), "{err}");
}

#[test]
fn regions_and_exclude_regions_conflict() {
    let node = parse_yaml(
        "general: {default_event_weights: w}\nregions:\n  - {name: SR}\n  - {name: CR}\nsamples:\n  - {name: mc, simulation_type: mc, dsids: [1], campaigns: [mc20a], regions: [SR], exclude_regions: [CR]}\n",
    )
    .unwrap();
    let err = resolve(&node).unwrap_err();
    assert!(matches!(err, ConfigError::MutuallyExclusive { .. }), "{err}");
}

#[test]
fn unknown_region_in_exclude_list_fails() {
    let node = parse_yaml(
        "general: {default_event_weights: w}\nregions:\n  - {name: SR}\nsamples:\n  - {name: mc, simulation_type: mc, dsids: [1], campaigns: [mc20a], exclude_regions: [XR]}\n",
    )
    .unwrap();
    let err = resolve(&node).unwrap_err();
    assert_eq!(err.to_string(), "unknown region 'XR' referenced by sample 'mc'");
}

#[test]
fn command_line_selection_keeps_graph_consistent() {
    let overrides = RunOverrides {
        samples: Some(vec!["mc1".to_string()]),
        ..RunOverrides::default()
    };
    let config = Resolver::new()
        .with_overrides(overrides)
        .resolve(&fixture("systematics.yaml"))
        .unwrap();
    let names: Vec<&str> = config.samples().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["mc1"]);
    assert_eq!(linked(&config, "JET_UP"), vec!["mc1"]);
    assert!(linked(&config, "FAKES_UP").is_empty());
}

#[test]
fn command_line_selection_rejects_unknown_samples() {
    let overrides = RunOverrides {
        samples: Some(vec!["ttbar".to_string()]),
        ..RunOverrides::default()
    };
    let err = Resolver::new()
        .with_overrides(overrides)
        .resolve(&fixture("systematics.yaml"))
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown sample 'ttbar' referenced by command line");
}

fn split(descriptor: &str) -> Result<UnfoldingSplit, ConfigError> {
    let config = resolve_fixture("unfolding.yaml");
    UnfoldingSplit::new(&config, descriptor.parse::<UnfoldingDescriptor>()?)
}

#[test]
fn unfolding_partitions_mc_samples() {
    let config = resolve_fixture("unfolding.yaml");
    let split = UnfoldingSplit::new(
        &config,
        "ttbar,parton,parton_pt,jet_pt".parse().unwrap(),
    )
    .unwrap();
    let names = |ids: &[ffconf_core::SampleId]| -> Vec<String> {
        ids.iter().map(|id| config.sample(*id).name.clone()).collect()
    };
    assert_eq!(names(&split.unfolding_samples[..]), vec!["ttbar"]);
    assert_eq!(names(&split.inclusive_samples[..]), vec!["wjets", "singletop"]);
}

#[test]
fn unfolding_split_of_a_systematic_is_a_partition() {
    let config = resolve_fixture("unfolding.yaml");
    let split = UnfoldingSplit::new(
        &config,
        "ttbar,parton,parton_pt,jet_pt".parse().unwrap(),
    )
    .unwrap();

    let jes_up = config.systematic_id("JES_UP").unwrap();
    let original: Vec<_> = config
        .sample_ids()
        .filter(|id| {
            let sample = config.sample(*id);
            !sample.is_data() && sample.has_systematic(jes_up)
        })
        .collect();

    let inclusive = split
        .inclusive_systematics
        .iter()
        .find(|view| view.name == "JES")
        .unwrap();
    let unfolding = split
        .unfolding_systematics
        .iter()
        .find(|view| view.name == "JES")
        .unwrap();
    assert!(inclusive.samples.iter().all(|id| !unfolding.samples.contains(id)));
    let mut union: Vec<_> = inclusive
        .samples
        .iter()
        .chain(&unfolding.samples)
        .copied()
        .collect();
    union.sort();
    assert_eq!(union, original);
}

#[test]
fn one_sided_views_are_dropped() {
    let split = split("ttbar,parton,parton_pt,jet_pt").unwrap();
    assert!(!split.inclusive_systematics.iter().any(|view| view.name == "TTBAR_PS"));
    assert!(split.unfolding_systematics.iter().any(|view| view.name == "TTBAR_PS"));
    assert!(split.inclusive_systematics.iter().any(|view| view.name == "WJETS_XS"));
    assert!(!split.unfolding_systematics.iter().any(|view| view.name == "WJETS_XS"));
}

#[test]
fn unfolding_views_rename_folder_keys() {
    let split = split("ttbar,parton,parton_pt,jet_pt").unwrap();
    let view = split
        .unfolding_systematics
        .iter()
        .find(|view| view.name == "JES")
        .unwrap();
    let keys: Vec<&str> = view.folder_keys.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "AcceptanceFolderNameUp",
            "MigrationFolderNameUp",
            "SelectionEffFolderNameUp",
            "AcceptanceFolderNameDown",
            "MigrationFolderNameDown",
            "SelectionEffFolderNameDown",
        ]
    );
    assert_eq!(view.folder_keys[0].1, "JES_UP");
    assert_eq!(view.folder_keys[3].1, "JES_DOWN");

    let inclusive = split
        .inclusive_systematics
        .iter()
        .find(|view| view.name == "JES")
        .unwrap();
    assert_eq!(
        inclusive.folder_keys,
        vec![
            ("HistoFolderNameUp".to_string(), "JES_UP".to_string()),
            ("HistoFolderNameDown".to_string(), "JES_DOWN".to_string()),
        ]
    );
}

#[test]
fn unfolding_descriptor_references_are_checked() {
    let err = split("ttbar,dressed,parton_pt,jet_pt").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownReference {
            kind: ReferenceKind::TruthLevel,
            ..
        }
    ));

    let err = split("ttbar,parton,top_eta,jet_pt").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown variable 'top_eta' referenced by unfolding descriptor"
    );

    let err = split("ttbar,parton,parton_pt,met").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown variable 'met' referenced by unfolding descriptor"
    );

    let err = split("wjets,parton,parton_pt,jet_pt").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown sample 'wjets' referenced by unfolding descriptor"
    );
}
