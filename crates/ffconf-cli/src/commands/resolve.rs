use crate::cli::{InputArgs, Step};
use crate::support::{
    init_logging_or_exit, parse_sample_list, read_document_or_exit, resolve_or_exit,
};
use ffconf_core::{Configuration, RunOverrides, Sample};
use tracing::info;

pub struct Args {
    pub log_level: Option<tracing::Level>,
    pub input: InputArgs,
    pub step: Step,
    pub split_n_jobs: Option<u32>,
    pub job_index: Option<u32>,
    pub min_event: Option<u64>,
    pub max_event: Option<u64>,
    pub json: bool,
}

pub fn run(args: Args) {
    let root = read_document_or_exit(&args.input.config, "config");
    init_logging_or_exit(args.log_level, &root);

    let overrides = RunOverrides {
        samples: parse_sample_list(args.input.samples.as_deref()),
        split_n_jobs: args.split_n_jobs,
        job_index: args.job_index,
        min_event: args.min_event,
        max_event: args.max_event,
    };
    let config = resolve_or_exit(&root, &args.input, overrides);

    if args.step == Step::Ntuples
        && let Err(e) = config.require_ntuple()
    {
        eprintln!("error: {}: {e}", args.input.config);
        std::process::exit(1);
    }
    info!(
        samples = config.samples().len(),
        systematics = config.systematics().len(),
        "configuration resolved"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).expect("json serialization")
        );
    } else {
        print_summary(&args.input.config, &config);
    }
}

fn print_summary(path: &str, config: &Configuration) {
    let general = config.general();
    let data = config.samples().iter().filter(|s| s.is_data()).count();

    println!("ffconf resolve {path}");
    println!("  Regions: {}", config.regions().len());
    println!(
        "  Samples: {} (data: {data}, mc: {})",
        config.samples().len(),
        config.samples().len() - data
    );
    println!(
        "  Systematics: {} (pairs: {})",
        config.systematics().len(),
        config.systematic_pairs().len()
    );
    println!(
        "  Job: {}/{}",
        general.job_splitting.job_index, general.job_splitting.split_n_jobs
    );
    if let (Some(min), Some(max)) = (general.min_event, general.max_event) {
        println!("  Events: {min}..{max}");
    }
    println!(
        "  Ntuple rule: {}",
        if config.ntuple().is_some() { "yes" } else { "no" }
    );
    println!("  Cutflows: {}", config.cutflows().len());
    for sample in config.samples() {
        print_sample(config, sample);
    }
}

fn print_sample(config: &Configuration, sample: &Sample) {
    let regions: Vec<&str> = config
        .sample_regions(sample)
        .map(|region| region.name.as_str())
        .collect();
    println!("  Sample {}:", sample.name);
    println!("    Regions: {}", regions.join(", "));
    println!("    Variables: {}", sample.variables.join(", "));
    println!("    Systematics: {}", sample.systematics.len());
}
