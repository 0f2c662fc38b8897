use crate::cli::InputArgs;
use crate::support::{
    init_logging_or_exit, parse_sample_list, read_document_or_exit, resolve_or_exit,
};
use ffconf_core::{RunOverrides, UnfoldingDescriptor, UnfoldingSplit};
use ffconf_trex::{Settings, TrexExport};
use tracing::info;

pub struct Args {
    pub log_level: Option<tracing::Level>,
    pub input: InputArgs,
    pub output: String,
    pub settings: Option<String>,
    pub unfolding: Option<String>,
}

pub fn run(args: Args) {
    let root = read_document_or_exit(&args.input.config, "config");
    init_logging_or_exit(args.log_level, &root);

    let overrides = RunOverrides {
        samples: parse_sample_list(args.input.samples.as_deref()),
        ..RunOverrides::default()
    };
    let config = resolve_or_exit(&root, &args.input, overrides);

    let settings = match &args.settings {
        Some(path) => {
            let node = read_document_or_exit(path, "settings");
            Settings::from_node(&node).unwrap_or_else(|e| {
                eprintln!("error: {path}: {e}");
                std::process::exit(1);
            })
        }
        None => Settings::default(),
    };

    let split = args.unfolding.as_deref().map(|text| {
        text.parse::<UnfoldingDescriptor>()
            .and_then(|descriptor| UnfoldingSplit::new(&config, descriptor))
            .unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            })
    });

    let mut export = TrexExport::new(&config, &settings);
    if let Some(split) = &split {
        export = export.with_unfolding(split);
    }
    let rendered = export.render().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    std::fs::write(&args.output, rendered).unwrap_or_else(|e| {
        eprintln!("error: failed to write {}: {e}", args.output);
        std::process::exit(1);
    });
    info!(output = %args.output, "fit config written");
    println!("Wrote {}", args.output);
}
