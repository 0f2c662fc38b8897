//! Blocks of a TRExFitter config built from a resolved configuration.

use crate::block::{Block, Section};
use crate::error::{ExportError, Result};
use crate::settings::Settings;
use ffconf_core::{
    Branch, Compacted, ConfigError, Configuration, ReferenceKind, Region, Sample, SampleId,
    SystematicView, UnfoldingSplit, compact, systematic_views,
};
use tracing::debug;

const JOB_NAME: &str = "my_fit";
const FIT_NAME: &str = "fit";
const POI: &str = "mu_signal";
const FIRST_COLOR: i64 = 3;
const SMOOTHING: i64 = 40;

/// Fit region name for one histogram: `<region>_<variable>`.
pub fn fit_region_name(region: &str, variable: &str) -> String {
    format!("{region}_{variable}")
}

pub struct TrexExport<'a> {
    config: &'a Configuration,
    settings: &'a Settings,
    unfolding: Option<&'a UnfoldingSplit>,
}

impl<'a> TrexExport<'a> {
    pub fn new(config: &'a Configuration, settings: &'a Settings) -> Self {
        Self {
            config,
            settings,
            unfolding: None,
        }
    }

    pub fn with_unfolding(mut self, split: &'a UnfoldingSplit) -> Self {
        self.unfolding = Some(split);
        self
    }

    pub fn render(&self) -> Result<String> {
        Ok(self
            .sections()?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    pub fn sections(&self) -> Result<Vec<Section>> {
        self.check_settings()?;
        let universe = self.region_universe();
        if universe.is_empty() {
            return Err(ExportError::NoRegions);
        }

        let mut colors = FIRST_COLOR..;
        let mut sections = vec![
            Section::new("JOB", vec![self.job()]),
            Section::new("FIT", vec![self.fit()]),
            Section::new("REGIONS", self.regions()),
        ];

        if let Some(split) = self.unfolding {
            sections.push(Section::new("UNFOLDING", vec![self.unfolding_block(split)]));
            let blocks = split
                .unfolding_samples
                .iter()
                .map(|id| self.unfolding_sample(self.config.sample(*id), &universe, &mut colors))
                .collect();
            sections.push(Section::new("UNFOLDINGSAMPLES", blocks));
        }

        let exported = self.exported_samples();
        let samples = exported
            .iter()
            .map(|id| self.sample(self.config.sample(*id), &universe, &mut colors))
            .collect();
        sections.push(Section::new("SAMPLES", samples));

        let signal = exported
            .iter()
            .map(|id| self.config.sample(*id))
            .find(|sample| !sample.is_data())
            .ok_or(ExportError::NoSignalSample)?;
        sections.push(Section::new("NORM. FACTORS", vec![norm_factor(signal)]));

        let mc_universe: Vec<&str> = exported
            .iter()
            .map(|id| self.config.sample(*id))
            .filter(|sample| !sample.is_data())
            .map(|sample| sample.name.as_str())
            .collect();
        let mut systematics: Vec<Block> = match self.unfolding {
            Some(split) => split
                .inclusive_systematics
                .iter()
                .map(|view| self.systematic(view, &universe, &mc_universe))
                .collect(),
            None => systematic_views(self.config)
                .iter()
                .map(|view| self.systematic(view, &universe, &mc_universe))
                .collect(),
        };
        if let Some(split) = self.unfolding {
            let unfolding_universe: Vec<&str> = split
                .unfolding_samples
                .iter()
                .map(|id| self.config.sample(*id).name.as_str())
                .collect();
            systematics.extend(
                split
                    .unfolding_systematics
                    .iter()
                    .map(|view| self.systematic(view, &universe, &unfolding_universe)),
            );
        }
        sections.push(Section::new("SYSTEMATICS", systematics));

        debug!(sections = sections.len(), "built fit config");
        Ok(sections)
    }

    /// Every sample named in the overlay must exist.
    fn check_settings(&self) -> Result<()> {
        for sample in &self.settings.samples {
            if self.config.sample_by_name(&sample.name).is_none() {
                return Err(ConfigError::unknown(
                    ReferenceKind::Sample,
                    &sample.name,
                    "trex settings",
                )
                .into());
            }
        }
        Ok(())
    }

    fn region_universe(&self) -> Vec<String> {
        self.config
            .region_variable_pairs()
            .map(|(region, variable)| fit_region_name(region, variable))
            .collect()
    }

    /// Data plus, when unfolding, only the inclusive MC half.
    fn exported_samples(&self) -> Vec<SampleId> {
        self.config
            .sample_ids()
            .filter(|id| match self.unfolding {
                Some(split) => !split.is_unfolding(*id),
                None => true,
            })
            .collect()
    }

    fn job(&self) -> Block {
        let histo_path = match self.config.general().output_path_histograms.as_str() {
            "" => ".",
            path => path,
        };
        Block::new("Job", JOB_NAME)
            .with("HistoPath", histo_path)
            .with("Lumi", 1_i64)
            .with("ImageFormat", "pdf")
            .with("ReadFrom", "HIST")
            .with("POI", POI)
    }

    fn fit(&self) -> Block {
        let fit = &self.settings.fit;
        Block::new("Fit", FIT_NAME)
            .with("FitType", fit.fit_type.as_str())
            .with("FitRegion", fit.fit_region.as_str())
            .with("POIAsimov", fit.poi_asimov.clone())
            .with("FitBlind", fit.fit_blind.clone())
    }

    fn regions(&self) -> Vec<Block> {
        let mut blocks = Vec::new();
        for region in self.config.regions() {
            for variable in &region.variables {
                let name = fit_region_name(&region.name, &variable.name);
                let title = if variable.title.is_empty() {
                    variable.name.as_str()
                } else {
                    variable.title.as_str()
                };
                blocks.push(
                    Block::new("Region", name.as_str())
                        .with("Type", "SIGNAL")
                        .with("NumberOfRecoBins", count(variable.binning.bin_count()))
                        .with("VariableTitle", title)
                        .with("HistoName", format!("NOSYS/{}_{}", variable.name, region.name))
                        .with("Label", name.as_str())
                        .with("ShortLabel", name.as_str()),
                );
            }
        }
        blocks
    }

    fn unfolding_block(&self, split: &UnfoldingSplit) -> Block {
        let descriptor = &split.descriptor;
        let truth_bins = self
            .config
            .sample_by_name(&descriptor.sample_name)
            .and_then(|sample| sample.truth(&descriptor.truth_level_name))
            .and_then(|truth| truth.variable(&descriptor.truth_variable_name))
            .map_or(0, |variable| variable.binning.bin_count());
        Block::new("Unfolding", "unfolding")
            .with("NominalTruthSample", descriptor.sample_name.as_str())
            .with("TruthDistributionName", descriptor.truth_variable_name.as_str())
            .with("NumberOfTruthBins", count(truth_bins))
            .with("MatrixOrientation", "TRUTHONHORIZONTAL")
    }

    fn sample(
        &self,
        sample: &Sample,
        universe: &[String],
        colors: &mut impl Iterator<Item = i64>,
    ) -> Block {
        let overlay = self.settings.sample(&sample.name);
        let default_kind = if sample.is_data() { "DATA" } else { "BACKGROUND" };
        let kind = overlay
            .and_then(|overlay| overlay.kind.as_deref())
            .unwrap_or(default_kind);
        let mut block = Block::new("Sample", sample.name.as_str())
            .with("Type", kind)
            .with("Title", self.title(sample))
            .with("HistoFile", sample.name.as_str());
        self.add_colors(&mut block, sample, colors);
        write_regions(&mut block, self.sample_fit_regions(sample), universe);
        block
    }

    fn unfolding_sample(
        &self,
        sample: &Sample,
        universe: &[String],
        colors: &mut impl Iterator<Item = i64>,
    ) -> Block {
        let mut block =
            Block::new("UnfoldingSample", sample.name.as_str()).with("Title", self.title(sample));
        self.add_colors(&mut block, sample, colors);
        write_regions(&mut block, self.sample_fit_regions(sample), universe);
        block
    }

    fn title(&self, sample: &Sample) -> String {
        self.settings
            .sample(&sample.name)
            .and_then(|overlay| overlay.title.clone())
            .unwrap_or_else(|| sample.name.clone())
    }

    /// Every sample block takes the next colour from the counter, even when
    /// the overlay pins its colours.
    fn add_colors(
        &self,
        block: &mut Block,
        sample: &Sample,
        colors: &mut impl Iterator<Item = i64>,
    ) {
        let next = colors.next().unwrap_or(FIRST_COLOR);
        let overlay = self.settings.sample(&sample.name);
        let color = overlay.and_then(|overlay| overlay.color).unwrap_or(next);
        let fill = overlay.and_then(|overlay| overlay.fill_color).unwrap_or(color);
        let line = overlay.and_then(|overlay| overlay.line_color).unwrap_or(color);
        block.set("FillColor", fill);
        block.set("LineColor", line);
    }

    /// Fit regions a sample fills: its regions crossed with the variables it
    /// kept.
    fn sample_fit_regions(&self, sample: &Sample) -> Vec<String> {
        self.config
            .sample_regions(sample)
            .flat_map(|region| {
                region
                    .variables
                    .iter()
                    .filter(|variable| sample.variables.contains(&variable.name))
                    .map(|variable| fit_region_name(&region.name, &variable.name))
            })
            .collect()
    }

    fn systematic(&self, view: &SystematicView, universe: &[String], samples: &[&str]) -> Block {
        let keyword = match view.branch {
            Branch::Inclusive => "Systematic",
            Branch::Unfolding => "UnfoldingSystematic",
        };
        let mut block = Block::new(keyword, view.name.as_str());
        for (key, folder) in &view.folder_keys {
            block.set(key, folder.as_str());
        }
        let two_sided = view.pair.up.is_some() && view.pair.down.is_some();
        block.set("Title", view.name.replace('_', " "));
        block.set("Type", "HISTO");
        block.set(
            "Symmetrisation",
            if two_sided { "TWOSIDED" } else { "ONESIDED" },
        );
        block.set("Smoothing", SMOOTHING);

        let regions: Vec<String> = view
            .pair
            .primary()
            .map(|id| {
                self.config
                    .systematic_regions(self.config.systematic(id))
                    .flat_map(region_fit_names)
                    .collect()
            })
            .unwrap_or_default();
        write_regions(&mut block, regions, universe);

        let linked: Vec<&str> = view
            .samples
            .iter()
            .map(|id| self.config.sample(*id).name.as_str())
            .collect();
        match compact(&linked, samples) {
            Compacted::All => {}
            Compacted::Include(names) => block.set("Samples", names.join(",")),
            Compacted::Exclude(names) => block.extend_list("Exclude", &names),
        }
        block
    }
}

fn region_fit_names(region: &Region) -> impl Iterator<Item = String> + '_ {
    region
        .variables
        .iter()
        .map(|variable| fit_region_name(&region.name, &variable.name))
}

fn write_regions(block: &mut Block, selected: Vec<String>, universe: &[String]) {
    let selected: Vec<&str> = selected.iter().map(String::as_str).collect();
    let universe: Vec<&str> = universe.iter().map(String::as_str).collect();
    match compact(&selected, &universe) {
        Compacted::All => {}
        Compacted::Include(names) => block.set("Regions", names.join(",")),
        Compacted::Exclude(names) => block.extend_list("Exclude", &names),
    }
}

fn norm_factor(signal: &Sample) -> Block {
    Block::new("NormFactor", POI)
        .with("Title", "#mu(signal)")
        .with("Nominal", 1_i64)
        .with("Min", -100_i64)
        .with("Max", 100_i64)
        .with("Samples", signal.name.as_str())
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
