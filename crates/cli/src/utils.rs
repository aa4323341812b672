use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use metapop_sim::connectivity::LinearModel;
use metapop_sim::simulation::{ExperimentConfig, IntroductionPlan};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::args::HabitatArgs;

pub fn load_habitat(habitat: &HabitatArgs) -> Result<Arc<LinearModel>> {
    let model = LinearModel::from_json_files(&habitat.connectivity, &habitat.mask)
        .context("Failed to build the connectivity model")?;
    Ok(Arc::new(model))
}

/// Read the region labels, or give every patch its own region.
pub fn load_plan(labels: Option<&PathBuf>, patches: usize) -> Result<IntroductionPlan> {
    match labels {
        Some(path) => IntroductionPlan::from_json_file(path)
            .with_context(|| format!("Failed to read introduction labels from {}", path.display())),
        None => Ok(IntroductionPlan::per_patch(patches)),
    }
}

/// Metadata stored next to the results of an experiment.
pub fn experiment_metadata(
    habitat: &HabitatArgs,
    labels: Option<&PathBuf>,
    experiment: &ExperimentConfig,
) -> Result<Vec<(&'static str, String)>> {
    let mut metadata = vec![
        ("connectivity_path", path_string(&habitat.connectivity)),
        ("mask_path", path_string(&habitat.mask)),
        (
            ExperimentConfig::METADATA_KEY,
            experiment
                .to_json()
                .context("Failed to serialize experiment configuration")?,
        ),
    ];
    if let Some(labels) = labels {
        metadata.push(("labels_path", path_string(labels)));
    }
    Ok(metadata)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn progress_bar(len: u64, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}
