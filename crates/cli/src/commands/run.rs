use anyhow::{Context, Result};
use metapop_sim::simulation::{ExperimentConfig, ExperimentKind, NeutralExperiment};
use metapop_sim::storage::{BufferConfig, Recorder};

use crate::args::RunArgs;
use crate::printing::{print_experiment, print_habitat, print_replicates};
use crate::utils::{experiment_metadata, load_habitat, load_plan, progress_bar};

pub fn run_neutral(args: &RunArgs) -> Result<()> {
    println!("🌊 Metapop - Running Neutral Replicates");
    println!("============================================");

    let params = &args.params;
    let model = load_habitat(&args.habitat)?;
    let plan = load_plan(params.labels.as_ref(), model.patch_count())?;
    print_habitat(&model, &plan);

    let experiment = ExperimentConfig::new(
        ExperimentKind::Neutral,
        params.replicates,
        params.run_config(args.fecundity, None),
    );
    print_experiment(&experiment);

    let metadata = experiment_metadata(&args.habitat, params.labels.as_ref(), &experiment)?;
    let neutral = NeutralExperiment::new(model.clone(), plan, experiment)
        .context("Invalid experiment configuration")?;

    let mut recorder = Recorder::create(&params.database, &model, &metadata, BufferConfig::default())
        .context("Failed to create recorder")?;

    let generations = params.generations;
    let pb = progress_bar((params.replicates * generations) as u64, !params.no_progress)?;
    let summaries = neutral
        .run(&mut recorder, |replicate, report| {
            pb.set_position((replicate * generations + report.generation) as u64);
            pb.set_message(format!(
                "replicate {replicate}, {} introduced alive",
                report.introduced_alive
            ));
        })
        .context("Simulation failed")?;
    pb.finish_with_message("Done");

    let stats = recorder.close().context("Failed to close recorder")?;
    tracing::info!(
        snapshots = stats.generations_recorded,
        compression_ratio = stats.compression_ratio,
        buffer_full = stats.buffer_full_count,
        "Recorder closed"
    );

    print_replicates(&summaries);
    println!("\n✓ {} replicates complete!", summaries.len());
    println!("  Snapshots recorded: {}", stats.generations_recorded);
    println!(
        "\n💡 Use 'metapop analyze -d {} survivors -g <generation>' to see where survivors started",
        params.database.display()
    );

    Ok(())
}
