use anyhow::{Context, Result};
use metapop_sim::simulation::{ExperimentConfig, ExperimentKind, PersistenceExperiment};
use metapop_sim::storage::{BufferConfig, RecordingStrategy, Recorder};

use crate::args::PersistenceArgs;
use crate::printing::{print_experiment, print_habitat, print_region_results};
use crate::utils::{experiment_metadata, load_habitat, load_plan, progress_bar};

pub fn run_persistence(args: &PersistenceArgs) -> Result<()> {
    println!("🌊 Metapop - Two-Lineage Persistence Experiment");
    println!("============================================");

    let params = &args.params;
    let model = load_habitat(&args.habitat)?;
    let plan = load_plan(params.labels.as_ref(), model.patch_count())?;
    print_habitat(&model, &plan);

    let mut run = params.run_config(args.r0, Some(args.r1));
    // Only the final state of each region matters here.
    run.recording = RecordingStrategy::FinalOnly;
    let experiment = ExperimentConfig::new(
        ExperimentKind::Persistence {
            r0: args.r0,
            r1: args.r1,
        },
        params.replicates,
        run,
    );
    print_experiment(&experiment);

    let metadata = experiment_metadata(&args.habitat, params.labels.as_ref(), &experiment)?;
    let persistence = PersistenceExperiment::new(model.clone(), plan, experiment)
        .context("Invalid experiment configuration")?;
    println!(
        "Running {} regions × {} replicates...",
        persistence.regions().len(),
        params.replicates
    );

    let mut recorder = Recorder::create(&params.database, &model, &metadata, BufferConfig::default())
        .context("Failed to create recorder")?;

    let pb = progress_bar(params.replicates as u64, !params.no_progress)?;
    let results = persistence
        .run(&mut recorder, |replicate, regions| {
            pb.suspend(|| print_region_results(replicate, regions));
            pb.inc(1);
        })
        .context("Simulation failed")?;
    pb.finish_with_message("Done");

    let stats = recorder.close().context("Failed to close recorder")?;

    let persisted: usize = results
        .iter()
        .map(|regions| regions.iter().filter(|r| r.persisted).count())
        .sum();
    let total: usize = results.iter().map(Vec::len).sum();
    println!("\n✓ Experiment complete!");
    println!("  Region runs persisted: {persisted}/{total}");
    println!("  Rows recorded: {}", stats.persistence_rows);
    println!(
        "\n💡 Use 'metapop analyze -d {} persistence' for per-region fractions",
        params.database.display()
    );

    Ok(())
}
