use metapop_analysis::{RegionPersistenceSummary, SurvivorSummary};
use metapop_sim::connectivity::LinearModel;
use metapop_sim::simulation::{
    ExperimentConfig, IntroductionPlan, RegionPersistence, ReplicateSummary, RunConfig,
};
use metapop_sim::storage::RecordingStrategy;

pub fn print_habitat(model: &LinearModel, plan: &IntroductionPlan) {
    let degenerate = model.records()[..model.patch_count()]
        .iter()
        .filter(|r| r.is_degenerate())
        .count();
    println!("\n🌊 Habitat");
    println!("  • Patches: {} (+ sink)", model.patch_count());
    println!("  • Patches never delivering propagules: {degenerate}");
    println!("  • Introduction Regions: {}", plan.regions().len());
    if plan.has_unassigned() {
        println!("  • Unassigned Patches: filled by the native lineage");
    }
}

pub fn print_run_config(config: &RunConfig) {
    println!("\n📋 Run Configuration");
    println!("  • Capacity: {} per patch [-p, --capacity]", config.capacity);
    println!("  • Generations: {} [-g, --generations]", config.generations);
    println!("  • Fecundity: {} [-R, --fecundity]", config.fecundity);
    if config.filler_fecundity.is_some() {
        println!("  • Native Fecundity: {}", config.filler_fecundity());
    }
    println!("  • Introduction: {} [--nintro]", config.introduction);
    match config.seed {
        Some(seed) => println!("  • Random Seed: {seed} [--seed]"),
        None => println!("  • Random Seed: Random [--seed]"),
    }
    match &config.recording {
        RecordingStrategy::EveryN(n) => println!("  • Recording: every {n} generations [--record-every]"),
        RecordingStrategy::FinalOnly => println!("  • Recording: final state only"),
        RecordingStrategy::All => println!("  • Recording: every generation"),
        RecordingStrategy::Specific(gens) => println!("  • Recording: generations {gens:?}"),
    }
    println!("  • Codec: {} [--codec]", config.codec);
    if let Some(partitions) = config.partitions {
        println!("  • Partitions: {partitions} [--partitions]");
    }
}

pub fn print_experiment(experiment: &ExperimentConfig) {
    println!("\n🧪 Experiment");
    println!("  • Kind: {}", experiment.kind);
    println!("  • Replicates: {} [-r, --replicates]", experiment.replicates);
    println!("  • Base Seed: {}", experiment.base_seed);
    print_run_config(&experiment.run);
    println!();
}

pub fn print_replicates(summaries: &[ReplicateSummary]) {
    println!("\n📈 Replicates");
    println!(
        "{:>9} {:>7} {:>22} {:>14} {:>12} {:>10}",
        "replicate", "run_id", "seed", "status", "generations", "extinct_at"
    );
    for s in summaries {
        let extinct = s
            .outcome
            .extinction_generation
            .map_or_else(|| "-".to_string(), |g| g.to_string());
        println!(
            "{:>9} {:>7} {:>22} {:>14} {:>12} {:>10}",
            s.replicate, s.run_id, s.seed, s.outcome.status, s.outcome.generations, extinct
        );
    }
}

pub fn print_region_results(replicate: usize, results: &[RegionPersistence]) {
    let persisted = results.iter().filter(|r| r.persisted).count();
    println!(
        "  Replicate {replicate}: {persisted}/{} regions persisted",
        results.len()
    );
}

pub fn print_persistence_summary(horizon: usize, rows: &[RegionPersistenceSummary]) {
    println!("\n🛟 Persistence to generation {horizon}");
    println!("{}", "=".repeat(60));
    println!(
        "{:>8} {:>10} {:>10} {:>10} {:>12} {:>10}",
        "region", "replicates", "persisted", "fraction", "mean_gens", "std_gens"
    );
    for r in rows {
        println!(
            "{:>8} {:>10} {:>10} {:>10.3} {:>12.1} {:>10.1}",
            r.region,
            r.replicates,
            r.persisted,
            r.fraction_persisted,
            r.mean_generations,
            r.std_generations
        );
    }
}

pub fn print_survivors(summary: &SurvivorSummary) {
    println!("\n🔎 Survivors at generation {}", summary.generation);
    println!("{}", "=".repeat(60));
    println!(
        "Runs: {} ({} recorded at this generation)",
        summary.runs, summary.runs_recorded
    );
    println!(
        "{:>12} {:>8} {:>10} {:>12} {:>10}",
        "lineage", "present", "fraction", "occupants", "mean_fill"
    );
    for l in &summary.lineages {
        println!(
            "{:>12} {:>8} {:>10.3} {:>12} {:>10.4}",
            l.lineage.to_string(),
            l.runs_present,
            l.fraction_present,
            l.total_occupancy,
            l.mean_habitat_fill()
        );
    }
}
