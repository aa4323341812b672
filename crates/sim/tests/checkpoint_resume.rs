//! Integration tests for checkpoint and resume functionality.

use metapop_sim::connectivity::{ConnectivityTable, GridCoord, GridMask, LinearModel, OriginRecord};
use metapop_sim::errors::{DatabaseError, SimulationError};
use metapop_sim::simulation::{
    IntroductionPlan, NullSink, RunOutcome, RunState, Simulation, SimulationBuilder, Snapshot,
    SnapshotSink,
};
use metapop_sim::storage::{BufferConfig, QueryBuilder, Recorder};
use std::sync::Arc;

fn ring_model(n: i32) -> Arc<LinearModel> {
    let coords: Vec<GridCoord> = (0..n).map(|i| GridCoord::new(i, 3)).collect();
    let origins = (0..coords.len())
        .map(|i| {
            let next = coords[(i + 1) % coords.len()];
            OriginRecord::new(coords[i], 10, &[(coords[i], 4), (next, 6)])
        })
        .collect();
    Arc::new(
        LinearModel::build(&ConnectivityTable::new(origins), &GridMask::identity(&coords)).unwrap(),
    )
}

fn builder(model: Arc<LinearModel>) -> SimulationBuilder {
    SimulationBuilder::new()
        .model(model)
        .plan(IntroductionPlan::new((0..12).map(|i| Some(i / 6)).collect()))
        .capacity(4)
        .generations(20)
        .fecundity(3.0)
        .workers(2)
        .partitions(4)
        .record_every(5)
        .seed(42)
}

/// Forwards snapshots up to a generation, as if the process died there.
struct Interrupted<'a> {
    inner: &'a mut Recorder,
    last: usize,
}

impl SnapshotSink for Interrupted<'_> {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), DatabaseError> {
        if snapshot.generation <= self.last {
            self.inner.record(snapshot)?;
        }
        Ok(())
    }

    fn finish(&mut self, _outcome: &RunOutcome) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[test]
fn test_checkpoint_and_resume_matches_uninterrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("resume.sqlite");
    let model = ring_model(12);

    let mut recorder = Recorder::create(&db_path, &model, &[], BufferConfig::default()).unwrap();
    let mut sim = builder(model.clone()).build().unwrap();
    let run_id = recorder
        .begin_run(0, sim.seed(), sim.config(), sim.layout())
        .unwrap();
    let full = sim
        .run(&mut Interrupted {
            inner: &mut recorder,
            last: 10,
        })
        .unwrap();
    recorder.close().unwrap();
    assert_eq!(full.status, RunState::Completed);
    let expected = sim.population().occupancy().clone();

    let query = QueryBuilder::new(&db_path).unwrap();
    assert_eq!(query.get_recorded_generations(run_id).unwrap(), vec![0, 5, 10]);
    let mut resumed = Simulation::from_checkpoint(model, &query, run_id).unwrap();
    query.close().unwrap();

    assert_eq!(resumed.generation(), 10);
    assert_eq!(resumed.state(), RunState::Running);
    assert_eq!(resumed.seed(), 42);
    assert_eq!(resumed.partitions(), 4);

    let outcome = resumed.run(&mut NullSink).unwrap();
    assert_eq!(outcome, full);
    assert_eq!(resumed.population().occupancy(), &expected);
}

#[test]
fn test_resume_with_recorder_continues_same_run() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("continue.sqlite");
    let model = ring_model(12);

    let mut recorder = Recorder::create(&db_path, &model, &[], BufferConfig::small()).unwrap();
    let mut sim = builder(model.clone()).build().unwrap();
    let run_id = recorder
        .begin_run(0, sim.seed(), sim.config(), sim.layout())
        .unwrap();
    sim.run(&mut Interrupted {
        inner: &mut recorder,
        last: 5,
    })
    .unwrap();
    recorder.close().unwrap();

    let query = QueryBuilder::new(&db_path).unwrap();
    let mut resumed = Simulation::from_checkpoint(model.clone(), &query, run_id).unwrap();
    query.close().unwrap();

    let mut recorder = Recorder::create(&db_path, &model, &[], BufferConfig::small()).unwrap();
    recorder.resume_run(run_id, resumed.config().codec);
    let outcome = resumed.run(&mut recorder).unwrap();
    recorder.close().unwrap();

    let query = QueryBuilder::new(&db_path).unwrap();
    assert_eq!(
        query.get_recorded_generations(run_id).unwrap(),
        vec![0, 5, 10, 15, 20]
    );
    let run = query.get_run(run_id).unwrap().unwrap();
    assert_eq!(run.status, outcome.status);
    assert_eq!(run.generations, 20);
    assert_eq!(query.get_runs().unwrap().len(), 1);
    query.close().unwrap();
}

#[test]
fn test_resume_unknown_run_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("empty.sqlite");
    let model = ring_model(4);
    Recorder::create(&db_path, &model, &[], BufferConfig::small())
        .unwrap()
        .close()
        .unwrap();

    let query = QueryBuilder::new(&db_path).unwrap();
    assert!(matches!(
        Simulation::from_checkpoint(model, &query, 7),
        Err(SimulationError::Checkpoint(_))
    ));
}

#[test]
fn test_resume_on_different_habitat_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("mismatch.sqlite");
    let model = ring_model(12);

    let mut recorder = Recorder::create(&db_path, &model, &[], BufferConfig::small()).unwrap();
    let mut sim = builder(model).generations(5).build().unwrap();
    let run_id = recorder
        .begin_run(0, sim.seed(), sim.config(), sim.layout())
        .unwrap();
    sim.run(&mut recorder).unwrap();
    recorder.close().unwrap();

    let query = QueryBuilder::new(&db_path).unwrap();
    assert!(matches!(
        Simulation::from_checkpoint(ring_model(6), &query, run_id),
        Err(SimulationError::Checkpoint(_))
    ));
}
