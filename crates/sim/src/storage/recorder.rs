//! Background recorder with encoding and buffering.
//!
//! The generation loop hands snapshots to a bounded channel and moves on;
//! a dedicated writer task owns the SQLite connection, encodes each matrix
//! and commits it. The simulation only waits when the buffer is full.

use crate::connectivity::LinearModel;
use crate::errors::DatabaseError;
use crate::simulation::{LineageLayout, RunConfig, RunOutcome, RunState, Snapshot, SnapshotSink};
use crate::storage::database::Database;
use crate::storage::query::PERSISTENCE_CODEC;
use crate::storage::types::{unix_now, PersistenceRecord};
use metapop_codec::CodecStrategy;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Message sent from the simulation thread to the writer task.
#[derive(Debug)]
enum RecorderMessage {
    BeginRun {
        replicate: usize,
        seed: u64,
        lineages: usize,
        config_json: String,
        layout_json: String,
        reply: oneshot::Sender<Result<i64, DatabaseError>>,
    },
    Snapshot {
        run_id: i64,
        generation: usize,
        patches: usize,
        lineages: usize,
        codec: CodecStrategy,
        values: Vec<u32>,
        rng_state: Vec<u8>,
    },
    FinishRun {
        run_id: i64,
        outcome: RunOutcome,
    },
    Persistence(Vec<PersistenceRecord>),
    /// Flush and shutdown the recorder.
    Shutdown,
}

/// Statistics about the recorder's work.
#[derive(Debug, Clone, Default)]
pub struct RecorderStats {
    pub runs_registered: usize,
    /// Total snapshots written.
    pub generations_recorded: usize,
    pub persistence_rows: usize,
    /// Bytes of raw occupancy counts received.
    pub bytes_raw: usize,
    /// Bytes of encoded blobs written.
    pub bytes_written: usize,
    /// Compression ratio (written / raw).
    pub compression_ratio: f64,
    pub avg_encode_ms: f64,
    pub avg_write_ms: f64,
    /// Number of times the buffer was full (causing the simulation to wait).
    pub buffer_full_count: usize,
}

/// Configuration for recorder buffering.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum number of snapshots to buffer before blocking.
    pub capacity: usize,
    /// Warn if buffer fill exceeds this fraction (0.0-1.0).
    pub warn_threshold: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            warn_threshold: 0.8,
        }
    }
}

impl BufferConfig {
    pub fn small() -> Self {
        Self {
            capacity: 4,
            warn_threshold: 0.8,
        }
    }

    /// Rough upper bound of buffered memory for a habitat of this shape.
    pub fn estimate_memory_usage(&self, patches: usize, lineages: usize) -> usize {
        self.capacity * patches * lineages * std::mem::size_of::<u32>()
    }
}

/// SQLite recorder running its writes on a background task.
pub struct Recorder {
    tx: mpsc::Sender<RecorderMessage>,
    handle: Option<JoinHandle<Result<RecorderStats, DatabaseError>>>,
    runtime: Runtime,
    config: BufferConfig,
    buffer_fill: Arc<AtomicUsize>,
    buffer_full_count: usize,
    current_run: Option<(i64, CodecStrategy)>,
    path: PathBuf,
}

impl Recorder {
    /// Open (or create) the database at `db_path`, store the habitat and
    /// `metadata`, and start the writer task.
    pub fn create(
        db_path: impl AsRef<Path>,
        model: &LinearModel,
        metadata: &[(&str, String)],
        buffer_config: BufferConfig,
    ) -> Result<Self, DatabaseError> {
        let path = db_path.as_ref().to_path_buf();

        // Habitat and metadata are written up front, synchronously.
        {
            let mut db = Database::open(&path)?;
            let tx = db.transaction()?;
            {
                // Creation stamps survive reopening the database on resume.
                let mut stmt = tx
                    .prepare("INSERT OR IGNORE INTO metadata (key, value) VALUES (?1, ?2)")
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                let stamps = [
                    ("crate_version", env!("CARGO_PKG_VERSION").to_string()),
                    ("created_at", unix_now().to_string()),
                ];
                for (k, v) in &stamps {
                    stmt.execute(params![k, v])
                        .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                }

                let mut stmt = tx
                    .prepare("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                let patches = model.patch_count().to_string();
                for (k, v) in std::iter::once(("patches", &patches))
                    .chain(metadata.iter().map(|(k, v)| (*k, v)))
                {
                    stmt.execute(params![k, v])
                        .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                }

                let mut stmt = tx
                    .prepare(
                        "INSERT OR REPLACE INTO patches (idx, nx, ny, lon, lat)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                for index in 0..model.patch_count() {
                    if let (Some(coord), Some(geo)) = (model.coord_of(index), model.geo_of(index)) {
                        stmt.execute(params![index as i64, coord.nx, coord.ny, geo.lon, geo.lat])
                            .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                    }
                }
            }
            tx.commit()
                .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
            db.close()?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("metapop-recorder")
            .build()
            .map_err(|e| DatabaseError::Recorder(format!("failed to start runtime: {e}")))?;

        let (tx, rx) = mpsc::channel(buffer_config.capacity.max(1));
        let buffer_fill = Arc::new(AtomicUsize::new(0));
        let buffer_fill_clone = buffer_fill.clone();
        let writer_path = path.clone();
        let handle = runtime
            .spawn_blocking(move || background_writer(writer_path, rx, buffer_fill_clone));

        tracing::debug!(path = %path.display(), "Recorder started");

        Ok(Self {
            tx,
            handle: Some(handle),
            runtime,
            config: buffer_config,
            buffer_fill,
            buffer_full_count: 0,
            current_run: None,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_fill(&self) -> usize {
        self.buffer_fill.load(Ordering::Relaxed)
    }

    pub fn is_buffer_high(&self) -> bool {
        (self.buffer_fill() as f64 / self.config.capacity.max(1) as f64) >= self.config.warn_threshold
    }

    /// Register a new run; subsequent snapshots are attributed to it.
    pub fn begin_run(
        &mut self,
        replicate: usize,
        seed: u64,
        config: &RunConfig,
        layout: &LineageLayout,
    ) -> Result<i64, DatabaseError> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let layout_json = serde_json::to_string(layout)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let (reply, response) = oneshot::channel();
        self.send(RecorderMessage::BeginRun {
            replicate,
            seed,
            lineages: layout.lineages(),
            config_json,
            layout_json,
            reply,
        })?;
        let run_id = response
            .blocking_recv()
            .map_err(|_| DatabaseError::Recorder("writer task stopped".into()))??;

        self.current_run = Some((run_id, config.codec));
        Ok(run_id)
    }

    /// Continue recording an existing run, e.g. after resuming it.
    pub fn resume_run(&mut self, run_id: i64, codec: CodecStrategy) {
        self.current_run = Some((run_id, codec));
    }

    pub fn current_run(&self) -> Option<i64> {
        self.current_run.map(|(id, _)| id)
    }

    /// Store the results of one persistence replicate.
    pub fn record_persistence(&mut self, records: Vec<PersistenceRecord>) -> Result<(), DatabaseError> {
        self.send(RecorderMessage::Persistence(records))
    }

    fn send(&mut self, msg: RecorderMessage) -> Result<(), DatabaseError> {
        let msg = match self.tx.try_send(msg) {
            Ok(()) => return Ok(()),
            Err(mpsc::error::TrySendError::Full(msg)) => {
                self.buffer_full_count += 1;
                msg
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                return Err(DatabaseError::Recorder("writer task stopped".into()));
            }
        };
        self.tx
            .blocking_send(msg)
            .map_err(|_| DatabaseError::Recorder("writer task stopped".into()))
    }

    /// Flush all pending writes and shut down the recorder.
    pub fn close(mut self) -> Result<RecorderStats, DatabaseError> {
        if let Err(e) = self.send(RecorderMessage::Shutdown) {
            tracing::warn!(error = %e, "Failed to send shutdown message");
        }
        let mut stats = match self.handle.take() {
            Some(handle) => self
                .runtime
                .block_on(handle)
                .map_err(|e| DatabaseError::Close(format!("writer task panicked: {e}")))??,
            None => RecorderStats::default(),
        };
        stats.buffer_full_count = self.buffer_full_count;
        tracing::debug!(
            snapshots = stats.generations_recorded,
            runs = stats.runs_registered,
            "Recorder closed"
        );
        Ok(stats)
    }
}

impl SnapshotSink for Recorder {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> Result<(), DatabaseError> {
        let (run_id, codec) = self
            .current_run
            .ok_or_else(|| DatabaseError::Recorder("no run in progress".into()))?;

        if self.is_buffer_high() {
            tracing::warn!(
                generation = snapshot.generation,
                fill = self.buffer_fill(),
                "Recorder buffer nearly full"
            );
        }

        self.buffer_fill.fetch_add(1, Ordering::Relaxed);
        let result = self.send(RecorderMessage::Snapshot {
            run_id,
            generation: snapshot.generation,
            patches: snapshot.occupancy.patches(),
            lineages: snapshot.occupancy.lineages(),
            codec,
            values: snapshot.occupancy.as_slice().to_vec(),
            rng_state: snapshot.rng_state.to_vec(),
        });
        if result.is_err() {
            self.buffer_fill.fetch_sub(1, Ordering::Relaxed);
        }
        result
    }

    fn finish(&mut self, outcome: &RunOutcome) -> Result<(), DatabaseError> {
        let (run_id, _) = self
            .current_run
            .take()
            .ok_or_else(|| DatabaseError::Recorder("no run in progress".into()))?;
        self.send(RecorderMessage::FinishRun {
            run_id,
            outcome: outcome.clone(),
        })
    }
}

/// Writer loop; owns the connection until shutdown.
fn background_writer(
    db_path: PathBuf,
    mut rx: mpsc::Receiver<RecorderMessage>,
    buffer_fill: Arc<AtomicUsize>,
) -> Result<RecorderStats, DatabaseError> {
    let mut db = Database::open(&db_path)?;
    let mut stats = RecorderStats::default();
    let mut encode_time = Duration::ZERO;
    let mut write_time = Duration::ZERO;

    while let Some(msg) = rx.blocking_recv() {
        match msg {
            RecorderMessage::BeginRun {
                replicate,
                seed,
                lineages,
                config_json,
                layout_json,
                reply,
            } => {
                let result = insert_run(
                    db.connection(),
                    replicate,
                    seed,
                    lineages,
                    &config_json,
                    &layout_json,
                );
                if result.is_ok() {
                    stats.runs_registered += 1;
                }
                // The caller may have given up waiting; nothing to do then.
                let _ = reply.send(result);
            }
            RecorderMessage::Snapshot {
                run_id,
                generation,
                patches,
                lineages,
                codec,
                values,
                rng_state,
            } => {
                buffer_fill.fetch_sub(1, Ordering::Relaxed);

                let encode_start = Instant::now();
                let blob = codec.encode(&values)?;
                encode_time += encode_start.elapsed();

                let write_start = Instant::now();
                db.connection()
                    .execute(
                        "INSERT OR REPLACE INTO snapshots
                         (run_id, generation, patches, lineages, codec, occupancy, rng_state, timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            run_id,
                            generation as i64,
                            patches as i64,
                            lineages as i64,
                            codec.to_string(),
                            &blob,
                            &rng_state,
                            unix_now()
                        ],
                    )
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                write_time += write_start.elapsed();

                stats.generations_recorded += 1;
                stats.bytes_raw += values.len() * std::mem::size_of::<u32>();
                stats.bytes_written += blob.len();
            }
            RecorderMessage::FinishRun { run_id, outcome } => {
                db.connection()
                    .execute(
                        "UPDATE runs
                         SET status = ?1, generations = ?2, extinction_generation = ?3,
                             finished_at = ?4
                         WHERE run_id = ?5",
                        params![
                            outcome.status.to_string(),
                            outcome.generations as i64,
                            outcome.extinction_generation.map(|g| g as i64),
                            unix_now(),
                            run_id
                        ],
                    )
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            }
            RecorderMessage::Persistence(records) => {
                let write_start = Instant::now();
                stats.persistence_rows += write_persistence(db.connection_mut(), &records)?;
                write_time += write_start.elapsed();
            }
            RecorderMessage::Shutdown => break,
        }
    }

    if stats.generations_recorded > 0 {
        let n = stats.generations_recorded as f64;
        stats.compression_ratio = stats.bytes_written as f64 / stats.bytes_raw.max(1) as f64;
        stats.avg_encode_ms = encode_time.as_secs_f64() * 1000.0 / n;
        stats.avg_write_ms = write_time.as_secs_f64() * 1000.0 / n;
    }

    db.close()?;
    Ok(stats)
}

fn insert_run(
    conn: &Connection,
    replicate: usize,
    seed: u64,
    lineages: usize,
    config_json: &str,
    layout_json: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO runs
         (replicate, seed, lineages, config_json, layout_json, status, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            replicate as i64,
            seed as i64,
            lineages as i64,
            config_json,
            layout_json,
            RunState::Initializing.to_string(),
            unix_now()
        ],
    )
    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

fn write_persistence(
    conn: &mut Connection,
    records: &[PersistenceRecord],
) -> Result<usize, DatabaseError> {
    let tx = conn
        .transaction()
        .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT OR REPLACE INTO persistence
                 (replicate, region, generations, persisted, final_introduced)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(|e| DatabaseError::Insert(e.to_string()))?;
        for record in records {
            let blob = PERSISTENCE_CODEC.encode(&record.final_introduced)?;
            stmt.execute(params![
                record.replicate as i64,
                record.region as i64,
                record.generations as i64,
                record.persisted,
                &blob
            ])
            .map_err(|e| DatabaseError::Insert(e.to_string()))?;
        }
    }
    tx.commit()
        .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityTable, GridCoord, GridMask, OriginRecord};
    use crate::simulation::OccupancyMatrix;
    use crate::storage::QueryBuilder;

    fn model() -> LinearModel {
        let coords: Vec<GridCoord> = (0..3).map(|i| GridCoord::new(i, i)).collect();
        let origins = coords
            .iter()
            .map(|&c| OriginRecord::new(c, 2, &[(c, 2)]))
            .collect();
        LinearModel::build(&ConnectivityTable::new(origins), &GridMask::identity(&coords)).unwrap()
    }

    #[test]
    fn test_buffer_config() {
        assert_eq!(BufferConfig::default().capacity, 16);
        assert_eq!(BufferConfig::small().capacity, 4);
        assert_eq!(BufferConfig::small().estimate_memory_usage(10, 5), 4 * 10 * 5 * 4);
    }

    #[test]
    fn test_record_without_run_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let model = model();
        let mut recorder =
            Recorder::create(dir.path().join("r.sqlite"), &model, &[], BufferConfig::small())
                .unwrap();
        let occ = OccupancyMatrix::zeros(model.len(), 1).unwrap();
        let err = recorder
            .record(&Snapshot {
                generation: 0,
                occupancy: &occ,
                rng_state: &[],
            })
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Recorder(_)));
        recorder.close().unwrap();
    }

    #[test]
    fn test_many_snapshots_through_small_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.sqlite");
        let model = model();
        let mut recorder = Recorder::create(&path, &model, &[], BufferConfig::small()).unwrap();

        let layout = LineageLayout::new(vec![0, 1], false);
        let config = RunConfig {
            codec: CodecStrategy::UnpackedZ,
            ..Default::default()
        };
        let run_id = recorder.begin_run(3, 17, &config, &layout).unwrap();
        assert_eq!(recorder.current_run(), Some(run_id));

        let mut occ = OccupancyMatrix::zeros(model.len(), 2).unwrap();
        for generation in 0..20 {
            occ.set(generation % 3, generation % 2, generation as u32);
            recorder
                .record(&Snapshot {
                    generation,
                    occupancy: &occ,
                    rng_state: &[generation as u8],
                })
                .unwrap();
        }
        let stats = recorder.close().unwrap();
        assert_eq!(stats.generations_recorded, 20);
        assert!(stats.bytes_written > 0);

        let q = QueryBuilder::new(&path).unwrap();
        assert_eq!(q.get_recorded_generations(run_id).unwrap().len(), 20);
        let last = q.get_latest_snapshot(run_id).unwrap().unwrap();
        assert_eq!(last.generation, 19);
        assert_eq!(last.codec, CodecStrategy::UnpackedZ);
        assert_eq!(last.occupancy().unwrap(), occ);
        let run = q.get_run(run_id).unwrap().unwrap();
        assert_eq!(run.replicate, 3);
        assert_eq!(run.status, RunState::Initializing);
        q.close().unwrap();
    }

    #[test]
    fn test_reopen_keeps_creation_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.sqlite");
        let model = model();
        let recorder = Recorder::create(
            &path,
            &model,
            &[("label", "first".to_string())],
            BufferConfig::small(),
        )
        .unwrap();
        recorder.close().unwrap();

        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "UPDATE metadata SET value = 'old' WHERE key IN ('created_at', 'crate_version')",
                [],
            )
            .unwrap();
        db.close().unwrap();

        let recorder = Recorder::create(
            &path,
            &model,
            &[("label", "second".to_string())],
            BufferConfig::small(),
        )
        .unwrap();
        recorder.close().unwrap();

        let q = QueryBuilder::new(&path).unwrap();
        assert_eq!(q.get_metadata_value("created_at").unwrap().as_deref(), Some("old"));
        assert_eq!(q.get_metadata_value("crate_version").unwrap().as_deref(), Some("old"));
        assert_eq!(q.get_metadata_value("label").unwrap().as_deref(), Some("second"));
        assert_eq!(q.get_metadata_value("patches").unwrap().as_deref(), Some("3"));
        q.close().unwrap();
    }

    #[test]
    fn test_persistence_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.sqlite");
        let mut recorder = Recorder::create(&path, &model(), &[], BufferConfig::small()).unwrap();
        let rows = vec![
            PersistenceRecord {
                replicate: 0,
                region: 4,
                generations: 12,
                persisted: false,
                final_introduced: vec![0, 0, 0, 0],
            },
            PersistenceRecord {
                replicate: 0,
                region: 7,
                generations: 50,
                persisted: true,
                final_introduced: vec![0, 3, 1, 0],
            },
        ];
        recorder.record_persistence(rows.clone()).unwrap();
        let stats = recorder.close().unwrap();
        assert_eq!(stats.persistence_rows, 2);

        let q = QueryBuilder::new(&path).unwrap();
        assert_eq!(q.get_persistence().unwrap(), rows);
        assert_eq!(q.stats().unwrap().persistence_rows, 2);
        assert_eq!(q.stats().unwrap().patches, 3);
        q.close().unwrap();
    }
}
