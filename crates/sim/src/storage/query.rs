//! Query interface for analyzing recorded simulation data.

use crate::errors::DatabaseError;
use crate::storage::{Database, PatchRecord, PersistenceRecord, RunRecord, SnapshotRecord};
use metapop_codec::CodecStrategy;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// Codec used for the `final_introduced` column of the persistence table.
pub(crate) const PERSISTENCE_CODEC: CodecStrategy = CodecStrategy::SparseZ;

/// Query builder for analyzing simulation data.
pub struct QueryBuilder {
    db: Database,
}

impl QueryBuilder {
    /// Open an existing database for querying.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = db_path.as_ref();
        if !path.exists() {
            return Err(DatabaseError::Connection(format!(
                "database {} does not exist",
                path.display()
            )));
        }
        let db = Database::open(path)?;
        Ok(Self { db })
    }

    /// Get raw metadata value by key.
    pub fn get_metadata_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        self.db
            .connection()
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }

    /// Get all metadata as a map.
    pub fn get_metadata(&self) -> Result<HashMap<String, String>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT key, value FROM metadata")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut meta = HashMap::new();
        for row in rows {
            let (k, v): (String, String) = row.map_err(|e| DatabaseError::Query(e.to_string()))?;
            meta.insert(k, v);
        }
        Ok(meta)
    }

    /// All non-sink patches in linear index order.
    pub fn get_patches(&self) -> Result<Vec<PatchRecord>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT idx, nx, ny, lon, lat FROM patches ORDER BY idx")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PatchRecord {
                    index: row.get::<_, i64>(0)? as usize,
                    nx: row.get(1)?,
                    ny: row.get(2)?,
                    lon: row.get(3)?,
                    lat: row.get(4)?,
                })
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::Query(e.to_string()))
    }

    /// All registered runs, oldest first.
    pub fn get_runs(&self) -> Result<Vec<RunRecord>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(&format!("{RUN_COLUMNS} ORDER BY run_id"))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], RawRun::from_row)
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(|e| DatabaseError::Query(e.to_string()))?.parse()?);
        }
        Ok(runs)
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, DatabaseError> {
        self.db
            .connection()
            .query_row(
                &format!("{RUN_COLUMNS} WHERE run_id = ?1"),
                params![run_id],
                RawRun::from_row,
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?
            .map(RawRun::parse)
            .transpose()
    }

    /// Snapshot of `run_id` at `generation`.
    ///
    /// `Ok(None)` when nothing was recorded there, which for a run that went
    /// extinct early simply means the lineage was already gone.
    pub fn get_snapshot(
        &self,
        run_id: i64,
        generation: usize,
    ) -> Result<Option<SnapshotRecord>, DatabaseError> {
        self.db
            .connection()
            .query_row(
                &format!("{SNAPSHOT_COLUMNS} WHERE run_id = ?1 AND generation = ?2"),
                params![run_id, generation as i64],
                RawSnapshot::from_row,
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?
            .map(RawSnapshot::parse)
            .transpose()
    }

    /// Most recent snapshot of `run_id`.
    pub fn get_latest_snapshot(&self, run_id: i64) -> Result<Option<SnapshotRecord>, DatabaseError> {
        self.db
            .connection()
            .query_row(
                &format!("{SNAPSHOT_COLUMNS} WHERE run_id = ?1 ORDER BY generation DESC LIMIT 1"),
                params![run_id],
                RawSnapshot::from_row,
            )
            .optional()
            .map_err(|e| DatabaseError::Query(e.to_string()))?
            .map(RawSnapshot::parse)
            .transpose()
    }

    /// Generations recorded for `run_id`.
    pub fn get_recorded_generations(&self, run_id: i64) -> Result<Vec<usize>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT generation FROM snapshots WHERE run_id = ?1 ORDER BY generation")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map(params![run_id], |row| row.get::<_, i64>(0))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut gens = Vec::new();
        for row in rows {
            gens.push(row.map_err(|e| DatabaseError::Query(e.to_string()))? as usize);
        }
        Ok(gens)
    }

    /// All persistence experiment rows.
    pub fn get_persistence(&self) -> Result<Vec<PersistenceRecord>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT replicate, region, generations, persisted, final_introduced
                 FROM persistence
                 ORDER BY replicate, region",
            )
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? as usize,
                    row.get::<_, i64>(2)? as usize,
                    row.get::<_, bool>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            })
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (replicate, region, generations, persisted, blob) =
                row.map_err(|e| DatabaseError::Query(e.to_string()))?;
            records.push(PersistenceRecord {
                replicate,
                region,
                generations,
                persisted,
                final_introduced: PERSISTENCE_CODEC.decode(&blob)?,
            });
        }
        Ok(records)
    }

    /// Row counts of the main tables.
    pub fn stats(&self) -> Result<crate::storage::DatabaseStats, DatabaseError> {
        self.db.stats()
    }

    /// Close the query builder.
    pub fn close(self) -> Result<(), DatabaseError> {
        self.db.close()
    }
}

const RUN_COLUMNS: &str = "SELECT run_id, replicate, seed, config_json, layout_json, status,
        generations, extinction_generation
    FROM runs";

const SNAPSHOT_COLUMNS: &str = "SELECT run_id, generation, patches, lineages, codec, occupancy,
        rng_state
    FROM snapshots";

/// Run row before JSON and enum parsing.
struct RawRun {
    run_id: i64,
    replicate: i64,
    seed: i64,
    config_json: String,
    layout_json: String,
    status: String,
    generations: i64,
    extinction_generation: Option<i64>,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            replicate: row.get(1)?,
            seed: row.get(2)?,
            config_json: row.get(3)?,
            layout_json: row.get(4)?,
            status: row.get(5)?,
            generations: row.get(6)?,
            extinction_generation: row.get(7)?,
        })
    }

    fn parse(self) -> Result<RunRecord, DatabaseError> {
        Ok(RunRecord {
            run_id: self.run_id,
            replicate: self.replicate as usize,
            seed: self.seed as u64,
            config: serde_json::from_str(&self.config_json)
                .map_err(|e| DatabaseError::Serialization(format!("run config: {e}")))?,
            layout: serde_json::from_str(&self.layout_json)
                .map_err(|e| DatabaseError::Serialization(format!("lineage layout: {e}")))?,
            status: self.status.parse().map_err(DatabaseError::Query)?,
            generations: self.generations as usize,
            extinction_generation: self.extinction_generation.map(|g| g as usize),
        })
    }
}

struct RawSnapshot {
    run_id: i64,
    generation: i64,
    patches: i64,
    lineages: i64,
    codec: String,
    data: Vec<u8>,
    rng_state: Option<Vec<u8>>,
}

impl RawSnapshot {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            generation: row.get(1)?,
            patches: row.get(2)?,
            lineages: row.get(3)?,
            codec: row.get(4)?,
            data: row.get(5)?,
            rng_state: row.get(6)?,
        })
    }

    fn parse(self) -> Result<SnapshotRecord, DatabaseError> {
        Ok(SnapshotRecord {
            run_id: self.run_id,
            generation: self.generation as usize,
            patches: self.patches as usize,
            lineages: self.lineages as usize,
            codec: self.codec.parse().map_err(DatabaseError::Query)?,
            data: self.data,
            rng_state: self.rng_state,
        })
    }
}
