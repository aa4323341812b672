//! Low-level database operations and schema management.

pub use crate::errors::DatabaseError;
use rusqlite::{Connection, Transaction};
use std::path::Path;

/// Database connection wrapper with schema management.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    db_path: String,
}

impl Database {
    /// Open (or create) a database at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn =
            Connection::open(&path_str).map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // Performance pragmas for faster bulk inserts
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA journal_mode = WAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA cache_size = -64000;",
        )
        .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        let mut db = Self {
            conn,
            db_path: path_str,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&mut self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "-- Metadata table (habitat and experiment settings)
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                -- Non-sink patches in linear index order
                CREATE TABLE IF NOT EXISTS patches (
                    idx INTEGER PRIMARY KEY,
                    nx INTEGER NOT NULL,
                    ny INTEGER NOT NULL,
                    lon REAL NOT NULL,
                    lat REAL NOT NULL
                );

                -- One row per simulated run
                CREATE TABLE IF NOT EXISTS runs (
                    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    replicate INTEGER NOT NULL,
                    seed INTEGER NOT NULL,      -- u64 bit pattern
                    lineages INTEGER NOT NULL,
                    config_json TEXT NOT NULL,
                    layout_json TEXT NOT NULL,
                    status TEXT NOT NULL,
                    generations INTEGER NOT NULL DEFAULT 0,
                    extinction_generation INTEGER,
                    started_at INTEGER NOT NULL,
                    finished_at INTEGER
                );

                -- Occupancy matrices, with the RNG state needed to resume
                CREATE TABLE IF NOT EXISTS snapshots (
                    run_id INTEGER NOT NULL,
                    generation INTEGER NOT NULL,
                    patches INTEGER NOT NULL,
                    lineages INTEGER NOT NULL,
                    codec TEXT NOT NULL,
                    occupancy BLOB NOT NULL,
                    rng_state BLOB,
                    timestamp INTEGER NOT NULL,
                    PRIMARY KEY (run_id, generation)
                );

                -- Two-lineage persistence experiment results
                CREATE TABLE IF NOT EXISTS persistence (
                    replicate INTEGER NOT NULL,
                    region INTEGER NOT NULL,
                    generations INTEGER NOT NULL,
                    persisted INTEGER NOT NULL,
                    final_introduced BLOB NOT NULL,
                    PRIMARY KEY (replicate, region)
                );

                CREATE INDEX IF NOT EXISTS idx_snapshots_gen ON snapshots(generation);",
            )
            .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        Ok(())
    }

    /// Begin a transaction for batched operations.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        self.conn
            .transaction()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }

    /// Get reference to underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get mutable reference to underlying connection.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Get database path.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Close the database and clean up WAL files.
    pub fn close(self) -> Result<(), DatabaseError> {
        if let Err(e) = self.conn.execute_batch(
            "PRAGMA wal_checkpoint(TRUNCATE);
             PRAGMA journal_mode = DELETE;",
        ) {
            tracing::warn!(error = %e, "Failed to checkpoint WAL");
        }

        self.conn
            .close()
            .map_err(|(_conn, e)| DatabaseError::Close(e.to_string()))?;

        for suffix in ["-wal", "-shm"] {
            let fname = format!("{}{suffix}", self.db_path);
            if let Err(e) = std::fs::remove_file(&fname) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(file = %fname, error = %e, "Failed to remove WAL file");
                }
            }
        }

        Ok(())
    }

    /// Row counts of the main tables.
    pub fn stats(&self) -> Result<DatabaseStats, DatabaseError> {
        let count = |table: &str| -> Result<usize, DatabaseError> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        };

        Ok(DatabaseStats {
            patches: count("patches")?,
            runs: count("runs")?,
            snapshots: count("snapshots")?,
            persistence_rows: count("persistence")?,
        })
    }
}

/// Database statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub patches: usize,
    pub runs: usize,
    pub snapshots: usize,
    pub persistence_rows: usize,
}
