use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{ClusterMeta, ClusterStore};
use crate::error::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLES: &str = "CREATE TABLE IF NOT EXISTS names (
    cluster_id   VARCHAR(255) NOT NULL,
    cluster_name VARCHAR(255) NULL,
    PRIMARY KEY (cluster_id)
);";

/// Cluster metadata kept in a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteClusterStore {
    path: PathBuf,
}

impl SqliteClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(conn)
    }
}

fn lookup_in(conn: &Connection, cluster_id: &str) -> Result<Option<ClusterMeta>> {
    let meta = conn
        .query_row(
            "SELECT cluster_id, cluster_name FROM names WHERE cluster_id = ?1",
            params![cluster_id],
            |row| {
                Ok(ClusterMeta {
                    cluster_id: row.get(0)?,
                    cluster_name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(meta)
}

fn insert_in(conn: &Connection, cluster_id: &str, cluster_name: &str) -> Result<ClusterMeta> {
    conn.execute(
        "INSERT INTO names (cluster_id, cluster_name) VALUES (?1, ?2)",
        params![cluster_id, cluster_name],
    )?;
    Ok(ClusterMeta {
        cluster_id: cluster_id.to_string(),
        cluster_name: Some(cluster_name.to_string()),
    })
}

impl ClusterStore for SqliteClusterStore {
    fn lookup(&self, cluster_id: &str) -> Result<Option<ClusterMeta>> {
        let conn = self.connect()?;
        lookup_in(&conn, cluster_id)
    }

    fn create(&self, cluster_id: &str, cluster_name: &str) -> Result<ClusterMeta> {
        let conn = self.connect()?;
        insert_in(&conn, cluster_id, cluster_name)
    }

    fn update(&self, cluster_id: &str, cluster_name: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE names SET cluster_name = ?1 WHERE cluster_id = ?2",
            params![cluster_name, cluster_id],
        )?;
        Ok(changed > 0)
    }

    fn get_or_create(&self, cluster_id: &str, cluster_name: &str) -> Result<ClusterMeta> {
        let mut conn = self.connect()?;
        // IMMEDIATE takes the write lock up front, so two registrations of
        // the same new id serialise instead of racing to the insert.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let meta = match lookup_in(&tx, cluster_id)? {
            Some(existing) => existing,
            None => {
                tracing::info!(cluster_id, cluster_name, "registering cluster");
                insert_in(&tx, cluster_id, cluster_name)?
            }
        };

        tx.commit()?;
        Ok(meta)
    }
}
