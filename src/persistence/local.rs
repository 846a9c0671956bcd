//! On-device storage: the whole timer collection as one JSON blob

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::{fs, sync::Mutex};
use tracing::debug;

use super::{PersistenceResult, TimerPersistence, TimerRow};

/// Well-known key the collection is stored under
pub const TIMERS_KEY: &str = "timers";

/// Stores every timer row in `<data_dir>/timers.json`.
///
/// Several processes may share the file; each write replaces it atomically
/// and readers poll it.
#[derive(Debug)]
pub struct LocalBlobStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalBlobStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{}.json", TIMERS_KEY)),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the blob file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_blob(&self) -> PersistenceResult<Vec<TimerRow>> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_blob(&self, rows: &[TimerRow]) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(rows)?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Wrote {} timer rows to {}", rows.len(), self.path.display());
        Ok(())
    }

    /// Stamp timestamps and write `row` into `rows` at `index` (or append)
    fn place(rows: &mut Vec<TimerRow>, index: Option<usize>, mut row: TimerRow) -> TimerRow {
        let now = Utc::now();
        row.updated_at = Some(now);

        match index.and_then(|i| rows.get_mut(i)) {
            Some(existing) => {
                row.created_at = existing.created_at.or(row.created_at).or(Some(now));
                *existing = row.clone();
            }
            None => {
                row.created_at = row.created_at.or(Some(now));
                rows.push(row.clone());
            }
        }

        row
    }
}

#[async_trait]
impl TimerPersistence for LocalBlobStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list_all(&self) -> PersistenceResult<Vec<TimerRow>> {
        self.read_blob().await
    }

    async fn upsert(&self, row: TimerRow) -> PersistenceResult<TimerRow> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_blob().await?;
        let index = rows.iter().position(|r| r.id == row.id);

        let stored = Self::place(&mut rows, index, row);
        self.write_blob(&rows).await?;
        Ok(stored)
    }

    async fn update(&self, row: TimerRow) -> PersistenceResult<Option<TimerRow>> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_blob().await?;

        let Some(index) = rows.iter().position(|r| r.id == row.id) else {
            return Ok(None);
        };

        let stored = Self::place(&mut rows, Some(index), row);
        self.write_blob(&rows).await?;
        Ok(Some(stored))
    }

    async fn delete(&self, id: &str) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.read_blob().await?;

        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() != before {
            self.write_blob(&rows).await?;
        }
        Ok(())
    }
}
