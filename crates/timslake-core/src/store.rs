//! Filesystem-backed snapshot store.
//!
//! Stands in for blob storage: snapshots are written into an incoming directory
//! per category, consumed in batch, and relocated into a shared archive where the
//! retention sweep later trims them.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{LakeError, Result};
use crate::journal::PipelineJournal;
use crate::layout::LakeLayout;
use crate::snapshot::{processed_name, SnapshotCategory, SnapshotId};

/// An entry of the processed archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSnapshot {
    pub file_name: String,
    pub path: PathBuf,
    /// `None` when the name does not follow the snapshot naming scheme.
    pub id: Option<SnapshotId>,
}

pub struct SnapshotStore {
    layout: LakeLayout,
    journal: Arc<dyn PipelineJournal>,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("layout", &self.layout)
            .finish()
    }
}

impl SnapshotStore {
    pub fn open(layout: LakeLayout, journal: Arc<dyn PipelineJournal>) -> Result<Self> {
        Self::open_with_clock(layout, journal, Box::new(SystemClock))
    }

    pub fn open_with_clock(
        layout: LakeLayout,
        journal: Arc<dyn PipelineJournal>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        layout.ensure()?;
        Ok(Self {
            layout,
            journal,
            clock,
        })
    }

    pub fn layout(&self) -> &LakeLayout {
        &self.layout
    }

    pub(crate) fn journal(&self) -> &dyn PipelineJournal {
        self.journal.as_ref()
    }

    pub fn write_raw<T: Serialize + ?Sized>(&self, payload: &T) -> Result<SnapshotId> {
        let body = serde_json::to_vec(payload)?;
        self.write_snapshot(SnapshotCategory::Raw, &body)
    }

    pub fn read_raw(&self) -> Result<Vec<Value>> {
        self.read_incoming(SnapshotCategory::Raw)
    }

    /// Writes records as an indented JSON array of key/value mappings.
    pub fn write_transformed<R: Serialize>(&self, records: &[R]) -> Result<SnapshotId> {
        let mappings = records
            .iter()
            .enumerate()
            .map(|(index, record)| -> Result<Value> {
                match serde_json::to_value(record)? {
                    Value::Object(map) => Ok(Value::Object(map)),
                    _ => Err(LakeError::NotAMapping { index }),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let body = serde_json::to_vec_pretty(&mappings)?;
        self.write_snapshot(SnapshotCategory::Transformed, &body)
    }

    pub fn read_transformed(&self) -> Result<Vec<Value>> {
        self.read_incoming(SnapshotCategory::Transformed)
    }

    /// Moves `path` into the archive as `PROCESSED-<name>`.
    pub fn move_to_processed(&self, path: &Path, name: &str) -> Result<PathBuf> {
        let destination = self.layout.processed_dir().join(processed_name(name));
        fs::rename(path, &destination).map_err(|source| LakeError::io(path, source))?;
        debug!(from = %path.display(), to = %destination.display(), "archived snapshot");
        Ok(destination)
    }

    /// Lists the archive, recognized snapshots first in chronological order.
    pub fn archived(&self) -> Result<Vec<ArchivedSnapshot>> {
        let mut entries: Vec<ArchivedSnapshot> = list_file_names(self.layout.processed_dir())?
            .into_iter()
            .map(|file_name| ArchivedSnapshot {
                path: self.layout.processed_dir().join(&file_name),
                id: SnapshotId::from_file_name(&file_name),
                file_name,
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.id.is_none(), a.id, &a.file_name).cmp(&(b.id.is_none(), b.id, &b.file_name))
        });
        Ok(entries)
    }

    /// File names waiting in the incoming directory of `category`.
    pub fn pending(&self, category: SnapshotCategory) -> Result<Vec<String>> {
        let mut names = list_file_names(self.layout.incoming_dir(category))?;
        sort_by_snapshot_order(&mut names);
        Ok(names)
    }

    fn write_snapshot(&self, category: SnapshotCategory, body: &[u8]) -> Result<SnapshotId> {
        let id = SnapshotId::new(category, self.clock.now());
        let path = self.layout.incoming_dir(category).join(id.file_name());

        // Same category within the same second resolves to the same name.
        if path.exists() {
            warn!(path = %path.display(), "snapshot name collision, overwriting existing file");
        }

        fs::write(&path, body).map_err(|source| LakeError::io(&path, source))?;
        self.journal.log(&format!(
            "Wrote {} snapshot: {}",
            category.label(),
            path.display()
        ));
        Ok(id)
    }

    fn read_incoming(&self, category: SnapshotCategory) -> Result<Vec<Value>> {
        let dir = self.layout.incoming_dir(category);
        let mut data = Vec::new();

        for file_name in self.pending(category)? {
            let path = dir.join(&file_name);
            let body = fs::read(&path).map_err(|source| LakeError::io(&path, source))?;
            let value =
                serde_json::from_slice(&body).map_err(|source| LakeError::json(&path, source))?;
            data.push(value);

            self.journal
                .log(&format!("Read {} snapshot: {file_name}", category.label()));
            self.move_to_processed(&path, &file_name)?;
        }

        Ok(data)
    }
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|source| LakeError::io(dir, source))? {
        let entry = entry.map_err(|source| LakeError::io(dir, source))?;
        let file_type = entry
            .file_type()
            .map_err(|source| LakeError::io(entry.path(), source))?;
        if !file_type.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(name = ?raw, dir = %dir.display(), "skipping non UTF-8 file name"),
        }
    }
    Ok(names)
}

fn sort_by_snapshot_order(names: &mut [String]) {
    names.sort_by(|a, b| {
        let a_id = SnapshotId::from_file_name(a);
        let b_id = SnapshotId::from_file_name(b);
        (a_id.is_none(), a_id, a).cmp(&(b_id.is_none(), b_id, b))
    });
}
