use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LakeError, Result};
use crate::snapshot::SnapshotCategory;

pub const LAKE_DIR: &str = "datalake";

/// The three disjoint directories of the lake under an install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakeLayout {
    root: PathBuf,
    raw_dir: PathBuf,
    transformed_dir: PathBuf,
    processed_dir: PathBuf,
}

impl LakeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let lake = root.join(LAKE_DIR);
        Self {
            raw_dir: lake.join("raw").join("tims"),
            transformed_dir: lake.join("transformed").join("tims"),
            processed_dir: lake.join("processed"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lake_dir(&self) -> PathBuf {
        self.root.join(LAKE_DIR)
    }

    pub fn incoming_dir(&self, category: SnapshotCategory) -> &Path {
        match category {
            SnapshotCategory::Raw => &self.raw_dir,
            SnapshotCategory::Transformed => &self.transformed_dir,
        }
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Creates any missing directory; existing contents are left alone.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.raw_dir, &self.transformed_dir, &self.processed_dir] {
            fs::create_dir_all(dir).map_err(|source| LakeError::io(dir, source))?;
        }
        Ok(())
    }
}
