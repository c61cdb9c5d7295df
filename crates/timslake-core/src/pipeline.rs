//! The five-phase ETL run: Start, Extract, Transform, Load, Retain, End.
//!
//! Phases execute unconditionally and in order. The first error aborts the run and
//! nothing written by earlier phases is rolled back.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::LakeConfig;
use crate::journal::{PipelineJournal, PipelinePhase};
use crate::retention::RetentionPlan;
use crate::snapshot::SnapshotId;
use crate::store::SnapshotStore;

/// Fetches one raw payload from the upstream source.
pub trait Extractor {
    fn extract(&mut self) -> Result<Value>;
}

/// Maps every raw payload read from the lake into records.
pub trait Transformer {
    type Record: Serialize;

    fn transform(&mut self, raw: &[Value]) -> Result<Vec<Self::Record>>;
}

/// Consumes the transformed batch, one JSON array per snapshot file.
pub trait Loader {
    fn load(&mut self, transformed: Vec<Value>) -> Result<()>;
}

#[derive(Debug)]
pub struct Stages<E, T, L> {
    pub extractor: E,
    pub transformer: T,
    pub loader: L,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Set when the journal tracks run ids.
    pub run_id: Option<Uuid>,
    pub raw_snapshot: SnapshotId,
    pub transformed_snapshot: SnapshotId,
    pub raw_payloads_read: usize,
    pub records_written: usize,
    pub transformed_batches_loaded: usize,
    pub retention: RetentionPlan,
}

pub struct Pipeline<E, T, L> {
    store: SnapshotStore,
    journal: Arc<dyn PipelineJournal>,
    retention_window: usize,
    stages: Stages<E, T, L>,
}

impl<E, T, L> Pipeline<E, T, L>
where
    E: Extractor,
    T: Transformer,
    L: Loader,
{
    pub fn new(
        store: SnapshotStore,
        journal: Arc<dyn PipelineJournal>,
        retention_window: usize,
        stages: Stages<E, T, L>,
    ) -> Self {
        Self {
            store,
            journal,
            retention_window,
            stages,
        }
    }

    pub fn from_config(
        config: &LakeConfig,
        journal: Arc<dyn PipelineJournal>,
        stages: Stages<E, T, L>,
    ) -> Result<Self> {
        config.validate()?;
        let store = SnapshotStore::open(config.layout(), Arc::clone(&journal))
            .context("failed to prepare lake directories")?;
        Ok(Self::new(store, journal, config.retention_window, stages))
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.journal.log_pipeline_phase(PipelinePhase::Start);
        let run_id = self.journal.current_run_id();

        self.journal.log_pipeline_phase(PipelinePhase::Extract);
        let payload = self
            .stages
            .extractor
            .extract()
            .context("extract phase failed")?;
        let raw_snapshot = self
            .store
            .write_raw(&payload)
            .context("failed to write raw snapshot")?;

        self.journal.log_pipeline_phase(PipelinePhase::Transform);
        let raw = self.store.read_raw().context("failed to read raw snapshots")?;
        let records = self
            .stages
            .transformer
            .transform(&raw)
            .context("transform phase failed")?;
        let transformed_snapshot = self
            .store
            .write_transformed(&records)
            .context("failed to write transformed snapshot")?;

        self.journal.log_pipeline_phase(PipelinePhase::Load);
        let transformed = self
            .store
            .read_transformed()
            .context("failed to read transformed snapshots")?;
        let transformed_batches_loaded = transformed.len();
        self.stages
            .loader
            .load(transformed)
            .context("load phase failed")?;

        self.journal.log_pipeline_phase(PipelinePhase::Retain);
        let retention = self
            .store
            .enforce_retention(self.retention_window)
            .context("retention sweep failed")?;

        self.journal.log_pipeline_phase(PipelinePhase::End);
        self.journal
            .save_last_run_info()
            .context("failed to save last run info")?;

        Ok(RunSummary {
            run_id,
            raw_snapshot,
            transformed_snapshot,
            raw_payloads_read: raw.len(),
            records_written: records.len(),
            transformed_batches_loaded,
            retention,
        })
    }
}
