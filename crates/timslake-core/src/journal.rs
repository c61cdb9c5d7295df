//! Pipeline journal: the logging seam shared by the store and the orchestrator.
//!
//! Components receive an `Arc<dyn PipelineJournal>` at construction instead of
//! reaching for a process-wide logger, so tests can swap in their own recorder.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LakeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Start,
    Extract,
    Transform,
    Load,
    Retain,
    End,
}

impl PipelinePhase {
    pub const ORDER: [PipelinePhase; 6] = [
        PipelinePhase::Start,
        PipelinePhase::Extract,
        PipelinePhase::Transform,
        PipelinePhase::Load,
        PipelinePhase::Retain,
        PipelinePhase::End,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            PipelinePhase::Start => "STARTING PIPELINE",
            PipelinePhase::Extract => "EXTRACT",
            PipelinePhase::Transform => "TRANSFORM",
            PipelinePhase::Load => "LOAD",
            PipelinePhase::Retain => "RETAIN",
            PipelinePhase::End => "CLOSING PIPELINE",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

pub trait PipelineJournal: Send + Sync {
    fn log(&self, message: &str);
    fn log_pipeline_phase(&self, phase: PipelinePhase);
    fn save_last_run_info(&self) -> Result<()>;

    /// Identifier of the run in progress, for journals that track one.
    fn current_run_id(&self) -> Option<Uuid> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub phase: PipelinePhase,
    pub entered_at: DateTime<Utc>,
}

/// Contents of the last-run file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRunInfo {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseEntry>,
}

#[derive(Debug, Clone)]
struct RunState {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    phases: Vec<PhaseEntry>,
}

impl RunState {
    fn fresh() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            phases: Vec::new(),
        }
    }
}

/// Emits journal entries through `tracing` and persists a [`LastRunInfo`].
///
/// Logging [`PipelinePhase::Start`] opens a new run, so one journal can serve a
/// pipeline that runs repeatedly.
#[derive(Debug)]
pub struct TracingJournal {
    last_run_file: PathBuf,
    state: Mutex<RunState>,
}

impl TracingJournal {
    pub fn new(last_run_file: impl Into<PathBuf>) -> Self {
        Self {
            last_run_file: last_run_file.into(),
            state: Mutex::new(RunState::fresh()),
        }
    }

    /// Id of the current (or most recently finished) run.
    pub fn run_id(&self) -> Uuid {
        self.with_state(|state| state.run_id)
    }

    pub fn last_run_file(&self) -> &Path {
        &self.last_run_file
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl PipelineJournal for TracingJournal {
    fn log(&self, message: &str) {
        let run_id = self.run_id();
        info!(run_id = %run_id, "{message}");
    }

    fn log_pipeline_phase(&self, phase: PipelinePhase) {
        let run_id = self.with_state(|state| {
            if phase == PipelinePhase::Start {
                *state = RunState::fresh();
            }
            state.phases.push(PhaseEntry {
                phase,
                entered_at: Utc::now(),
            });
            state.run_id
        });
        info!(run_id = %run_id, phase = %phase, "===== {phase} =====");
    }

    fn current_run_id(&self) -> Option<Uuid> {
        Some(self.run_id())
    }

    fn save_last_run_info(&self) -> Result<()> {
        let info = self.with_state(|state| LastRunInfo {
            run_id: state.run_id,
            started_at: state.started_at,
            finished_at: Utc::now(),
            phases: state.phases.clone(),
        });

        if let Some(parent) = self.last_run_file.parent() {
            fs::create_dir_all(parent).map_err(|source| LakeError::io(parent, source))?;
        }
        let body = serde_json::to_string_pretty(&info)?;
        fs::write(&self.last_run_file, body)
            .map_err(|source| LakeError::io(&self.last_run_file, source))?;

        debug!(path = %self.last_run_file.display(), "saved last run info");
        Ok(())
    }
}

/// Reads the last-run file, `None` when no run has finished yet.
pub fn load_last_run(path: &Path) -> Result<Option<LastRunInfo>> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LakeError::io(path, source)),
    };
    let info = serde_json::from_str(&body).map_err(|source| LakeError::json(path, source))?;
    Ok(Some(info))
}
