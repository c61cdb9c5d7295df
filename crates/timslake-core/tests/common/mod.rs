#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use timslake_core::clock::SteppingClock;
use timslake_core::error::Result;
use timslake_core::journal::{PipelineJournal, PipelinePhase};
use timslake_core::layout::LakeLayout;
use timslake_core::store::SnapshotStore;

#[derive(Debug, Default)]
pub struct RecordingJournal {
    pub messages: Mutex<Vec<String>>,
    pub phases: Mutex<Vec<PipelinePhase>>,
    pub saves: Mutex<usize>,
}

impl RecordingJournal {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl PipelineJournal for RecordingJournal {
    fn log(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn log_pipeline_phase(&self, phase: PipelinePhase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn save_last_run_info(&self) -> Result<()> {
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 17)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// Store whose clock advances one second per snapshot written.
pub fn stepping_store(root: &std::path::Path) -> (SnapshotStore, Arc<RecordingJournal>) {
    let journal = Arc::new(RecordingJournal::default());
    let store = SnapshotStore::open_with_clock(
        LakeLayout::new(root),
        journal.clone(),
        Box::new(SteppingClock::new(start(), Duration::seconds(1))),
    )
    .expect("open store");
    (store, journal)
}

pub fn dir_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}
