use std::fs;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LakeError, Result};
use crate::snapshot::SnapshotCategory;
use crate::store::{ArchivedSnapshot, SnapshotStore};

pub const DEFAULT_WINDOW: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct RetentionGroup {
    pub category: SnapshotCategory,
    /// Oldest first.
    pub kept: Vec<String>,
    /// Oldest first.
    pub expired: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionPlan {
    pub window: usize,
    pub groups: Vec<RetentionGroup>,
    /// Archive entries whose names do not parse; never deleted.
    pub unrecognized: Vec<String>,
}

impl RetentionPlan {
    pub fn total_expired(&self) -> usize {
        self.groups.iter().map(|group| group.expired.len()).sum()
    }

    pub fn group(&self, category: SnapshotCategory) -> Option<&RetentionGroup> {
        self.groups.iter().find(|group| group.category == category)
    }
}

/// Keeps the newest `window` archive entries of every category.
pub fn plan_retention(archived: &[ArchivedSnapshot], window: usize) -> RetentionPlan {
    let unrecognized = archived
        .iter()
        .filter(|entry| entry.id.is_none())
        .map(|entry| entry.file_name.clone())
        .collect();

    let groups = SnapshotCategory::ALL
        .into_iter()
        .map(|category| {
            let mut members: Vec<&ArchivedSnapshot> = archived
                .iter()
                .filter(|entry| entry.id.map(|id| id.category) == Some(category))
                .collect();
            members.sort_by(|a, b| (a.id, &a.file_name).cmp(&(b.id, &b.file_name)));

            let cutoff = members.len().saturating_sub(window);
            let names: Vec<String> = members.iter().map(|entry| entry.file_name.clone()).collect();
            let (expired, kept) = names.split_at(cutoff);

            RetentionGroup {
                category,
                kept: kept.to_vec(),
                expired: expired.to_vec(),
            }
        })
        .collect();

    RetentionPlan {
        window,
        groups,
        unrecognized,
    }
}

impl SnapshotStore {
    pub fn plan_retention(&self, window: usize) -> Result<RetentionPlan> {
        let archived = self.archived()?;
        let plan = plan_retention(&archived, window);
        for name in &plan.unrecognized {
            warn!(file = %name, "archive entry outside the naming scheme, leaving it alone");
        }
        Ok(plan)
    }

    /// Deletes every expired entry; the first failure aborts the sweep.
    pub fn apply_retention(&self, plan: &RetentionPlan) -> Result<()> {
        for group in &plan.groups {
            for name in &group.expired {
                let path = self.layout().processed_dir().join(name);
                fs::remove_file(&path).map_err(|source| LakeError::io(&path, source))?;
                self.journal().log(&format!(
                    "Deleted old {} snapshot: {name}",
                    group.category.label()
                ));
            }
        }
        Ok(())
    }

    pub fn enforce_retention(&self, window: usize) -> Result<RetentionPlan> {
        let plan = self.plan_retention(window)?;
        self.apply_retention(&plan)?;
        info!(
            window,
            deleted = plan.total_expired(),
            "retention window enforced"
        );
        Ok(plan)
    }
}
