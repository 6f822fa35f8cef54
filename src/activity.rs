use crate::{
    model::Balance,
    transaction::Mode,
};
use chrono::{
    DateTime,
    Utc,
};
use std::collections::VecDeque;

pub const ACTIVITY_CAPACITY: usize = 20;

/// Who changed what. Diagnostic only, nothing reads it back for correctness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub at: DateTime<Utc>,
    pub updated_by: String,
    pub user_affected: String,
    pub mode: Mode,
    pub reason: String,
    pub before: Balance,
    pub after: Balance,
}

impl ChangeRecord {
    pub fn summary(&self) -> String {
        format!(
            "{} {} {} {} ({}/{} -> {}/{}): {}",
            self.at.format("%H:%M:%S"),
            self.updated_by,
            self.mode,
            self.user_affected,
            self.before.local,
            self.before.global,
            self.after.local,
            self.after.global,
            self.reason,
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActivityLog {
    records: VecDeque<ChangeRecord>,
}

impl ActivityLog {
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push_front(record);
        self.records.truncate(ACTIVITY_CAPACITY);
    }

    /// Most recent first.
    pub fn recent(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
