use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::work_item::{WorkItem, WorkItemType};

/// Hours a developer is expected to track per working day. Also the divisor
/// for converting raw hours into the day-fraction that non-task items accrue
/// as completed work.
pub const EXPECTED_HOURS_PER_DAY: u32 = 6;

/// A single allocation of hours against a work item, captured before saving.
#[derive(Debug, Clone)]
pub struct TimeEntry {
    pub hours: f64,
    pub work_item: WorkItem,
    pub burn: bool,
    pub close_work_item: bool,
    pub date: NaiveDate,
    pub expected_hours_per_day: u32,
}

impl TimeEntry {
    pub fn new(hours: f64, work_item: WorkItem) -> Self {
        Self {
            hours,
            work_item,
            burn: true,
            close_work_item: false,
            date: Local::now().date_naive(),
            expected_hours_per_day: EXPECTED_HOURS_PER_DAY,
        }
    }

    pub fn to_persistable(&self) -> PersistableTimeEntry {
        PersistableTimeEntry {
            hours: self.hours,
            work_item_id: self.work_item.id,
            burn: self.burn,
            date: self.date,
        }
    }

    /// Remaining work after this entry. Burn deducts the logged hours,
    /// clamped at zero; without burn the remote value is left untouched.
    pub fn compute_remaining_work(&self) -> f64 {
        if self.burn {
            (self.work_item.remaining_work - self.hours).max(0.0)
        } else {
            self.work_item.remaining_work
        }
    }

    /// Completed work after this entry. Tasks accrue raw hours; anything
    /// above a task accrues the fraction of an expected day those hours
    /// represent, rounded up to two decimals.
    pub fn compute_completed_work(&self) -> f64 {
        if self.work_item.kind == WorkItemType::Task {
            self.work_item.completed_work + self.hours
        } else {
            let day_fraction = self.hours / f64::from(self.expected_hours_per_day);
            self.work_item.completed_work + round_up_2dp(day_fraction)
        }
    }
}

fn round_up_2dp(value: f64) -> f64 {
    (value * 100.0).ceil() / 100.0
}

/// The durable subset of a time entry, one JSONL record per save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistableTimeEntry {
    pub hours: f64,
    pub work_item_id: i64,
    pub burn: bool,
    pub date: NaiveDate,
}
