use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Seat number -> display name for one class.
pub type NameLabels = BTreeMap<u32, String>;

/// Class id -> seat labels. Reference data for rendering only.
pub type StudentNameMap = BTreeMap<String, NameLabels>;

/// One saved attendance sheet. Identified by (date, class_id, period_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub class_id: String,
    pub period_id: String,
    pub present_seats: Vec<u32>,
    pub score: f64,
}

impl AttendanceRecord {
    pub fn key(&self) -> (NaiveDate, &str, &str) {
        (self.date, self.class_id.as_str(), self.period_id.as_str())
    }
}
