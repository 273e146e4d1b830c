use crate::record::AttendanceRecord;
use crate::roster::ClassDescriptor;
use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Half-up rounding to one decimal: `floor(10*x + 0.5) / 10`
fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub date: Option<NaiveDate>,
    pub period_id: Option<String>,
    pub class_id: Option<String>,
}

impl HistoryFilter {
    pub fn exact(date: NaiveDate, period_id: &str, class_id: &str) -> Self {
        Self {
            date: Some(date),
            period_id: Some(period_id.to_string()),
            class_id: Some(class_id.to_string()),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.date.is_some() && self.period_id.is_some() && self.class_id.is_some()
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        self.date.map_or(true, |d| record.date == d)
            && self
                .period_id
                .as_deref()
                .map_or(true, |p| record.period_id == p)
            && self
                .class_id
                .as_deref()
                .map_or(true, |c| record.class_id == c)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordMatch<'a> {
    NotFound,
    Unique(&'a AttendanceRecord),
    /// Loose filters can hit several sheets; all of them, in cache order.
    Ambiguous(Vec<&'a AttendanceRecord>),
}

impl<'a> RecordMatch<'a> {
    pub fn unique(&self) -> Option<&'a AttendanceRecord> {
        match self {
            RecordMatch::Unique(r) => Some(r),
            _ => None,
        }
    }

    pub fn all(&self) -> Vec<&'a AttendanceRecord> {
        match self {
            RecordMatch::NotFound => Vec::new(),
            RecordMatch::Unique(r) => vec![*r],
            RecordMatch::Ambiguous(v) => v.clone(),
        }
    }
}

pub fn find_record<'a>(records: &'a [AttendanceRecord], filter: &HistoryFilter) -> RecordMatch<'a> {
    let mut hits: Vec<&AttendanceRecord> = records.iter().filter(|r| filter.matches(r)).collect();
    match hits.len() {
        0 => RecordMatch::NotFound,
        1 => RecordMatch::Unique(hits.remove(0)),
        _ => RecordMatch::Ambiguous(hits),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: u32,
    pub present: usize,
    /// Percent, one decimal.
    pub rate: f64,
}

pub fn compute_stats(record: Option<&AttendanceRecord>, class: &ClassDescriptor) -> AttendanceStats {
    let total = class.seats();
    let present = record.map(|r| r.present_seats.len()).unwrap_or(0);
    let rate = if total > 0 {
        round_off_1_decimal(100.0 * present as f64 / f64::from(total))
    } else {
        0.0
    };
    AttendanceStats {
        total,
        present,
        rate,
    }
}

/// Append `record` to an in-memory cache, replacing any sheet with the same
/// key so a re-save moves to the newest position.
pub fn remember_record(records: &mut Vec<AttendanceRecord>, record: AttendanceRecord) {
    records.retain(|r| r.key() != record.key());
    records.push(record);
}

/// Last `n` sheets, newest first. No sorting or dedup; cache order is trusted.
pub fn recent_records(records: &[AttendanceRecord], n: usize) -> Vec<&AttendanceRecord> {
    records.iter().rev().take(n).collect()
}
