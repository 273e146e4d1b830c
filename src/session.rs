use crate::record::AttendanceRecord;
use crate::roster::{ClassDescriptor, PeriodDescriptor};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Session generation captured when remote work starts. A completion whose
/// ticket is no longer current arrived after the session moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no class selected")]
    NoClassSelected,

    #[error("seat {seat} is outside 1..={seat_count} for class {class_id}")]
    SeatOutOfRange {
        class_id: String,
        seat: u32,
        seat_count: u32,
    },

    #[error("select at least one present seat before saving")]
    NothingMarked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefillOutcome {
    Applied { rejected: Vec<u32> },
    Stale,
}

#[derive(Debug)]
struct ActiveClass {
    class_id: String,
    seat_count: u32,
    present: BTreeSet<u32>,
}

#[derive(Debug, Default)]
pub struct AttendanceSession {
    active: Option<ActiveClass>,
    generation: u64,
}

impl AttendanceSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> Ticket {
        self.generation += 1;
        Ticket(self.generation)
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.generation)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }

    pub fn class_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.class_id.as_str())
    }

    pub fn present(&self) -> Option<&BTreeSet<u32>> {
        self.active.as_ref().map(|a| &a.present)
    }

    pub fn present_seats(&self) -> Vec<u32> {
        self.present()
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Switch to `class` with nobody marked. The returned ticket guards the
    /// prefill lookup for today's saved sheet.
    pub fn select_class(&mut self, class: &ClassDescriptor) -> Ticket {
        self.active = Some(ActiveClass {
            class_id: class.class_id.clone(),
            seat_count: class.seats(),
            present: BTreeSet::new(),
        });
        self.bump()
    }

    /// Replace the marked seats with a previously saved sheet, unless the
    /// session changed after `ticket` was issued. Out-of-range seats are
    /// dropped and reported.
    pub fn apply_prefill(&mut self, ticket: Ticket, seats: &[u32]) -> PrefillOutcome {
        if !self.is_current(ticket) {
            return PrefillOutcome::Stale;
        }
        let Some(active) = self.active.as_mut() else {
            return PrefillOutcome::Stale;
        };
        let (valid, rejected): (Vec<u32>, Vec<u32>) = seats
            .iter()
            .copied()
            .partition(|&s| s >= 1 && s <= active.seat_count);
        active.present = valid.into_iter().collect();
        self.bump();
        PrefillOutcome::Applied { rejected }
    }

    /// Flip one seat. Returns whether the seat is now marked present.
    pub fn toggle_seat(&mut self, seat: u32) -> Result<bool, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoClassSelected)?;
        if seat == 0 || seat > active.seat_count {
            return Err(SessionError::SeatOutOfRange {
                class_id: active.class_id.clone(),
                seat,
                seat_count: active.seat_count,
            });
        }
        let now_present = if active.present.remove(&seat) {
            false
        } else {
            active.present.insert(seat);
            true
        };
        self.bump();
        Ok(now_present)
    }

    pub fn reset(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.present.clear();
        }
        self.bump();
    }

    pub fn prepare_record(
        &self,
        period: &PeriodDescriptor,
        date: NaiveDate,
    ) -> Result<AttendanceRecord, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoClassSelected)?;
        if active.present.is_empty() {
            return Err(SessionError::NothingMarked);
        }
        Ok(AttendanceRecord {
            date,
            class_id: active.class_id.clone(),
            period_id: period.period_id.clone(),
            present_seats: active.present.iter().copied().collect(),
            score: period.score_weight,
        })
    }

    /// Called once the remote confirmed a save. Clears the marks only when
    /// nothing was edited after the save was prepared.
    pub fn finish_commit(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.reset();
        true
    }
}
