use crate::record::NameLabels;
use crate::roster::{ClassDescriptor, Column, SeatMove};
use serde::Serialize;
use std::collections::BTreeSet;

/// Seats per desk row: two on the left of the aisle, two on the right.
pub const SEATS_PER_ROW: u32 = 4;
/// Columns are drawn in blocks of this many seats.
pub const GROUP_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLayout {
    pub class_id: String,
    pub seat_count: u32,
    pub left: Vec<u32>,
    pub right: Vec<u32>,
}

fn default_column(seat: u32) -> Column {
    if seat.saturating_sub(1) % SEATS_PER_ROW < 2 {
        Column::Left
    } else {
        Column::Right
    }
}

/// Two-column desk arrangement for a class. `moves` pins individual seats to
/// a column regardless of the row rule; both columns stay ascending.
pub fn compute_layout(class: &ClassDescriptor, moves: &[SeatMove]) -> SeatLayout {
    let seat_count = class.seats();
    let mut left = Vec::new();
    let mut right = Vec::new();
    for seat in 1..=seat_count {
        let column = moves
            .iter()
            .find(|m| m.seat == seat)
            .map(|m| m.column)
            .unwrap_or_else(|| default_column(seat));
        match column {
            Column::Left => left.push(seat),
            Column::Right => right.push(seat),
        }
    }
    SeatLayout {
        class_id: class.class_id.clone(),
        seat_count,
        left,
        right,
    }
}

impl SeatLayout {
    pub fn left_groups(&self) -> Vec<Vec<u32>> {
        self.left.chunks(GROUP_SIZE).map(|g| g.to_vec()).collect()
    }

    pub fn right_groups(&self) -> Vec<Vec<u32>> {
        self.right.chunks(GROUP_SIZE).map(|g| g.to_vec()).collect()
    }

    pub fn column_of(&self, seat: u32) -> Option<Column> {
        if self.left.binary_search(&seat).is_ok() {
            Some(Column::Left)
        } else if self.right.binary_search(&seat).is_ok() {
            Some(Column::Right)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatCell {
    pub seat: u32,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Render-ready columns: each column is a list of desk blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub class_id: String,
    pub left: Vec<Vec<SeatCell>>,
    pub right: Vec<Vec<SeatCell>>,
    pub present_count: usize,
}

pub fn seat_map(
    layout: &SeatLayout,
    present: &BTreeSet<u32>,
    names: Option<&NameLabels>,
) -> SeatMap {
    let cells = |column: &[u32]| -> Vec<Vec<SeatCell>> {
        column
            .chunks(GROUP_SIZE)
            .map(|group| {
                group
                    .iter()
                    .map(|&seat| SeatCell {
                        seat,
                        present: present.contains(&seat),
                        name: names.and_then(|n| n.get(&seat)).cloned(),
                    })
                    .collect()
            })
            .collect()
    };
    SeatMap {
        class_id: layout.class_id.clone(),
        left: cells(&layout.left),
        right: cells(&layout.right),
        present_count: present
            .iter()
            .filter(|s| layout.column_of(**s).is_some())
            .count(),
    }
}
