use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDescriptor {
    pub class_id: String,
    pub display_name: String,
    pub seat_count: i64,
}

impl ClassDescriptor {
    /// Seat count as a seat number bound. Only valid after roster validation.
    pub fn seats(&self) -> u32 {
        u32::try_from(self.seat_count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDescriptor {
    pub period_id: String,
    pub display_name: String,
    pub score_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMove {
    pub seat: u32,
    pub column: Column,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOverride {
    pub class_id: String,
    pub moves: Vec<SeatMove>,
}

/// Static class/period configuration. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub classes: Vec<ClassDescriptor>,
    pub periods: Vec<PeriodDescriptor>,
    #[serde(default)]
    pub layout_overrides: Vec<LayoutOverride>,
}

fn class(id: &str, seat_count: i64) -> ClassDescriptor {
    ClassDescriptor {
        class_id: id.to_string(),
        display_name: id.to_string(),
        seat_count,
    }
}

fn period(id: &str, score_weight: f64) -> PeriodDescriptor {
    PeriodDescriptor {
        period_id: id.to_string(),
        display_name: id.to_string(),
        score_weight,
    }
}

impl Roster {
    pub fn builtin() -> Self {
        Self {
            classes: vec![
                class("2R", 22),
                class("2S", 22),
                class("1R", 20),
                class("1S-F", 20),
                class("1S-M", 14),
            ],
            periods: vec![period("1교시", 0.6), period("3교시", 0.4)],
            layout_overrides: vec![LayoutOverride {
                class_id: "2S".to_string(),
                moves: vec![
                    SeatMove {
                        seat: 21,
                        column: Column::Right,
                    },
                    SeatMove {
                        seat: 22,
                        column: Column::Right,
                    },
                ],
            }],
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let roster: Roster = serde_json::from_str(raw)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classes.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        let mut class_ids = HashSet::new();
        for c in &self.classes {
            if c.seat_count <= 0 || c.seat_count > i64::from(u32::MAX) {
                return Err(ConfigError::InvalidSeatCount {
                    class_id: c.class_id.clone(),
                    seat_count: c.seat_count,
                });
            }
            if !class_ids.insert(c.class_id.as_str()) {
                return Err(ConfigError::DuplicateClass(c.class_id.clone()));
            }
        }

        let mut period_ids = HashSet::new();
        for p in &self.periods {
            if !p.score_weight.is_finite() || p.score_weight < 0.0 {
                return Err(ConfigError::InvalidScoreWeight {
                    period_id: p.period_id.clone(),
                });
            }
            if !period_ids.insert(p.period_id.as_str()) {
                return Err(ConfigError::DuplicatePeriod(p.period_id.clone()));
            }
        }

        let mut overridden = HashSet::new();
        for o in &self.layout_overrides {
            let Some(target) = self.class(&o.class_id) else {
                return Err(ConfigError::UnknownOverrideClass(o.class_id.clone()));
            };
            if !overridden.insert(o.class_id.as_str()) {
                return Err(ConfigError::DuplicateOverride(o.class_id.clone()));
            }
            let mut seen = HashSet::new();
            for m in &o.moves {
                if m.seat == 0 || m.seat > target.seats() {
                    return Err(ConfigError::OverrideSeatOutOfRange {
                        class_id: o.class_id.clone(),
                        seat: m.seat,
                        seat_count: target.seat_count,
                    });
                }
                if !seen.insert(m.seat) {
                    return Err(ConfigError::DuplicateOverrideSeat {
                        class_id: o.class_id.clone(),
                        seat: m.seat,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn class(&self, class_id: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.class_id == class_id)
    }

    pub fn period(&self, period_id: &str) -> Option<&PeriodDescriptor> {
        self.periods.iter().find(|p| p.period_id == period_id)
    }

    pub fn overrides_for(&self, class_id: &str) -> &[SeatMove] {
        self.layout_overrides
            .iter()
            .find(|o| o.class_id == class_id)
            .map(|o| o.moves.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_roster_is_valid() {
        let r = Roster::builtin();
        r.validate().expect("builtin roster");
        assert_eq!(r.classes.len(), 5);
        assert_eq!(r.class("1S-M").map(|c| c.seat_count), Some(14));
        assert_eq!(r.period("1교시").map(|p| p.score_weight), Some(0.6));
        assert_eq!(r.overrides_for("2S").len(), 2);
        assert!(r.overrides_for("2R").is_empty());
    }

    #[test]
    fn rejects_non_positive_seat_count() {
        let raw = r#"{
            "classes": [{ "classId": "X", "displayName": "X", "seatCount": 0 }],
            "periods": []
        }"#;
        let e = Roster::from_json_str(raw).expect_err("zero seats must be rejected");
        assert!(matches!(e, ConfigError::InvalidSeatCount { seat_count: 0, .. }));

        let raw = r#"{
            "classes": [{ "classId": "X", "displayName": "X", "seatCount": -3 }],
            "periods": []
        }"#;
        assert!(Roster::from_json_str(raw).is_err());
    }

    #[test]
    fn rejects_override_outside_class() {
        let raw = r#"{
            "classes": [{ "classId": "A", "displayName": "A", "seatCount": 8 }],
            "periods": [{ "periodId": "p1", "displayName": "P1", "scoreWeight": 1.0 }],
            "layoutOverrides": [{ "classId": "A", "moves": [{ "seat": 9, "column": "right" }] }]
        }"#;
        let e = Roster::from_json_str(raw).expect_err("seat 9 of 8");
        assert!(matches!(
            e,
            ConfigError::OverrideSeatOutOfRange { seat: 9, .. }
        ));

        let raw = r#"{
            "classes": [{ "classId": "A", "displayName": "A", "seatCount": 8 }],
            "periods": [],
            "layoutOverrides": [{ "classId": "B", "moves": [] }]
        }"#;
        assert!(matches!(
            Roster::from_json_str(raw),
            Err(ConfigError::UnknownOverrideClass(_))
        ));
    }

    #[test]
    fn rejects_duplicates_and_bad_weights() {
        let mut r = Roster::builtin();
        r.classes.push(class("2R", 10));
        assert!(matches!(r.validate(), Err(ConfigError::DuplicateClass(_))));

        let mut r = Roster::builtin();
        r.periods.push(period("5교시", f64::NAN));
        assert!(matches!(
            r.validate(),
            Err(ConfigError::InvalidScoreWeight { .. })
        ));

        let mut r = Roster::builtin();
        r.layout_overrides[0].moves.push(SeatMove {
            seat: 21,
            column: Column::Left,
        });
        assert!(matches!(
            r.validate(),
            Err(ConfigError::DuplicateOverrideSeat { seat: 21, .. })
        ));
    }
}
