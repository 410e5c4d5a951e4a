// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Every attribute a record is normalized into, independent of how any one
/// source spells its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Concessionaire,
    Highway,
    Km,
    Direction,
    AccidentClass,
    AccidentType,
    Cause,
    Weather,
    Visibility,
    Vehicle,
    LaneType,
    Latitude,
    Longitude,
    OccurredAt,
    Fatalities,
    Id,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 16] = [
        CanonicalField::Concessionaire,
        CanonicalField::Highway,
        CanonicalField::Km,
        CanonicalField::Direction,
        CanonicalField::AccidentClass,
        CanonicalField::AccidentType,
        CanonicalField::Cause,
        CanonicalField::Weather,
        CanonicalField::Visibility,
        CanonicalField::Vehicle,
        CanonicalField::LaneType,
        CanonicalField::Latitude,
        CanonicalField::Longitude,
        CanonicalField::OccurredAt,
        CanonicalField::Fatalities,
        CanonicalField::Id,
    ];

    /// Free-text fields, the only ones subject to invalid-token checks.
    pub const TEXT: [CanonicalField; 10] = [
        CanonicalField::Concessionaire,
        CanonicalField::Highway,
        CanonicalField::Direction,
        CanonicalField::AccidentClass,
        CanonicalField::AccidentType,
        CanonicalField::Cause,
        CanonicalField::Weather,
        CanonicalField::Visibility,
        CanonicalField::Vehicle,
        CanonicalField::LaneType,
    ];

    /// Fields bound through a plain alias list. `OccurredAt` has its own
    /// detection rules and `Id` is assigned by the sink.
    pub fn is_column_bound(self) -> bool {
        !matches!(self, CanonicalField::OccurredAt | CanonicalField::Id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Concessionaire => "concessionaire",
            CanonicalField::Highway => "highway",
            CanonicalField::Km => "km",
            CanonicalField::Direction => "direction",
            CanonicalField::AccidentClass => "accident_class",
            CanonicalField::AccidentType => "accident_type",
            CanonicalField::Cause => "cause",
            CanonicalField::Weather => "weather",
            CanonicalField::Visibility => "visibility",
            CanonicalField::Vehicle => "vehicle",
            CanonicalField::LaneType => "lane_type",
            CanonicalField::Latitude => "latitude",
            CanonicalField::Longitude => "longitude",
            CanonicalField::OccurredAt => "occurred_at",
            CanonicalField::Fatalities => "fatalities",
            CanonicalField::Id => "id",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the accident timestamp comes from in one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSource {
    /// Separate date and time columns, joined with a space before parsing.
    Combined { date: String, time: String },
    /// One column holding a date or a date-time.
    Single(String),
    /// Nothing usable; only the provenance fallback year can supply a date.
    Absent,
}

/// Resolved mapping from canonical field to the concrete column of one source.
///
/// Built once per source by the resolver and never mutated afterwards; all
/// downstream code reads raw cells through it instead of by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub date: DateSource,
    columns: BTreeMap<CanonicalField, Option<String>>,
}

impl FieldBinding {
    pub(crate) fn new(date: DateSource, columns: BTreeMap<CanonicalField, Option<String>>) -> Self {
        Self { date, columns }
    }

    /// Source column bound to `field`, or `None` when the source lacks it.
    pub fn column(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::OccurredAt => match &self.date {
                DateSource::Combined { date, .. } => Some(date.as_str()),
                DateSource::Single(col) => Some(col.as_str()),
                DateSource::Absent => None,
            },
            _ => self.columns.get(&field).and_then(|c| c.as_deref()),
        }
    }

    pub fn is_bound(&self, field: CanonicalField) -> bool {
        self.column(field).is_some()
    }

    /// Canonical fields the source could not supply.
    pub fn absent_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| *f != CanonicalField::Id && !self.is_bound(*f))
            .collect()
    }
}
