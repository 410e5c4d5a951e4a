// src/record.rs

use chrono::NaiveDateTime;
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{process::utils::extract_year_from_name, schema::CanonicalField};

/// One data line of a source, keyed by the source's own column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: HashMap<String, String>,
}

impl RawRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw cell under `column`; `None` when the column is missing entirely.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

/// Identifies one ingested file and what can be inferred from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub path: PathBuf,
    /// Used only when a row carries no parseable date of its own.
    pub fallback_year: Option<i32>,
}

impl SourceDescriptor {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let fallback_year = extract_year_from_name(&name);
        Self {
            name,
            path,
            fallback_year,
        }
    }
}

/// A row after type coercion, before the keep/drop decision.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRecord {
    pub concessionaire: Option<String>,
    pub highway: Option<String>,
    pub direction: Option<String>,
    pub accident_class: Option<String>,
    pub accident_type: Option<String>,
    pub cause: Option<String>,
    pub weather: Option<String>,
    pub visibility: Option<String>,
    pub vehicle: Option<String>,
    pub lane_type: Option<String>,
    /// `None` only under the drop policy for unparseable km.
    pub km: Option<f64>,
    pub fatalities: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub occurred_at: Option<NaiveDateTime>,
    /// The date came from the source's fallback year, not the row.
    pub date_from_fallback: bool,
}

impl NormalizedRecord {
    /// Value of a free-text field; `None` for non-text fields.
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::Concessionaire => &self.concessionaire,
            CanonicalField::Highway => &self.highway,
            CanonicalField::Direction => &self.direction,
            CanonicalField::AccidentClass => &self.accident_class,
            CanonicalField::AccidentType => &self.accident_type,
            CanonicalField::Cause => &self.cause,
            CanonicalField::Weather => &self.weather,
            CanonicalField::Visibility => &self.visibility,
            CanonicalField::Vehicle => &self.vehicle,
            CanonicalField::LaneType => &self.lane_type,
            _ => return None,
        };
        value.as_deref()
    }
}

/// The canonical accident record handed to the sink. The storage id is not
/// part of it; the sink assigns one at write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub concessionaire: Option<String>,
    pub highway: Option<String>,
    pub km: f64,
    pub direction: Option<String>,
    pub accident_class: Option<String>,
    pub accident_type: Option<String>,
    pub cause: Option<String>,
    pub weather: Option<String>,
    pub visibility: Option<String>,
    pub vehicle: Option<String>,
    pub lane_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub occurred_at: NaiveDateTime,
    pub fatalities: i64,
}
