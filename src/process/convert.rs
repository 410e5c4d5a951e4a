use chrono::NaiveDateTime;

use crate::{
    config::UnparseableKm,
    process::{date_parser, utils},
    record::{NormalizedRecord, RawRow, SourceDescriptor},
    schema::{CanonicalField, DateSource, FieldBinding},
};

/// Convert one raw row into typed canonical values. Never fails: anything
/// unparseable becomes the field's default (0 or `None`), and the filter
/// decides afterwards whether the row survives.
pub fn normalize(
    row: &RawRow,
    binding: &FieldBinding,
    source: &SourceDescriptor,
    km_policy: UnparseableKm,
) -> NormalizedRecord {
    let cell = |field: CanonicalField| bound_cell(row, binding, field);
    let text = |field: CanonicalField| bound_cell(row, binding, field).and_then(normalize_text);

    let (occurred_at, date_from_fallback) = match normalize_date(row, &binding.date) {
        Some(dt) => (Some(dt), false),
        None => {
            let fallback = source.fallback_year.and_then(date_parser::start_of_year);
            (fallback, fallback.is_some())
        }
    };

    NormalizedRecord {
        concessionaire: text(CanonicalField::Concessionaire),
        highway: text(CanonicalField::Highway),
        direction: text(CanonicalField::Direction),
        accident_class: text(CanonicalField::AccidentClass),
        accident_type: text(CanonicalField::AccidentType),
        cause: text(CanonicalField::Cause),
        weather: text(CanonicalField::Weather),
        visibility: text(CanonicalField::Visibility),
        vehicle: text(CanonicalField::Vehicle),
        lane_type: text(CanonicalField::LaneType),
        km: normalize_km(cell(CanonicalField::Km), km_policy),
        fatalities: normalize_count(cell(CanonicalField::Fatalities)),
        latitude: normalize_coordinate(cell(CanonicalField::Latitude), 90.0),
        longitude: normalize_coordinate(cell(CanonicalField::Longitude), 180.0),
        occurred_at,
        date_from_fallback,
    }
}

fn bound_cell<'a>(row: &'a RawRow, binding: &'a FieldBinding, field: CanonicalField) -> Option<&'a str> {
    binding.column(field).and_then(|col| row.get(col))
}

fn normalize_date(row: &RawRow, date: &DateSource) -> Option<NaiveDateTime> {
    match date {
        DateSource::Combined { date, time } => {
            let d = utils::clean_str(row.get(date)?);
            let t = utils::clean_str(row.get(time)?);
            date_parser::parse_day_first(&format!("{} {}", d, t))
        }
        DateSource::Single(col) => date_parser::parse_day_first(&utils::clean_str(row.get(col)?)),
        DateSource::Absent => None,
    }
}

/// Trimmed, case preserved; blank cells carry no value.
fn normalize_text(raw: &str) -> Option<String> {
    let cleaned = utils::clean_str(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn normalize_km(raw: Option<&str>, policy: UnparseableKm) -> Option<f64> {
    match raw.and_then(utils::parse_decimal).filter(|v| *v >= 0.0) {
        Some(km) => Some(km),
        None => match policy {
            UnparseableKm::Zero => Some(0.0),
            UnparseableKm::Drop => None,
        },
    }
}

/// Coordinates are never defaulted: a fabricated 0 would look like real data.
fn normalize_coordinate(raw: Option<&str>, limit: f64) -> Option<f64> {
    raw.and_then(utils::parse_decimal)
        .filter(|v| (-limit..=limit).contains(v))
}

fn normalize_count(raw: Option<&str>) -> i64 {
    raw.and_then(utils::parse_decimal)
        .map(f64::trunc)
        .filter(|v| *v >= 0.0 && *v <= i64::MAX as f64)
        .map(|v| v as i64)
        .unwrap_or(0)
}
