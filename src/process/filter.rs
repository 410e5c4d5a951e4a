use anyhow::{Context, Result};
use chrono::Datelike;
use regex::Regex;
use std::{collections::HashSet, fmt};

use crate::{
    config::FilterConfig,
    record::{CanonicalRecord, NormalizedRecord},
    schema::{CanonicalField, FieldBinding},
};

/// Why a row did not make it into the canonical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    MissingDate,
    InvalidToken(CanonicalField),
    UnparseableKm,
    OutsideYearWindow,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingDate => f.write_str("no resolvable date"),
            DropReason::InvalidToken(field) => write!(f, "invalid token in {}", field),
            DropReason::UnparseableKm => f.write_str("unparseable km"),
            DropReason::OutsideYearWindow => f.write_str("outside year window"),
        }
    }
}

/// Keep/drop decision for normalized rows.
#[derive(Debug, Clone)]
pub struct ValidityFilter {
    invalid_token: Regex,
    years: Option<HashSet<i32>>,
}

impl ValidityFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let invalid_token = Regex::new(&config.invalid_token_pattern).with_context(|| {
            format!(
                "compiling invalid-token pattern `{}`",
                config.invalid_token_pattern
            )
        })?;
        Ok(Self {
            invalid_token,
            years: config.years.as_ref().map(|ys| ys.iter().copied().collect()),
        })
    }

    /// True when `value` is a masked "missing/unknown" marker.
    pub fn is_invalid_token(&self, value: &str) -> bool {
        self.invalid_token.is_match(&value.trim().to_uppercase())
    }

    /// Promote `record` to a canonical record, or say why it is dropped.
    ///
    /// Only text fields bound to a real source column are token-checked; a
    /// source that never had a column cannot fail a check on it. One bad
    /// field drops the whole row.
    pub fn check(
        &self,
        record: NormalizedRecord,
        binding: &FieldBinding,
    ) -> Result<CanonicalRecord, DropReason> {
        let occurred_at = record.occurred_at.ok_or(DropReason::MissingDate)?;

        for field in CanonicalField::TEXT {
            if !binding.is_bound(field) {
                continue;
            }
            if let Some(v) = record.text(field) {
                if self.is_invalid_token(v) {
                    return Err(DropReason::InvalidToken(field));
                }
            }
        }

        let km = record.km.ok_or(DropReason::UnparseableKm)?;

        if let Some(years) = &self.years {
            if !years.contains(&occurred_at.year()) {
                return Err(DropReason::OutsideYearWindow);
            }
        }

        Ok(CanonicalRecord {
            concessionaire: record.concessionaire,
            highway: record.highway,
            km,
            direction: record.direction,
            accident_class: record.accident_class,
            accident_type: record.accident_type,
            cause: record.cause,
            weather: record.weather,
            visibility: record.visibility,
            vehicle: record.vehicle,
            lane_type: record.lane_type,
            latitude: record.latitude,
            longitude: record.longitude,
            occurred_at,
            fatalities: record.fatalities,
        })
    }
}
