// src/schema/resolve.rs

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use super::types::{CanonicalField, DateSource, FieldBinding};
use crate::config::SchemaConfig;

/// Works out which historical naming and date conventions a source follows.
pub struct SchemaResolver<'a> {
    config: &'a SchemaConfig,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(config: &'a SchemaConfig) -> Self {
        Self { config }
    }

    /// Bind every canonical field to a column of `columns` (header order) or
    /// to nothing. Never fails: gaps are handled by the normalizer and filter.
    pub fn resolve(&self, columns: &[String]) -> FieldBinding {
        let present: HashSet<&str> = columns.iter().map(String::as_str).collect();

        let date = self.resolve_date(columns, &present);
        if date == DateSource::Absent {
            warn!(
                ?columns,
                "no date column recognised; dates will come from the fallback year"
            );
        }

        let mut bound = BTreeMap::new();
        for field in CanonicalField::ALL {
            if !field.is_column_bound() {
                continue;
            }
            let column = self
                .config
                .aliases
                .get(&field)
                .and_then(|names| names.iter().find(|n| present.contains(n.as_str())))
                .cloned();
            if column.is_none() {
                debug!(field = %field, "no column bound");
            }
            bound.insert(field, column);
        }

        FieldBinding::new(date, bound)
    }

    fn resolve_date(&self, columns: &[String], present: &HashSet<&str>) -> DateSource {
        let cfg = self.config;

        // 1) split date + time under their primary names
        if present.contains(cfg.date_column.as_str()) {
            if let Some(time) = cfg
                .time_columns
                .iter()
                .find(|t| present.contains(t.as_str()))
            {
                return DateSource::Combined {
                    date: cfg.date_column.clone(),
                    time: time.clone(),
                };
            }
        }

        // 2) a single column carrying the date marker
        let marker = cfg.date_marker.to_uppercase();
        if !marker.is_empty() {
            if let Some(col) = columns.iter().find(|c| c.to_uppercase().contains(&marker)) {
                return DateSource::Single(col.clone());
            }
        }

        // 3) known aliases
        if let Some(col) = cfg
            .date_aliases
            .iter()
            .find(|a| present.contains(a.as_str()))
        {
            return DateSource::Single(col.clone());
        }

        DateSource::Absent
    }
}
