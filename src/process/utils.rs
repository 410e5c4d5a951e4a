use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::date_parser::PLAUSIBLE_YEARS;

static YEAR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}").expect("year regex should parse"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// First run of four ASCII digits in a file name that reads as a plausible year.
/// `acidentes_2022.csv` → `Some(2022)`, `acidentes.csv` → `None`.
pub fn extract_year_from_name(name: &str) -> Option<i32> {
    for m in YEAR_RUN.find_iter(name) {
        let Ok(year) = m.as_str().parse::<i32>() else {
            continue;
        };
        if PLAUSIBLE_YEARS.contains(&year) {
            return Some(year);
        }
        warn!(name, year, "ignoring implausible year in file name");
    }
    None
}

/// Parse a locale-formatted decimal: `"12,345"` and `"12.345"` both give 12.345.
/// Non-finite values count as unparseable.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw).replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
