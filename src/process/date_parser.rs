use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Date-time layouts seen across the yearly exports, day-first before ISO.
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%y"];

/// Anything outside this window is a mis-parse (e.g. a two-digit year read as %Y).
pub(crate) const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

/// Parse a day-first date or date-time. Date-only values land on midnight.
pub fn parse_day_first(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let plausible = |dt: &NaiveDateTime| PLAUSIBLE_YEARS.contains(&dt.year());

    DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .find(plausible)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .filter_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .filter_map(|d| d.and_hms_opt(0, 0, 0))
                .find(plausible)
        })
}

/// Midnight on January 1 of `year`, or `None` outside the plausible year range.
pub fn start_of_year(year: i32) -> Option<NaiveDateTime> {
    if !PLAUSIBLE_YEARS.contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, sec)
            .unwrap()
    }

    #[test]
    fn day_first_beats_month_first() {
        assert_eq!(parse_day_first("05/01/2024 14:30:00"), Some(dt(2024, 1, 5, 14, 30, 0)));
        assert_eq!(parse_day_first("05/01/2024 14:30"), Some(dt(2024, 1, 5, 14, 30, 0)));
        assert_eq!(parse_day_first("31-12-2023"), Some(dt(2023, 12, 31, 0, 0, 0)));
    }

    #[test]
    fn iso_layouts() {
        assert_eq!(parse_day_first("2024-03-09 08:15:00"), Some(dt(2024, 3, 9, 8, 15, 0)));
        assert_eq!(parse_day_first("2024-03-09T08:15:00"), Some(dt(2024, 3, 9, 8, 15, 0)));
        assert_eq!(parse_day_first("2024-03-09"), Some(dt(2024, 3, 9, 0, 0, 0)));
    }

    #[test]
    fn two_digit_year() {
        assert_eq!(parse_day_first("05/01/24"), Some(dt(2024, 1, 5, 0, 0, 0)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_day_first(""), None);
        assert_eq!(parse_day_first("not a date"), None);
        assert_eq!(parse_day_first("32/01/2024"), None);
        assert_eq!(parse_day_first("SEM INFORMAÇÃO 10:00"), None);
    }

    #[test]
    fn year_start() {
        assert_eq!(start_of_year(2022), Some(dt(2022, 1, 1, 0, 0, 0)));
        assert_eq!(start_of_year(7), None);
    }
}
