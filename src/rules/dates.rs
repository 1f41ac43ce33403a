//! Date formatting for ReCollect's `display;earliest;latest` date fields

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").expect("valid year pattern"));
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d{4})-(\d{1,2})|(\d{1,2})/(\d{4}))$").expect("valid year-month pattern")
});
static ISO_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid iso date pattern"));
static DMY_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("valid dmy date pattern"));

/// Which end of a date range a boundary value describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Earliest,
    Latest,
}

/// Normalise a boundary to `DD/MM/YYYY`.
///
/// Year and year-month values resolve to the first day of the period for
/// the earliest boundary and the last day for the latest boundary. Values in
/// an unrecognised shape are passed through unchanged.
pub fn normalise_boundary(value: &str, boundary: Boundary) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }

    if let Some(c) = YEAR.captures(value) {
        let year = &c[1];
        return match boundary {
            Boundary::Earliest => format!("01/01/{}", year),
            Boundary::Latest => format!("31/12/{}", year),
        };
    }

    if let Some(c) = YEAR_MONTH.captures(value) {
        let (year, month) = match (c.get(1), c.get(2)) {
            (Some(y), Some(m)) => (y.as_str(), m.as_str()),
            _ => (&c[4], &c[3]),
        };
        if let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>()) {
            let day = match boundary {
                Boundary::Earliest => Some(1),
                Boundary::Latest => last_day_of_month(year, month),
            };
            if let Some(date) = day.and_then(|d| NaiveDate::from_ymd_opt(year, month, d)) {
                return dmy(date);
            }
        }
    }

    let parts = ISO_DAY
        .captures(value)
        .map(|c| (c[1].to_string(), c[2].to_string(), c[3].to_string()))
        .or_else(|| {
            DMY_DAY
                .captures(value)
                .map(|c| (c[3].to_string(), c[2].to_string(), c[1].to_string()))
        });
    if let Some((year, month, day)) = parts {
        if let (Ok(y), Ok(m), Ok(d)) = (year.parse(), month.parse(), day.parse()) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return dmy(date);
            }
        }
    }

    tracing::debug!("Unrecognised date boundary {:?} passed through", value);
    value.to_string()
}

/// Build `display;earliest;latest`. Returns `None` when all three inputs
/// are empty so the field can be omitted.
pub fn format_date(display: Option<&str>, earliest: Option<&str>, latest: Option<&str>) -> Option<String> {
    let display = display.unwrap_or("").trim();
    let earliest = normalise_boundary(earliest.unwrap_or(""), Boundary::Earliest);
    let latest = normalise_boundary(latest.unwrap_or(""), Boundary::Latest);
    if display.is_empty() && earliest.is_empty() && latest.is_empty() {
        return None;
    }
    Some(format!("{};{};{}", display, earliest, latest))
}

/// Last calendar day of a month, leap years included
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    next.pred_opt().map(|d| d.day())
}

fn dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
