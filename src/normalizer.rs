use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::dataset::CleanedDataset;
use crate::error::{CleanError, CleanResult};
use crate::record::{CleanedRecord, Column, RawRecord};

/// Tokens that mean "no value" in any column. Matched exactly, before any rewrite.
pub const MISSING_VALUES: [&str; 4] = ["xx", "nan", "0", "???"];

pub const SHIFT_SYNONYMS: [(&str, &str); 6] = [
    ("evening", "eve"),
    ("evenings", "eve"),
    ("wkend", "wknd"),
    ("weekend", "wknd"),
    ("days", "day"),
    ("o/t", "overtime"),
];

pub const CANONICAL_SHIFTS: [&str; 4] = ["eve", "wknd", "day", "overtime"];

static EQUIP_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\s_"'\-]"#).unwrap());
static AREA_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\s|_"']"#).unwrap());
static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());

/// Month-first, like the rest of the log; two-digit years come last.
const DATE_LAYOUTS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m.%d.%Y",
    "%d-%b-%Y",
    "%m/%d/%y",
    "%d-%b-%y",
];
const TIME_SUFFIXES: [&str; 4] = [" %H:%M:%S%.f", " %H:%M", "T%H:%M:%S%.f", "T%H:%M"];
/// `%Y` accepts any number of digits; a shorter year token is a `%y` date.
const MIN_YEAR: i32 = 1000;

/// Counters for values the normalizer turned into the missing marker.
/// Sentinel substitutions are counted by the loader, at parse time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows: usize,
    pub unrecognized_shifts: usize,
    pub unparseable_minutes: usize,
    pub missing_dates: usize,
    /// Fields whose rewrite left nothing usable (empty, or a sentinel token).
    pub emptied_fields: usize,
}

#[derive(Debug)]
pub struct NormalizeOutcome {
    pub dataset: CleanedDataset,
    pub report: NormalizeReport,
}

/// Parse-time substitution: sentinels and empty cells become missing.
pub fn apply_sentinels(value: &str) -> Option<String> {
    if value.is_empty() || MISSING_VALUES.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn normalize(raw: Vec<RawRecord>) -> CleanResult<NormalizeOutcome> {
    let mut report = NormalizeReport {
        rows: raw.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for (i, mut row) in raw.into_iter().enumerate() {
        let date_key = match row.get(Column::Date) {
            Some(text) => Some(parse_date(text).ok_or_else(|| CleanError::UnparseableDate {
                row: i + 1,
                value: text.to_string(),
            })?),
            None => {
                report.missing_dates += 1;
                None
            }
        };

        let mut rewrite = |column: Column, f: fn(&str) -> String| {
            let cleaned = row.take(column).map(|v| f(&v))?;
            let settled = apply_sentinels(&cleaned);
            if settled.is_none() {
                report.emptied_fields += 1;
            }
            settled
        };

        let equipment_id = rewrite(Column::Equip, clean_equipment_id);
        let equipment_type = rewrite(Column::EquipType, hyphenate);
        let department = rewrite(Column::Dept, clean_department);
        let area = rewrite(Column::Area, clean_area);
        let reason_code = rewrite(Column::Reason, strip_spaces);
        let production_family = rewrite(Column::ProdFam, hyphenate);
        let production_type = rewrite(Column::ProdType, hyphenate);

        let shift = row.take(Column::Shifts).and_then(|v| {
            let mapped = canonical_shift(&v);
            if mapped.is_none() {
                debug!(row = i + 1, value = %v, "shift outside canonical set");
                report.unrecognized_shifts += 1;
            }
            mapped
        });

        let minutes = row.take(Column::Min).and_then(|v| {
            let parsed = parse_minutes(&v);
            if let Err(()) = parsed {
                warn!(row = i + 1, value = %v, "downtime minutes not numeric");
                report.unparseable_minutes += 1;
            }
            parsed.ok().flatten()
        });

        records.push(CleanedRecord {
            date_key,
            equipment_id,
            equipment_type,
            department,
            area,
            date: row.take(Column::Date),
            shift,
            reason_code,
            minutes,
            production_fix: row.take(Column::ProdFix),
            engineering_fix: row.take(Column::EnginFix),
            scheduled: row.take(Column::Scheduled),
            production_family,
            production_type,
            comment: row.take(Column::Comment),
            downtime_type: row.take(Column::DowntimeType),
        });
    }

    Ok(NormalizeOutcome {
        dataset: CleanedDataset::new(records),
        report,
    })
}

pub fn clean_equipment_id(value: &str) -> String {
    EQUIP_STRIP.replace_all(value, "").to_lowercase()
}

pub fn hyphenate(value: &str) -> String {
    SEPARATOR_RUN.replace_all(value, "-").to_lowercase()
}

pub fn clean_department(value: &str) -> String {
    strip_spaces(value).to_lowercase()
}

pub fn clean_area(value: &str) -> String {
    AREA_STRIP.replace_all(value, "").to_lowercase()
}

pub fn strip_spaces(value: &str) -> String {
    value.replace(' ', "")
}

/// Lowercase, drop spaces, then map synonyms. `None` when the result is not
/// one of [`CANONICAL_SHIFTS`].
pub fn canonical_shift(value: &str) -> Option<String> {
    let key = strip_spaces(&value.to_lowercase());
    let mapped = SHIFT_SYNONYMS
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key.as_str(), |(_, to)| *to);
    CANONICAL_SHIFTS
        .contains(&mapped)
        .then(|| mapped.to_string())
}

/// `Ok(None)` for a zero reading (the numeric form of the `0` sentinel),
/// `Err(())` when the text is not a finite number.
fn parse_minutes(value: &str) -> Result<Option<f64>, ()> {
    match value.trim().parse::<f64>() {
        Ok(m) if m.is_finite() => Ok((m != 0.0).then_some(m)),
        _ => Err(()),
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let plausible = |ts: &NaiveDateTime| ts.year() >= MIN_YEAR;
    for layout in DATE_LAYOUTS {
        let date_only = NaiveDate::parse_from_str(value, layout)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0));
        if let Some(ts) = date_only.filter(plausible) {
            return Some(ts);
        }
        for suffix in TIME_SUFFIXES {
            let full = format!("{layout}{suffix}");
            if let Some(ts) = NaiveDateTime::parse_from_str(value, &full).ok().filter(plausible) {
                return Some(ts);
            }
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_local())
        .filter(plausible)
}
