use tracing::debug;

use crate::dataset::{CleanedDataset, Histogram, MonthlyMean, Selection};
use crate::error::{CleanError, CleanResult};
use crate::record::Column;

pub const DEFAULT_COLUMNS: [Column; 8] = [
    Column::Equip,
    Column::EquipType,
    Column::Dept,
    Column::Area,
    Column::Shifts,
    Column::Scheduled,
    Column::Reason,
    Column::Min,
];

pub const HISTOGRAM_BINS: usize = 25;

/// Columns that are already filters or the measure, so grouping by them
/// says nothing new.
const NOT_GROUPABLE: [Column; 3] = [Column::Scheduled, Column::Min, Column::Dept];

/// Viewer choices. Every `None` falls back to the first available value,
/// the way a fresh select box would.
#[derive(Debug, Clone, Default)]
pub struct ExploreOptions {
    pub year: Option<i32>,
    pub dept: Option<String>,
    pub scheduled: Option<String>,
    pub columns: Vec<Column>,
    pub group_by: Option<Column>,
    /// Exclusive `(low, high)` bounds on minutes for the histogram.
    pub minutes: Option<(f64, f64)>,
}

#[derive(Debug)]
pub struct ExploreSummary<'a> {
    pub total: usize,
    pub monthly: Vec<MonthlyMean>,
    pub year: i32,
    pub dept: Option<String>,
    pub scheduled: Option<String>,
    pub columns: Vec<Column>,
    pub rows: Selection<'a>,
    pub group_by: Option<Column>,
    pub totals: Vec<(String, f64)>,
    pub minutes: (f64, f64),
    pub histogram: Histogram,
}

pub fn explore<'a>(
    dataset: &'a CleanedDataset,
    options: &ExploreOptions,
) -> CleanResult<ExploreSummary<'a>> {
    let (min_year, _) = dataset.year_range().ok_or(CleanError::NoDates)?;
    let year = options.year.unwrap_or(min_year);
    dataset.check_year(year)?;

    let columns = if options.columns.is_empty() {
        DEFAULT_COLUMNS.to_vec()
    } else {
        options.columns.clone()
    };

    let mut rows = dataset.selection().in_year(year);

    let dept = options
        .dept
        .clone()
        .or_else(|| rows.distinct(Column::Dept).into_iter().next());
    if let Some(dept) = &dept {
        rows = rows.where_eq(Column::Dept, dept);
    }

    let scheduled = options
        .scheduled
        .clone()
        .or_else(|| rows.distinct(Column::Scheduled).into_iter().next());
    if let Some(scheduled) = &scheduled {
        rows = rows.where_eq(Column::Scheduled, scheduled);
    }
    debug!(year, ?dept, ?scheduled, rows = rows.len(), "applied filters");

    let group_by = match options.group_by {
        Some(column) if NOT_GROUPABLE.contains(&column) => {
            return Err(CleanError::NotGroupable(column));
        }
        Some(column) if !columns.contains(&column) => {
            return Err(CleanError::GroupNotShown(column));
        }
        Some(column) => Some(column),
        None => columns
            .iter()
            .copied()
            .find(|c| !NOT_GROUPABLE.contains(c)),
    };
    let totals = group_by
        .map(|column| rows.group_totals(column))
        .unwrap_or_default();

    let minutes = options
        .minutes
        .unwrap_or_else(|| (0.0, rows.max_minutes().unwrap_or(0.0) + 1.0));
    let histogram = rows
        .clone()
        .minutes_between(minutes.0, minutes.1)
        .histogram(HISTOGRAM_BINS);

    Ok(ExploreSummary {
        total: dataset.len(),
        monthly: dataset.monthly_mean(),
        year,
        dept,
        scheduled,
        columns,
        rows,
        group_by,
        totals,
        minutes,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::parse_date;
    use crate::record::CleanedRecord;

    fn row(date: &str, equip: &str, dept: &str, scheduled: &str, minutes: f64) -> CleanedRecord {
        CleanedRecord {
            date_key: parse_date(date),
            date: Some(date.to_string()),
            equipment_id: Some(equip.to_string()),
            department: Some(dept.to_string()),
            scheduled: Some(scheduled.to_string()),
            minutes: Some(minutes),
            ..Default::default()
        }
    }

    fn sample() -> CleanedDataset {
        CleanedDataset::new(vec![
            row("2020-06-01", "press01", "paint", "1", 5.0),
            row("2021-01-05", "press01", "assembly", "1", 30.0),
            row("2021-01-01", "lathe02", "assembly", "1", 10.0),
            row("2021-02-11", "press01", "assembly", "2", 90.0),
            row("2021-03-12", "lathe02", "paint", "1", 50.0),
        ])
    }

    #[test]
    fn defaults_pick_first_values() {
        let data = sample();
        let summary = explore(&data, &ExploreOptions::default()).unwrap();
        assert_eq!(summary.year, 2020);
        assert_eq!(summary.dept.as_deref(), Some("paint"));
        assert_eq!(summary.rows.len(), 1);
        assert_eq!(summary.columns, DEFAULT_COLUMNS.to_vec());
        assert_eq!(summary.group_by, Some(Column::Equip));
        assert_eq!(summary.total, 5);
    }

    #[test]
    fn explicit_filters_narrow_rows() {
        let data = sample();
        let options = ExploreOptions {
            year: Some(2021),
            dept: Some("assembly".into()),
            scheduled: Some("1".into()),
            ..Default::default()
        };
        let summary = explore(&data, &options).unwrap();
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(
            summary.totals,
            vec![("lathe02".to_string(), 10.0), ("press01".to_string(), 30.0)]
        );
        assert_eq!(summary.minutes, (0.0, 31.0));
        assert_eq!(summary.histogram.counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn minutes_range_trims_histogram_only() {
        let data = sample();
        let options = ExploreOptions {
            year: Some(2021),
            dept: Some("assembly".into()),
            scheduled: Some("1".into()),
            minutes: Some((10.0, 40.0)),
            ..Default::default()
        };
        let summary = explore(&data, &options).unwrap();
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.histogram.counts.iter().sum::<usize>(), 1);
    }

    #[test]
    fn year_outside_data_is_rejected() {
        let data = sample();
        let options = ExploreOptions {
            year: Some(1999),
            ..Default::default()
        };
        assert!(matches!(
            explore(&data, &options),
            Err(CleanError::YearOutOfRange { min: 2020, max: 2021, .. })
        ));
    }

    #[test]
    fn filter_columns_cannot_group() {
        let data = sample();
        let options = ExploreOptions {
            group_by: Some(Column::Min),
            ..Default::default()
        };
        assert!(matches!(
            explore(&data, &options),
            Err(CleanError::NotGroupable(Column::Min))
        ));
    }

    #[test]
    fn group_column_must_be_shown() {
        let data = sample();
        let options = ExploreOptions {
            columns: vec![Column::Equip, Column::Min],
            group_by: Some(Column::Area),
            ..Default::default()
        };
        assert!(matches!(
            explore(&data, &options),
            Err(CleanError::GroupNotShown(Column::Area))
        ));

        let options = ExploreOptions {
            columns: vec![Column::Equip, Column::Min],
            group_by: Some(Column::Equip),
            ..Default::default()
        };
        assert_eq!(explore(&data, &options).unwrap().group_by, Some(Column::Equip));
    }

    #[test]
    fn undated_dataset_has_nothing_to_explore() {
        let data = CleanedDataset::new(vec![CleanedRecord::default()]);
        assert!(matches!(
            explore(&data, &ExploreOptions::default()),
            Err(CleanError::NoDates)
        ));
    }
}
