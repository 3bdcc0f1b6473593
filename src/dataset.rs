use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDateTime};

use crate::error::{CleanError, CleanResult};
use crate::record::{CleanedRecord, Column};

/// The cleaned record set. Built once per run by the normalizer and handed
/// to the exporter and the viewer as a plain value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedDataset {
    records: Vec<CleanedRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyMean {
    pub year: i32,
    pub month: u32,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub low: f64,
    pub high: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.counts.len().max(1) as f64
    }
}

impl CleanedDataset {
    pub fn new(records: Vec<CleanedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CleanedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn selection(&self) -> Selection<'_> {
        Selection {
            rows: self.records.iter().collect(),
        }
    }

    /// Min and max year over rows that carry a date.
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let mut years = self.dates().map(|d| d.year());
        let first = years.next()?;
        Some(years.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y))))
    }

    /// Rejects a year the data does not cover.
    pub fn check_year(&self, year: i32) -> CleanResult<()> {
        match self.year_range() {
            Some((min, max)) if (min..=max).contains(&year) => Ok(()),
            Some((min, max)) => Err(CleanError::YearOutOfRange { year, min, max }),
            None => Err(CleanError::NoDates),
        }
    }

    pub fn distinct(&self, column: Column) -> Vec<String> {
        self.selection().distinct(column)
    }

    /// True when every date key falls on midnight, so the index can be
    /// written without a time part.
    pub fn dates_are_whole_days(&self) -> bool {
        self.dates().all(|d| d.time() == chrono::NaiveTime::MIN)
    }

    /// Mean downtime per calendar month, covering every month between the
    /// first and last dated row. Months with no readings carry `None`.
    pub fn monthly_mean(&self) -> Vec<MonthlyMean> {
        let mut buckets: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            let Some(date) = record.date_key else { continue };
            let bucket = buckets.entry((date.year(), date.month())).or_default();
            if let Some(minutes) = record.minutes {
                bucket.0 += minutes;
                bucket.1 += 1;
            }
        }

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let (mut year, mut month) = first;
        while (year, month) <= last {
            let mean = buckets
                .get(&(year, month))
                .filter(|(_, n)| *n > 0)
                .map(|(sum, n)| sum / *n as f64);
            out.push(MonthlyMean { year, month, mean });
            (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        }
        out
    }

    fn dates(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.records.iter().filter_map(|r| r.date_key.as_ref())
    }
}

/// A filtered, borrowed view over a dataset. Filters narrow it in place and
/// keep the original row order.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    rows: Vec<&'a CleanedRecord>,
}

impl<'a> Selection<'a> {
    pub fn rows(&self) -> &[&'a CleanedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn in_year(mut self, year: i32) -> Self {
        self.rows
            .retain(|r| r.date_key.is_some_and(|d| d.year() == year));
        self
    }

    pub fn where_eq(mut self, column: Column, value: &str) -> Self {
        self.rows
            .retain(|r| r.value(column).as_deref() == Some(value));
        self
    }

    /// Keeps rows with `low < minutes < high`.
    pub fn minutes_between(mut self, low: f64, high: f64) -> Self {
        self.rows
            .retain(|r| r.minutes.is_some_and(|m| m > low && m < high));
        self
    }

    /// Present values in order of first appearance.
    pub fn distinct(&self, column: Column) -> Vec<String> {
        let mut seen = Vec::new();
        for value in self.rows.iter().filter_map(|r| r.value(column)) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    pub fn max_minutes(&self) -> Option<f64> {
        self.rows
            .iter()
            .filter_map(|r| r.minutes)
            .reduce(f64::max)
    }

    /// Total downtime per value of `column`, smallest first. Rows missing the
    /// grouping value are left out.
    pub fn group_totals(&self, column: Column) -> Vec<(String, f64)> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        for record in &self.rows {
            if let Some(key) = record.value(column) {
                *totals.entry(key).or_default() += record.minutes.unwrap_or(0.0);
            }
        }
        let mut totals: Vec<_> = totals.into_iter().collect();
        totals.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        totals
    }

    /// Equal-width histogram of minutes spanning the observed min..max.
    pub fn histogram(&self, bins: usize) -> Histogram {
        let values: Vec<f64> = self.rows.iter().filter_map(|r| r.minutes).collect();
        let bins = bins.max(1);
        let Some(min) = values.iter().copied().reduce(f64::min) else {
            return Histogram {
                low: 0.0,
                high: 0.0,
                counts: Vec::new(),
            };
        };
        let max = values.iter().copied().fold(min, f64::max);
        let (low, high) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };

        let width = (high - low) / bins as f64;
        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v - low) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Histogram { low, high, counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::parse_date;

    fn row(date: &str, dept: &str, scheduled: &str, minutes: Option<f64>) -> CleanedRecord {
        CleanedRecord {
            date_key: parse_date(date),
            date: Some(date.to_string()),
            department: Some(dept.to_string()),
            scheduled: Some(scheduled.to_string()),
            minutes,
            ..Default::default()
        }
    }

    fn sample() -> CleanedDataset {
        CleanedDataset::new(vec![
            row("2021-01-05", "assembly", "1", Some(30.0)),
            row("2021-01-01", "paint", "2", Some(10.0)),
            row("2021-03-12", "assembly", "2", Some(50.0)),
            row("2022-02-02", "assembly", "1", None),
        ])
    }

    #[test]
    fn year_filter_uses_the_date_key() {
        let data = CleanedDataset::new(vec![
            row("2021-01-05", "a", "1", None),
            row("2021-01-01", "a", "1", None),
        ]);
        assert_eq!(data.selection().in_year(2021).len(), 2);
        assert!(data.selection().in_year(2020).is_empty());
    }

    #[test]
    fn year_range_and_check() {
        let data = sample();
        assert_eq!(data.year_range(), Some((2021, 2022)));
        assert!(data.check_year(2022).is_ok());
        assert!(matches!(
            data.check_year(2019),
            Err(CleanError::YearOutOfRange { min: 2021, max: 2022, .. })
        ));
        assert!(CleanedDataset::default().check_year(2021).is_err());
    }

    #[test]
    fn distinct_keeps_first_appearance_order() {
        assert_eq!(sample().distinct(Column::Dept), vec!["assembly", "paint"]);
        assert!(sample().distinct(Column::Shifts).is_empty());
    }

    #[test]
    fn filters_chain() {
        let data = sample();
        let view = data
            .selection()
            .in_year(2021)
            .where_eq(Column::Dept, "assembly")
            .where_eq(Column::Scheduled, "2");
        assert_eq!(view.len(), 1);
        assert_eq!(view.rows()[0].minutes, Some(50.0));
    }

    #[test]
    fn minutes_bounds_are_exclusive() {
        let data = sample();
        let view = data.selection().minutes_between(10.0, 50.0);
        assert_eq!(view.len(), 1);
        assert_eq!(data.selection().max_minutes(), Some(50.0));
    }

    #[test]
    fn monthly_mean_fills_gaps() {
        let means = sample().monthly_mean();
        assert_eq!(means.len(), 14);
        assert_eq!(means[0], MonthlyMean { year: 2021, month: 1, mean: Some(20.0) });
        assert_eq!(means[1].mean, None);
        assert_eq!(means[2].mean, Some(50.0));
        assert_eq!((means[13].year, means[13].month, means[13].mean), (2022, 2, None));
    }

    #[test]
    fn group_totals_sorted_ascending() {
        let totals = sample().selection().group_totals(Column::Dept);
        assert_eq!(
            totals,
            vec![("paint".to_string(), 10.0), ("assembly".to_string(), 80.0)]
        );
    }

    #[test]
    fn histogram_spans_observed_values() {
        let data = sample();
        let hist = data.selection().histogram(4);
        assert_eq!((hist.low, hist.high), (10.0, 50.0));
        assert_eq!(hist.counts, vec![1, 0, 1, 1]);
        assert_eq!(hist.bin_width(), 10.0);

        let single = CleanedDataset::new(vec![row("2021-01-01", "a", "1", Some(5.0))]);
        let hist = single.selection().histogram(25);
        assert_eq!(hist.counts.iter().sum::<usize>(), 1);
        assert_eq!((hist.low, hist.high), (4.5, 5.5));
    }

    #[test]
    fn whole_day_detection() {
        assert!(sample().dates_are_whole_days());
        let timed = CleanedDataset::new(vec![row("2021-01-01 08:30", "a", "1", None)]);
        assert!(!timed.dates_are_whole_days());
    }
}
