use std::fmt::Write as _;

use crate::dataset::{Histogram, MonthlyMean};
use crate::explore::ExploreSummary;
use crate::record::Column;

const BAR_WIDTH: usize = 40;
const MISSING: &str = "-";

pub fn render(summary: &ExploreSummary<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Downtime machine analysis");
    let _ = writeln!(out, "Total number of entries: {}\n", summary.total);

    let _ = writeln!(out, "Average monthly downtime, min");
    out.push_str(&render_monthly(&summary.monthly));

    let _ = writeln!(
        out,
        "\nYear {} | dept {} | scheduled {}",
        summary.year,
        summary.dept.as_deref().unwrap_or(MISSING),
        summary.scheduled.as_deref().unwrap_or(MISSING),
    );
    let rows: Vec<Vec<String>> = summary
        .rows
        .rows()
        .iter()
        .map(|r| {
            summary
                .columns
                .iter()
                .map(|c| r.value(*c).unwrap_or_else(|| MISSING.to_string()))
                .collect()
        })
        .collect();
    if summary.rows.is_empty() {
        let _ = writeln!(out, "(no rows match)");
    } else {
        out.push_str(&render_table(&summary.columns, &rows));
    }
    let _ = writeln!(out, "Number of rows: {}", rows.len());

    if let Some(column) = summary.group_by {
        let _ = writeln!(out, "\nCumulative downtime for column: {column}");
        out.push_str(&render_bars(&summary.totals));
        let _ = writeln!(out, "Number of {column}s: {}", summary.totals.len());
    }

    let (low, high) = summary.minutes;
    let _ = writeln!(out, "\nDistribution of downtime, min ({low} < min < {high})");
    out.push_str(&render_histogram(&summary.histogram));
    out
}

pub fn render_monthly(means: &[MonthlyMean]) -> String {
    let bars: Vec<(String, f64)> = means
        .iter()
        .map(|m| (format!("{}-{:02}", m.year, m.month), m.mean.unwrap_or(0.0)))
        .collect();
    render_bars(&bars)
}

/// Left-aligned text table; each column as wide as its widest cell.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.name().len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<&str> = columns.iter().map(|c| c.name()).collect();
    push_row(&mut out, &widths, header.iter().copied());
    for row in rows {
        push_row(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

fn push_row<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Horizontal bars scaled to the largest value.
pub fn render_bars(bars: &[(String, f64)]) -> String {
    let label_width = bars.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let peak = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);

    let mut out = String::new();
    for (label, value) in bars {
        let len = if peak > 0.0 {
            ((value / peak) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "{label:<label_width$} | {:<BAR_WIDTH$} {value:.1}",
            "#".repeat(len)
        );
    }
    out
}

pub fn render_histogram(histogram: &Histogram) -> String {
    if histogram.counts.is_empty() {
        return "(no readings in range)\n".to_string();
    }
    let width = histogram.bin_width();
    let bars: Vec<(String, f64)> = histogram
        .counts
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let start = histogram.low + width * i as f64;
            (format!("{start:>8.1}-{:<8.1}", start + width), *count as f64)
        })
        .collect();
    render_bars(&bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_scale_to_peak() {
        let text = render_bars(&[("a".into(), 10.0), ("bb".into(), 20.0)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a  | "));
        assert_eq!(lines[0].matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(lines[1].matches('#').count(), BAR_WIDTH);
        assert!(lines[1].ends_with("20.0"));
    }

    #[test]
    fn table_pads_to_widest_cell() {
        let text = render_table(
            &[Column::Equip, Column::Min],
            &[vec!["press01".into(), "45".into()]],
        );
        assert_eq!(text, "equip    min\npress01  45\n");
    }

    #[test]
    fn monthly_labels() {
        let text = render_monthly(&[MonthlyMean {
            year: 2021,
            month: 3,
            mean: None,
        }]);
        assert!(text.starts_with("2021-03 | "));
        assert!(text.trim_end().ends_with("0.0"));
    }

    #[test]
    fn empty_histogram_says_so() {
        let hist = Histogram {
            low: 0.0,
            high: 0.0,
            counts: Vec::new(),
        };
        assert_eq!(render_histogram(&hist), "(no readings in range)\n");
    }
}
