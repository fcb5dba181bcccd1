//! Percentile lookups and the text report.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::projection::is_out_of_range;

pub const DATE_FORMAT: &str = "%Y.%m.%d %H:%M";
pub const DEFAULT_DISPLAY_WIDTH: usize = 80;
pub const DEFAULT_PERCENTILES: [f64; 2] = [0.70, 0.95];
pub const HISTOGRAM_ROWS: usize = 29;

const HISTOGRAM_DIVISIONS: i128 = HISTOGRAM_ROWS as i128 + 1;
const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarGlyphs {
    pub fill: char,
    pub empty: char,
}

impl Default for BarGlyphs {
    fn default() -> Self {
        Self {
            fill: '#',
            empty: '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileDate {
    pub probability: f64,
    pub index: usize,
    pub date: NaiveDateTime,
    /// The projection overflowed and `date` is only a clamp.
    pub out_of_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramRow {
    pub date: NaiveDateTime,
    pub probability: f64,
}

/// Smallest index `i` of a sorted run of `len` values with `(i + 1) / len >= p`.
///
/// Binary search over a predicate that is monotone in `i`. `None` when the run
/// is empty or no index qualifies (`p > 1`).
pub fn percentile_index(len: usize, p: f64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let meets = |i: usize| (i + 1) as f64 / len as f64 >= p;
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if meets(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    (lo < len).then_some(lo)
}

/// Empirical cumulative probability of each position: `(i + 1) / len`.
pub fn cumulative_probabilities(len: usize) -> Vec<f64> {
    (0..len).map(|i| (i + 1) as f64 / len as f64).collect()
}

pub fn headline(dates: &[NaiveDateTime], thresholds: &[f64]) -> Vec<PercentileDate> {
    thresholds
        .iter()
        .filter_map(|&probability| {
            let index = percentile_index(dates.len(), probability)?;
            Some(PercentileDate {
                probability,
                index,
                date: dates[index],
                out_of_range: is_out_of_range(dates[index]),
            })
        })
        .collect()
}

/// Sample the cumulative distribution at 29 evenly spaced dates strictly
/// between the earliest and latest projection.
///
/// `dates` must be ascending. A forward-only cursor finds, for each sample
/// point, the first date at or after it; that position's probability is the
/// row's value.
pub fn histogram_rows(dates: &[NaiveDateTime], probs: &[f64]) -> Vec<HistogramRow> {
    let len = dates.len().min(probs.len());
    if len == 0 {
        return Vec::new();
    }
    let first = dates[0];
    let span_ms = (dates[len - 1] - first).num_milliseconds() as i128;

    let mut rows = Vec::with_capacity(HISTOGRAM_ROWS);
    let mut cursor = 0;
    for k in 1..HISTOGRAM_DIVISIONS {
        let offset = (span_ms * k / HISTOGRAM_DIVISIONS) as i64;
        let point = first + TimeDelta::milliseconds(offset);
        while cursor + 1 < len && dates[cursor] < point {
            cursor += 1;
        }
        rows.push(HistogramRow {
            date: point,
            probability: probs[cursor],
        });
    }
    rows
}

/// One line per row: the date label, a two space gap, then a bar filling the
/// rest of `display_width`.
pub fn render_histogram(
    rows: &[HistogramRow],
    display_width: usize,
    glyphs: BarGlyphs,
) -> Vec<String> {
    let labels: Vec<String> = rows.iter().map(|row| format_date(row.date)).collect();
    let label_width = labels
        .iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0);
    let bar_width = display_width.saturating_sub(label_width + COLUMN_GAP.len());
    let fill = glyphs.fill.to_string();
    let empty = glyphs.empty.to_string();

    rows.iter()
        .zip(labels)
        .map(|(row, label)| {
            let filled = ((row.probability * bar_width as f64).floor().max(0.0) as usize)
                .min(bar_width);
            format!(
                "{label:<label_width$}{COLUMN_GAP}{}{}",
                fill.repeat(filled),
                empty.repeat(bar_width - filled)
            )
        })
        .collect()
}

pub fn headline_lines(headline: &[PercentileDate]) -> Vec<String> {
    headline
        .iter()
        .map(|entry| {
            let percent = format_percent(entry.probability);
            if entry.out_of_range {
                format!("{percent}% probability of completion: beyond the supported date range")
            } else {
                format!(
                    "{percent}% probability of completion by {}",
                    format_date(entry.date)
                )
            }
        })
        .collect()
}

pub fn render_report(
    headline: &[PercentileDate],
    rows: &[HistogramRow],
    display_width: usize,
    glyphs: BarGlyphs,
) -> String {
    let mut lines = headline_lines(headline);
    lines.push(String::new());
    lines.extend(render_histogram(rows, display_width, glyphs));
    lines.join("\n") + "\n"
}

pub fn format_date(date: NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_percent(probability: f64) -> String {
    let percent = probability * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{:.0}", percent)
    } else {
        format!("{:.1}", percent)
    }
}
