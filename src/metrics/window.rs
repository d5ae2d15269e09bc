use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;
use tracing::warn;

use super::model::{GapPolicy, Period, SensorReading};

/// Fixed categories of the pic-average axis.
pub const DAY_NIGHT_CATEGORIES: [&str; 2] = ["Day", "Night"];

/// X-axis of a resolved window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Axis {
    /// Fixed category labels; series points align by index.
    Categories { categories: Vec<String> },
    /// Absolute time axis in epoch milliseconds. Bounds are absent when the
    /// axis follows the data (full day).
    Datetime {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
}

impl Axis {
    pub fn categories(&self) -> Option<&[String]> {
        match self {
            Axis::Categories { categories } => Some(categories),
            Axis::Datetime { .. } => None,
        }
    }
}

/// How a record is matched to a position on the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketRule {
    /// The record's own `datetime`.
    Timestamp,
    /// `hour` rendered as `HH:00`.
    Hour,
    /// First ten characters of `date`.
    Date,
    /// Day / night branch of a single aggregate record.
    Branch,
}

/// Concrete calendar window for a (period, offset) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodWindow {
    pub period: Period,
    /// Effective offset after clamping; always `<= 0` and `0` for periods
    /// that cannot be navigated.
    pub offset: i32,
    pub today: NaiveDate,
    pub axis: Axis,
    pub bucket: BucketRule,
    pub gap_policy: GapPolicy,
    /// Inclusive calendar range covered by week and month windows.
    pub range: Option<(NaiveDate, NaiveDate)>,
    /// Navigation header, e.g. `Week (4/3 - 10/3)`.
    pub label: String,
}

/// Resolve the window of `period` shifted by `offset` periods from `today`.
///
/// `today` is captured once by the caller so every boundary is derived from
/// the same instant. Positive offsets point into the future and are clamped
/// to `0`.
pub fn resolve(period: Period, offset: i32, today: NaiveDate) -> PeriodWindow {
    let offset = if !period.is_navigable() {
        0
    } else if offset > 0 {
        warn!(period = %period, offset, "future offset requested; clamping to current period");
        0
    } else {
        offset
    };

    let (axis, bucket, range, label) = match period {
        Period::FullDay => (
            Axis::Datetime { min: None, max: None },
            BucketRule::Timestamp,
            None,
            "Full day".to_owned(),
        ),
        Period::DayAverage => (
            Axis::Categories {
                categories: (0..24).map(hour_label).collect(),
            },
            BucketRule::Hour,
            None,
            "Day average".to_owned(),
        ),
        Period::Week => {
            let (monday, sunday) = week_bounds(today, offset);
            let categories = monday
                .iter_days()
                .take(7)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            let label = format!(
                "Week ({}/{} - {}/{})",
                monday.day(),
                monday.month(),
                sunday.day(),
                sunday.month()
            );
            (
                Axis::Categories { categories },
                BucketRule::Date,
                Some((monday, sunday)),
                label,
            )
        }
        Period::Month => {
            let (first, last) = month_bounds(today, offset);
            let label = format!("Month ({})", first.format("%B %Y"));
            (
                Axis::Datetime {
                    min: Some(start_millis(first)),
                    max: last.succ_opt().map(|next| start_millis(next) - 1),
                },
                BucketRule::Date,
                Some((first, last)),
                label,
            )
        }
        Period::PicAverage => (
            Axis::Categories {
                categories: DAY_NIGHT_CATEGORIES.iter().map(|c| (*c).to_owned()).collect(),
            },
            BucketRule::Branch,
            None,
            "Pic average (day/night)".to_owned(),
        ),
    };

    PeriodWindow {
        period,
        offset,
        today,
        axis,
        bucket,
        gap_policy: period.gap_policy(),
        range,
        label,
    }
}

impl PeriodWindow {
    /// Key placing `reading` on this window's axis, or `None` when the record
    /// lacks the identifying attribute.
    pub fn bucket_key(&self, reading: &SensorReading) -> Option<String> {
        match self.bucket {
            BucketRule::Timestamp => reading.datetime.clone(),
            BucketRule::Hour => reading.hour.filter(|h| *h < 24).map(hour_label),
            BucketRule::Date => reading.day_key().map(str::to_owned),
            BucketRule::Branch => None,
        }
    }

    /// Position of `key` among the fixed categories.
    pub fn category_index(&self, key: &str) -> Option<usize> {
        self.axis.categories()?.iter().position(|c| c == key)
    }

    /// Whether `date` lies in the week / month range. Windows without a
    /// calendar range accept every date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range
            .map_or(true, |(first, last)| first <= date && date <= last)
    }

    /// Whether the record's `date` falls inside the calendar range. Records
    /// without a parseable date are outside any ranged window.
    pub fn contains_reading(&self, reading: &SensorReading) -> bool {
        match (self.range, reading.day()) {
            (None, _) => true,
            (Some(_), Some(day)) => self.contains(day),
            (Some(_), None) => false,
        }
    }
}

pub fn hour_label(hour: u32) -> String {
    format!("{hour:02}:00")
}

/// Monday of the ISO week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
        .unwrap_or(date)
}

/// Monday and Sunday of the week `offset` weeks away from `today`'s week.
pub fn week_bounds(today: NaiveDate, offset: i32) -> (NaiveDate, NaiveDate) {
    let monday = monday_of(today);
    let shift = Days::new(u64::from(offset.unsigned_abs()) * 7);
    let monday = if offset < 0 {
        monday.checked_sub_days(shift)
    } else {
        monday.checked_add_days(shift)
    }
    .unwrap_or(monday);
    let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
    (monday, sunday)
}

/// First and last day of the month `offset` months away from `today`'s month.
pub fn month_bounds(today: NaiveDate, offset: i32) -> (NaiveDate, NaiveDate) {
    let months = i64::from(today.year()) * 12 + i64::from(today.month0()) + i64::from(offset);
    let first = i32::try_from(months.div_euclid(12))
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, months.rem_euclid(12) as u32 + 1, 1))
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first);
    (first, last)
}

fn start_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp_millis())
}
