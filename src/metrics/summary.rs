use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use tracing::debug;
use utoipa::ToSchema;

use super::{
    catalog::SensorCatalog,
    model::{
        readings_for, FieldSpec, ModeKey, PeakBranch, Period, ReadingsByMode, SensorFamily,
        SensorReading, SensorSeriesRequest,
    },
    window::{self, PeriodWindow},
};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A scalar statistic, or the literal `"N/A"` when it cannot be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    NotAvailable,
}

impl Metric {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::NotAvailable => None,
        }
    }
}

impl From<Option<f64>> for Metric {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Metric::NotAvailable, Metric::Value)
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64(*v),
            Metric::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

/// Value of one field in a summary block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Single(Metric),
    /// Pic-average: the two upstream peaks, plus their mean when provided.
    DayNight {
        day: Metric,
        night: Metric,
        #[serde(skip_serializing_if = "Option::is_none")]
        average: Option<Metric>,
    },
}

impl SummaryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SummaryValue::Single(m) => m.as_f64(),
            SummaryValue::DayNight { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SummaryEntry {
    pub field: String,
    pub label: String,
    pub unit: String,
    /// Number, `"N/A"`, or `{day, night, average?}` for pic-average.
    #[schema(value_type = Object)]
    pub value: SummaryValue,
}

/// "Current state" shown beside one sensor's chart.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SummaryBlock {
    pub family: SensorFamily,
    pub mode: ModeKey,
    /// Sensor name, e.g. `Ext` or `Soil 2`.
    pub title: String,
    /// Statistic name, e.g. `Latest` or `Week average`.
    pub label: String,
    pub values: Vec<SummaryEntry>,
}

impl SummaryBlock {
    pub fn value(&self, field: &str) -> Option<&SummaryValue> {
        self.values.iter().find(|e| e.field == field).map(|e| &e.value)
    }
}

fn statistic_label(period: Period) -> &'static str {
    match period {
        Period::FullDay => "Latest",
        Period::DayAverage => "Day average",
        Period::Week => "Week average",
        Period::Month => "Month average",
        Period::PicAverage => "Day / night peak",
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// One block per selected mode of the request's family.
pub fn summarize(
    catalog: &SensorCatalog,
    request: &SensorSeriesRequest,
    readings: &ReadingsByMode,
    today: NaiveDate,
) -> Vec<SummaryBlock> {
    let window = window::resolve(request.period, request.offset, today);
    let fields = catalog.fields(request.family);

    request
        .mode
        .modes_for(request.family)
        .into_iter()
        .map(|mode| {
            let data = readings_for(readings, mode);
            debug!(
                family = %request.family,
                mode = %mode,
                period = %request.period,
                records = data.len(),
                "Summarising readings"
            );
            SummaryBlock {
                family: request.family,
                mode,
                title: mode.label().to_owned(),
                label: statistic_label(request.period).to_owned(),
                values: fields
                    .iter()
                    .map(|field| SummaryEntry {
                        field: field.key.to_owned(),
                        label: field.display_label(mode),
                        unit: field.unit.to_owned(),
                        value: summarize_field(&window, field, data),
                    })
                    .collect(),
            }
        })
        .collect()
}

fn summarize_field(window: &PeriodWindow, field: &FieldSpec, data: &[SensorReading]) -> SummaryValue {
    match window.period {
        Period::FullDay => SummaryValue::Single(data.last().and_then(|r| r.raw(field)).into()),
        Period::DayAverage | Period::Week => {
            SummaryValue::Single(mean_rounded(data.iter().filter_map(|r| r.aggregate(field))).into())
        }
        Period::Month => SummaryValue::Single(
            mean_rounded(
                data.iter()
                    .filter(|r| window.contains_reading(r))
                    .filter_map(|r| r.aggregate(field)),
            )
            .into(),
        ),
        Period::PicAverage => {
            let record = data.first();
            let peak = |branch| record.and_then(|r| r.peak(field, branch));
            SummaryValue::DayNight {
                day: peak(PeakBranch::Day).into(),
                night: peak(PeakBranch::Night).into(),
                average: peak(PeakBranch::Average).map(Metric::Value),
            }
        }
    }
}

/// Arithmetic mean rounded half away from zero to two decimals; `None` for
/// an empty input or a sum that overflows.
pub fn mean_rounded(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0 && sum.is_finite()).then(|| round2(sum / count as f64))
}

pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}
