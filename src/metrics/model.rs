use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::MetricsError;

// ---------------------------------------------------------------------------
// SensorFamily
// ---------------------------------------------------------------------------

/// The three sensor domains of the greenhouse.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamily {
    Light,
    Env,
    Soil,
}

impl SensorFamily {
    pub const ALL: [SensorFamily; 3] = [SensorFamily::Light, SensorFamily::Env, SensorFamily::Soil];

    /// Physical sensors of this family, in palette order.
    pub fn modes(self) -> &'static [ModeKey] {
        match self {
            SensorFamily::Light | SensorFamily::Env => &[ModeKey::Ext, ModeKey::Int],
            SensorFamily::Soil => &[
                ModeKey::Soil1,
                ModeKey::Soil2,
                ModeKey::Soil3,
                ModeKey::Soil4,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorFamily::Light => "light",
            SensorFamily::Env => "env",
            SensorFamily::Soil => "soil",
        }
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorFamily {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "env" => Ok(Self::Env),
            "soil" => Ok(Self::Soil),
            other => Err(MetricsError::UnknownFamily(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ModeKey / ModeSelector
// ---------------------------------------------------------------------------

/// One physical sensor within a family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum ModeKey {
    #[serde(rename = "ext")]
    Ext,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "1")]
    Soil1,
    #[serde(rename = "2")]
    Soil2,
    #[serde(rename = "3")]
    Soil3,
    #[serde(rename = "4")]
    Soil4,
}

impl ModeKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ModeKey::Ext => "ext",
            ModeKey::Int => "int",
            ModeKey::Soil1 => "1",
            ModeKey::Soil2 => "2",
            ModeKey::Soil3 => "3",
            ModeKey::Soil4 => "4",
        }
    }

    /// Stable palette index: `ext`→0, `int`→1, soil probe id − 1.
    pub fn ordinal(self) -> usize {
        match self {
            ModeKey::Ext | ModeKey::Soil1 => 0,
            ModeKey::Int | ModeKey::Soil2 => 1,
            ModeKey::Soil3 => 2,
            ModeKey::Soil4 => 3,
        }
    }

    pub fn family_matches(self, family: SensorFamily) -> bool {
        family.modes().contains(&self)
    }

    /// Human label used as series / block prefix.
    pub fn label(self) -> &'static str {
        match self {
            ModeKey::Ext => "Ext",
            ModeKey::Int => "Int",
            ModeKey::Soil1 => "Soil 1",
            ModeKey::Soil2 => "Soil 2",
            ModeKey::Soil3 => "Soil 3",
            ModeKey::Soil4 => "Soil 4",
        }
    }
}

impl fmt::Display for ModeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModeKey {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ext" => Ok(Self::Ext),
            "int" => Ok(Self::Int),
            "1" => Ok(Self::Soil1),
            "2" => Ok(Self::Soil2),
            "3" => Ok(Self::Soil3),
            "4" => Ok(Self::Soil4),
            other => Err(MetricsError::UnknownMode(other.to_owned())),
        }
    }
}

/// Which sensors of a family the dashboard shows: every one, or a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModeSelector {
    All,
    One(ModeKey),
}

impl ModeSelector {
    /// Modes of `family` covered by this selector.
    ///
    /// A single mode that belongs to another family (e.g. `ext` for soil)
    /// selects nothing.
    pub fn modes_for(self, family: SensorFamily) -> Vec<ModeKey> {
        match self {
            ModeSelector::All => family.modes().to_vec(),
            ModeSelector::One(mode) if mode.family_matches(family) => vec![mode],
            ModeSelector::One(_) => Vec::new(),
        }
    }
}

impl fmt::Display for ModeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeSelector::All => f.write_str("all"),
            ModeSelector::One(mode) => mode.fmt(f),
        }
    }
}

impl FromStr for ModeSelector {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            other => other.parse().map(Self::One),
        }
    }
}

impl TryFrom<String> for ModeSelector {
    type Error = MetricsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModeSelector> for String {
    fn from(value: ModeSelector) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Period / GapPolicy
// ---------------------------------------------------------------------------

/// Temporal granularity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    FullDay,
    DayAverage,
    Week,
    Month,
    PicAverage,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::FullDay,
        Period::DayAverage,
        Period::Week,
        Period::Month,
        Period::PicAverage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Period::FullDay => "full-day",
            Period::DayAverage => "day-average",
            Period::Week => "week",
            Period::Month => "month",
            Period::PicAverage => "pic-average",
        }
    }

    /// Only week and month windows can be shifted into the past.
    pub fn is_navigable(self) -> bool {
        matches!(self, Period::Week | Period::Month)
    }

    /// How the series synthesizer fills a missing value.
    pub fn gap_policy(self) -> GapPolicy {
        match self {
            Period::FullDay | Period::Week | Period::Month => GapPolicy::NullGap,
            Period::DayAverage | Period::PicAverage => GapPolicy::ZeroFill,
        }
    }

    /// Name of the column identifying a record in exports.
    pub fn time_column(self) -> &'static str {
        match self {
            Period::FullDay => "datetime",
            Period::DayAverage => "hour",
            Period::Week | Period::Month => "date",
            Period::PicAverage => "period",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| MetricsError::UnknownPeriod(s.to_owned()))
    }
}

/// Missing-value policy of a chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum GapPolicy {
    /// Emit `null` so the line visibly breaks.
    NullGap,
    /// Emit `0` so categorical bars stay aligned.
    ZeroFill,
}

impl GapPolicy {
    pub fn apply(self, value: Option<f64>) -> Option<f64> {
        match self {
            GapPolicy::NullGap => value,
            GapPolicy::ZeroFill => Some(value.unwrap_or(0.0)),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Which of the two pre-aggregated peak values to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakBranch {
    Day,
    Night,
    /// `(day + night) / 2` as computed upstream.
    Average,
}

impl PeakBranch {
    fn prefix(self) -> &'static str {
        match self {
            PeakBranch::Day => "max_day",
            PeakBranch::Night => "max_night",
            PeakBranch::Average => "pic_average",
        }
    }
}

/// One measured quantity of a sensor family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Raw reading key, e.g. `valueTemp`.
    pub key: &'static str,
    pub unit: &'static str,
    /// Short name shown after the mode label, e.g. `Temp`.
    pub short_label: &'static str,
    /// Y-axis title without unit, e.g. `Humidity`.
    pub axis_title: &'static str,
    /// Suffix of the peak keys (`max_day_<suffix>`); empty for light.
    pub peak_suffix: &'static str,
    /// Y-axis this field is plotted against.
    pub y_axis: usize,
}

impl FieldSpec {
    pub fn average_key(&self) -> String {
        format!("average_{}", self.key)
    }

    pub fn peak_key(&self, branch: PeakBranch) -> String {
        if self.peak_suffix.is_empty() {
            branch.prefix().to_owned()
        } else {
            format!("{}_{}", branch.prefix(), self.peak_suffix)
        }
    }

    /// Series / block label for one sensor, e.g. `Soil 2 Temp`.
    pub fn display_label(&self, mode: ModeKey) -> String {
        format!("{} {}", mode.label(), self.short_label)
    }

    /// Column header with unit suffix, e.g. `valueTemp (°C)`.
    pub fn column_header(&self) -> String {
        format!("{} ({})", self.key, self.unit)
    }
}

// ---------------------------------------------------------------------------
// SensorReading
// ---------------------------------------------------------------------------

/// A reading value as sent upstream. Numbers are expected, but strings and
/// other JSON values are tolerated and treated as missing unless they parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Other(_) => None,
        }
        .filter(|v| v.is_finite())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// One timestamped record for one (family, mode).
///
/// The identifying attribute depends on the period the record was fetched
/// for: `datetime` (instantaneous), `hour` (hourly average), `date` (daily or
/// month-slot average). Peak aggregates carry none of them. Every other key
/// lands in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl SensorReading {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(FieldValue::as_f64)
    }

    /// Instantaneous value, falling back to the aggregate.
    pub fn raw(&self, field: &FieldSpec) -> Option<f64> {
        self.number(field.key)
            .or_else(|| self.number(&field.average_key()))
    }

    /// Aggregated value, falling back to the raw key.
    pub fn aggregate(&self, field: &FieldSpec) -> Option<f64> {
        self.number(&field.average_key())
            .or_else(|| self.number(field.key))
    }

    pub fn peak(&self, field: &FieldSpec, branch: PeakBranch) -> Option<f64> {
        self.number(&field.peak_key(branch))
    }

    /// First ten characters of `date`, i.e. the ISO calendar day.
    pub fn day_key(&self) -> Option<&str> {
        self.date.as_deref().and_then(|d| d.get(..10))
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day_key()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.datetime.as_deref().and_then(parse_naive_local_as_utc)
    }
}

/// Readings per physical sensor of one family, as fetched.
pub type ReadingsByMode = BTreeMap<ModeKey, Vec<SensorReading>>;

/// Readings of `mode`, or an empty slice when nothing was fetched.
pub fn readings_for(readings: &ReadingsByMode, mode: ModeKey) -> &[SensorReading] {
    readings.get(&mode).map(Vec::as_slice).unwrap_or(&[])
}

/// Selector tuple resolved once per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSeriesRequest {
    pub family: SensorFamily,
    pub mode: ModeSelector,
    pub period: Period,
    /// Periods relative to now; only meaningful for week and month.
    pub offset: i32,
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse a naive wall-clock timestamp (`YYYY-MM-DD HH:MM:SS`, `T` separator
/// and fractional seconds accepted, or a bare date) and reinterpret it as UTC.
/// RFC 3339 strings that already carry an offset (`...Z`) are converted.
///
/// Upstream stores greenhouse-local time without an offset. Every time axis
/// and freshness check in this crate uses this single convention, so plotted
/// hours match the stored wall-clock hours.
pub fn parse_naive_local_as_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}
