use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::metrics::{
    catalog::FetchTarget,
    export::ReadingsByFamily,
    model::{ModeSelector, Period, ReadingsByMode, SensorFamily, SensorSeriesRequest},
};

/// Calendar day used when a request does not pin one.
fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Selector plus the readings fetched for it, one array per mode.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EngineRequest {
    pub family: SensorFamily,
    /// `all`, `ext`, `int` or a soil probe `1`-`4`.
    #[schema(value_type = String, example = "all")]
    pub mode: ModeSelector,
    pub period: Period,
    /// Periods into the past; only week and month use it.
    #[serde(default)]
    pub offset: i32,
    /// Pins the calendar (`YYYY-MM-DD`); defaults to the server's local date.
    pub today: Option<NaiveDate>,
    /// Reading arrays keyed by mode (`ext`, `int`, `1`..`4`).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub readings: ReadingsByMode,
}

impl EngineRequest {
    pub fn selector(&self) -> SensorSeriesRequest {
        SensorSeriesRequest {
            family: self.family,
            mode: self.mode,
            period: self.period,
            offset: self.offset,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(local_today)
    }
}

/// Readings of one or more families to flatten for download.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportRequest {
    pub period: Period,
    #[serde(default)]
    pub offset: i32,
    pub today: Option<NaiveDate>,
    /// `{ "<family>": { "<mode>": [ ... ] } }`
    #[schema(value_type = Object)]
    pub families: ReadingsByFamily,
}

impl ExportRequest {
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(local_today)
    }
}

/// Latest full-day readings per family and mode.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    /// Reference wall-clock time; defaults to the server's local time.
    pub now: Option<NaiveDateTime>,
    #[schema(value_type = Object)]
    pub readings: ReadingsByFamily,
}

impl StatusRequest {
    pub fn now(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(|| Local::now().naive_local())
    }
}

/// Query of `GET /metrics/endpoints`. Kept as strings so selector errors
/// surface as `400` with the engine's message.
#[derive(Debug, Deserialize)]
pub struct EndpointsParams {
    pub family: String,
    pub mode: Option<String>,
    pub period: String,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FetchPlanDto {
    pub family: SensorFamily,
    #[schema(value_type = String)]
    pub mode: ModeSelector,
    pub period: Period,
    /// Offset after clamping.
    pub offset: i32,
    /// Navigation header of the resolved window.
    pub label: String,
    pub targets: Vec<FetchTarget>,
}
