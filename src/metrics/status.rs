use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{
    export::ReadingsByFamily,
    model::{ModeKey, SensorFamily},
};

/// Freshness of one physical sensor.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorState {
    pub family: SensorFamily,
    pub mode: ModeKey,
    pub online: bool,
    /// `datetime` of the newest reading, as sent.
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SensorStatus {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub sensors: Vec<SensorState>,
}

/// Count sensors whose last full-day reading is at most `threshold` old.
///
/// Every (family, mode) array present in the input is one sensor; an empty
/// array or an unparseable timestamp counts as offline. `now` must follow the
/// same naive-as-UTC convention as the readings.
pub fn sensor_status(
    readings: &ReadingsByFamily,
    now: DateTime<Utc>,
    threshold: TimeDelta,
) -> SensorStatus {
    let mut sensors = Vec::new();
    for (&family, by_mode) in readings {
        for (&mode, data) in by_mode {
            if !mode.family_matches(family) {
                warn!(family = %family, mode = %mode, "Ignoring readings of a foreign mode");
                continue;
            }
            let last = data.last();
            let online = last
                .and_then(|r| r.timestamp())
                .is_some_and(|ts| now - ts <= threshold);
            sensors.push(SensorState {
                family,
                mode,
                online,
                last_seen: last.and_then(|r| r.datetime.clone()),
            });
        }
    }

    let online = sensors.iter().filter(|s| s.online).count();
    SensorStatus {
        total: sensors.len(),
        online,
        offline: sensors.len() - online,
        sensors,
    }
}
