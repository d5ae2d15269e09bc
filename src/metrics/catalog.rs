use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use super::model::{FieldSpec, ModeKey, Period, SensorFamily};

// ---------------------------------------------------------------------------
// Built-in greenhouse tables
// ---------------------------------------------------------------------------

const LIGHT_FIELDS: &[FieldSpec] = &[FieldSpec {
    key: "value",
    unit: "Lux",
    short_label: "Lum",
    axis_title: "Luminosity",
    peak_suffix: "",
    y_axis: 0,
}];

const ENV_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "valueTemp",
        unit: "°C",
        short_label: "Temp",
        axis_title: "Temp",
        peak_suffix: "Temp",
        y_axis: 1,
    },
    FieldSpec {
        key: "valueHum",
        unit: "%RH",
        short_label: "Hum",
        axis_title: "Humidity",
        peak_suffix: "Hum",
        y_axis: 2,
    },
    FieldSpec {
        key: "valueCO2",
        unit: "ppm",
        short_label: "CO2",
        axis_title: "CO₂",
        peak_suffix: "CO2",
        y_axis: 0,
    },
];

const SOIL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "valueTemp",
        unit: "°C",
        short_label: "Temp",
        axis_title: "Temp",
        peak_suffix: "Temp",
        y_axis: 1,
    },
    FieldSpec {
        key: "valueSM",
        unit: "%",
        short_label: "Hum",
        axis_title: "Humidity",
        peak_suffix: "SM",
        y_axis: 0,
    },
    FieldSpec {
        key: "valueEC",
        unit: "dS/m",
        short_label: "EC",
        axis_title: "EC",
        peak_suffix: "EC",
        y_axis: 2,
    },
];

/// Colours indexed `[mode ordinal][y-axis]`; a single entry covers every axis.
const LIGHT_PALETTE: &[&[&str]] = &[&["#F9B233"], &["#40513B"]];
const ENV_PALETTE: &[&[&str]] = &[
    &["#FF0000", "#609966", "#0000FF"],
    &["#B22222", "#B0C4DE", "#8A2BE2"],
];
const SOIL_PALETTE: &[&[&str]] = &[&["#FFA500"], &["#00CED1"], &["#FF69B4"], &["#808080"]];
const SOIL_DASH_STYLES: &[&str] = &["Solid", "ShortDash", "Dot"];

const FALLBACK_COLOR: &str = "#40513B";

// ---------------------------------------------------------------------------
// SensorCatalog
// ---------------------------------------------------------------------------

/// Colour and stroke of one chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesStyle {
    pub color: &'static str,
    pub dash_style: Option<&'static str>,
}

/// Per-family field vocabulary, endpoint templates and palette.
///
/// Endpoint templates contain a `{mode}` placeholder, replaced by the mode
/// key (`ext`, `int`, `1`..`4`).
#[derive(Debug, Clone)]
pub struct SensorCatalog {
    fields: HashMap<SensorFamily, Vec<FieldSpec>>,
    endpoints: HashMap<(SensorFamily, Period), String>,
    palettes: HashMap<SensorFamily, Vec<Vec<&'static str>>>,
    dash_styles: HashMap<SensorFamily, Vec<&'static str>>,
}

/// One request the HTTP collaborator must issue to feed the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FetchTarget {
    pub mode: ModeKey,
    pub url: String,
}

impl Default for SensorCatalog {
    fn default() -> Self {
        let mut endpoints = HashMap::new();
        for (family, resource) in [
            (SensorFamily::Light, "sensor_light_{mode}"),
            (SensorFamily::Env, "sensor_co2temphum_{mode}"),
            (SensorFamily::Soil, "sensor_smtempec_{mode}"),
        ] {
            for period in Period::ALL {
                let suffix = match period {
                    Period::FullDay => "day",
                    Period::DayAverage => "day/average",
                    Period::Week => "week",
                    Period::Month => "month",
                    Period::PicAverage => "day/pic-average",
                };
                endpoints.insert((family, period), format!("/api/sensors/{resource}/{suffix}"));
            }
        }

        let palette = |p: &[&[&'static str]]| p.iter().map(|m| m.to_vec()).collect::<Vec<_>>();

        Self {
            fields: HashMap::from([
                (SensorFamily::Light, LIGHT_FIELDS.to_vec()),
                (SensorFamily::Env, ENV_FIELDS.to_vec()),
                (SensorFamily::Soil, SOIL_FIELDS.to_vec()),
            ]),
            endpoints,
            palettes: HashMap::from([
                (SensorFamily::Light, palette(LIGHT_PALETTE)),
                (SensorFamily::Env, palette(ENV_PALETTE)),
                (SensorFamily::Soil, palette(SOIL_PALETTE)),
            ]),
            dash_styles: HashMap::from([(SensorFamily::Soil, SOIL_DASH_STYLES.to_vec())]),
        }
    }
}

impl SensorCatalog {
    /// Ordered field vocabulary of `family`.
    pub fn fields(&self, family: SensorFamily) -> &[FieldSpec] {
        self.fields.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of y-axes the family's chart needs.
    pub fn axis_count(&self, family: SensorFamily) -> usize {
        self.fields(family)
            .iter()
            .map(|f| f.y_axis + 1)
            .max()
            .unwrap_or(1)
    }

    /// Fields ordered by the y-axis they are plotted on.
    pub fn fields_by_axis(&self, family: SensorFamily) -> Vec<&FieldSpec> {
        let mut fields: Vec<_> = self.fields(family).iter().collect();
        fields.sort_by_key(|f| f.y_axis);
        fields
    }

    pub fn with_fields(mut self, family: SensorFamily, fields: Vec<FieldSpec>) -> Self {
        self.fields.insert(family, fields);
        self
    }

    pub fn with_endpoint(
        mut self,
        family: SensorFamily,
        period: Period,
        template: impl Into<String>,
    ) -> Self {
        self.endpoints.insert((family, period), template.into());
        self
    }

    /// Relative endpoint path for one (family, period, mode).
    ///
    /// Week and month paths carry the `offset` query parameter.
    pub fn endpoint(
        &self,
        family: SensorFamily,
        period: Period,
        mode: ModeKey,
        offset: i32,
    ) -> Option<String> {
        if !mode.family_matches(family) {
            return None;
        }
        let path = self
            .endpoints
            .get(&(family, period))?
            .replace("{mode}", mode.as_str());
        Some(if period.is_navigable() {
            format!("{path}?offset={offset}")
        } else {
            path
        })
    }

    /// Deterministic style of the series for (`family`, `mode`, `field`).
    pub fn style(&self, family: SensorFamily, mode: ModeKey, field: &FieldSpec) -> SeriesStyle {
        let color = self
            .palettes
            .get(&family)
            .and_then(|p| p.get(mode.ordinal()))
            .and_then(|colors| colors.get(field.y_axis).or_else(|| colors.first()))
            .copied()
            .unwrap_or(FALLBACK_COLOR);
        let dash_style = self
            .dash_styles
            .get(&family)
            .and_then(|d| d.get(field.y_axis))
            .copied();
        SeriesStyle { color, dash_style }
    }
}
