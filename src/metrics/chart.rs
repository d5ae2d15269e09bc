use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    catalog::SensorCatalog,
    model::{Period, ReadingsByMode, SensorFamily, SensorSeriesRequest},
    series::{series_in_window, SeriesPoints},
    window::{self, Axis},
};

// ---------------------------------------------------------------------------
// Options object handed to the charting library
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub chart: ChartKind,
    pub title: Title,
    pub x_axis: XAxis,
    pub y_axis: Vec<YAxis>,
    pub legend: Legend,
    pub series: Vec<SeriesOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartKind {
    #[serde(rename = "type")]
    pub kind: String,
    pub background_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct XAxis {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct YAxis {
    pub title: Title,
    pub opposite: bool,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    pub layout: String,
    pub align: String,
    pub vertical_align: String,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            layout: "vertical".into(),
            align: "right".into(),
            vertical_align: "middle".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesOptions {
    pub name: String,
    pub color: String,
    pub y_axis: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_style: Option<String>,
    #[schema(value_type = Object)]
    pub data: SeriesPoints,
}

fn family_title(family: SensorFamily) -> &'static str {
    match family {
        SensorFamily::Light => "Light",
        SensorFamily::Env => "Environment",
        SensorFamily::Soil => "Soil",
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Wrap the synthesized series into a complete options object.
pub fn chart_options(
    catalog: &SensorCatalog,
    request: &SensorSeriesRequest,
    readings: &ReadingsByMode,
    today: NaiveDate,
) -> ChartOptions {
    let window = window::resolve(request.period, request.offset, today);
    let set = series_in_window(catalog, request, readings, &window);

    let kind = match request.period {
        Period::DayAverage | Period::PicAverage => "column",
        Period::FullDay | Period::Week | Period::Month => "line",
    };
    let x_title = match request.period {
        Period::FullDay | Period::DayAverage => "Hour",
        Period::Week | Period::Month => "Date",
        Period::PicAverage => "Period",
    };
    let x_axis = match set.axis {
        Axis::Categories { categories } => XAxis {
            kind: None,
            categories: Some(categories),
            min: None,
            max: None,
            title: Title { text: x_title.into() },
        },
        Axis::Datetime { min, max } => XAxis {
            kind: Some("datetime".into()),
            categories: None,
            min,
            max,
            title: Title { text: x_title.into() },
        },
    };

    let fields = catalog.fields_by_axis(request.family);
    let y_axis = (0..catalog.axis_count(request.family))
        .map(|index| {
            let text = fields
                .iter()
                .find(|f| f.y_axis == index)
                .map(|f| format!("{} ({})", f.axis_title, f.unit))
                .unwrap_or_default();
            YAxis {
                title: Title { text },
                opposite: index > 0,
                min: 0.0,
            }
        })
        .collect();

    ChartOptions {
        chart: ChartKind {
            kind: kind.into(),
            background_color: "rgba(0,0,0,0)".into(),
        },
        title: Title {
            text: format!("{} - {}", family_title(request.family), window.label),
        },
        x_axis,
        y_axis,
        legend: Legend::default(),
        series: set
            .series
            .into_iter()
            .map(|s| SeriesOptions {
                name: s.name,
                color: s.color,
                y_axis: s.y_axis,
                dash_style: s.dash_style,
                data: s.points,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::metrics::model::{ModeKey, ModeSelector};

    fn options(family: SensorFamily, mode: ModeSelector, period: Period) -> ChartOptions {
        chart_options(
            &SensorCatalog::default(),
            &SensorSeriesRequest { family, mode, period, offset: 0 },
            &ReadingsByMode::new(),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
        )
    }

    #[test]
    fn light_has_single_axis() {
        let o = options(SensorFamily::Light, ModeSelector::All, Period::FullDay);
        assert_eq!(o.chart.kind, "line");
        assert_eq!(o.y_axis.len(), 1);
        assert_eq!(o.y_axis[0].title.text, "Luminosity (Lux)");
        assert!(!o.y_axis[0].opposite);
        assert_eq!(o.series.len(), 2);
    }

    #[test]
    fn env_axes_follow_field_assignment() {
        let o = options(SensorFamily::Env, ModeSelector::One(ModeKey::Ext), Period::DayAverage);
        assert_eq!(o.chart.kind, "column");
        let titles: Vec<_> = o.y_axis.iter().map(|a| a.title.text.as_str()).collect();
        assert_eq!(titles, vec!["CO₂ (ppm)", "Temp (°C)", "Humidity (%RH)"]);
        assert!(o.y_axis[1].opposite && o.y_axis[2].opposite);
        assert_eq!(o.x_axis.categories.as_ref().map(Vec::len), Some(24));
        assert_eq!(o.x_axis.title.text, "Hour");
    }

    #[test]
    fn month_uses_datetime_axis() {
        let o = options(SensorFamily::Soil, ModeSelector::All, Period::Month);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["xAxis"]["type"], "datetime");
        assert!(json["xAxis"]["min"].is_i64());
        assert_eq!(json["xAxis"]["title"]["text"], "Date");
        assert_eq!(json["title"]["text"], "Soil - Month (March 2024)");
        assert_eq!(json["legend"], json!({
            "layout": "vertical", "align": "right", "verticalAlign": "middle"
        }));
        assert_eq!(json["yAxis"][0]["title"]["text"], "Humidity (%)");
        assert_eq!(json["series"].as_array().map(Vec::len), Some(12));
    }

    #[test]
    fn pic_average_series_data() {
        let o = options(SensorFamily::Light, ModeSelector::One(ModeKey::Int), Period::PicAverage);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["chart"]["type"], "column");
        assert_eq!(json["xAxis"]["categories"], json!(["Day", "Night"]));
        assert_eq!(json["series"][0]["data"], json!([0.0, 0.0]));
        assert_eq!(json["series"][0]["yAxis"], 0);
    }
}
