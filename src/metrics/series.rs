use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use super::{
    catalog::SensorCatalog,
    model::{
        parse_naive_local_as_utc, readings_for, FieldSpec, ModeKey, PeakBranch, Period,
        ReadingsByMode, SensorReading, SensorSeriesRequest,
    },
    window::{self, Axis, PeriodWindow},
};

/// Plotted values of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesPoints {
    /// Aligned by index to the axis categories.
    Categorical(Vec<Option<f64>>),
    /// `[epoch millis, value]` pairs on a datetime axis.
    Timed(Vec<(i64, Option<f64>)>),
}

impl SeriesPoints {
    pub fn len(&self) -> usize {
        match self {
            SeriesPoints::Categorical(p) => p.len(),
            SeriesPoints::Timed(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named, coloured, axis-tagged line or column set.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    #[serde(rename = "yAxisIndex")]
    pub y_axis: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_style: Option<String>,
    pub mode: ModeKey,
    pub field: String,
    /// Values aligned to categories, or `[millis, value]` pairs.
    #[schema(value_type = Object)]
    pub points: SeriesPoints,
}

/// Axis plus every series plotted against it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeriesSet {
    #[schema(value_type = Object)]
    pub axis: Axis,
    pub series: Vec<ChartSeries>,
}

/// Build one series per (selected mode, field).
///
/// The axis depends only on the period and offset; the mode selection only
/// changes how many series are emitted.
pub fn build_series(
    catalog: &SensorCatalog,
    request: &SensorSeriesRequest,
    readings: &ReadingsByMode,
    today: NaiveDate,
) -> SeriesSet {
    let window = window::resolve(request.period, request.offset, today);
    series_in_window(catalog, request, readings, &window)
}

/// Same as [`build_series`] against an already resolved window.
pub fn series_in_window(
    catalog: &SensorCatalog,
    request: &SensorSeriesRequest,
    readings: &ReadingsByMode,
    window: &PeriodWindow,
) -> SeriesSet {
    let fields = catalog.fields(request.family);

    let mut series = Vec::new();
    for mode in request.mode.modes_for(request.family) {
        let data = readings_for(readings, mode);
        debug!(
            family = %request.family,
            mode = %mode,
            period = %request.period,
            records = data.len(),
            "Synthesising series"
        );
        for field in fields {
            let style = catalog.style(request.family, mode, field);
            series.push(ChartSeries {
                name: field.display_label(mode),
                color: style.color.to_owned(),
                y_axis: field.y_axis,
                dash_style: style.dash_style.map(str::to_owned),
                mode,
                field: field.key.to_owned(),
                points: points(window, field, data),
            });
        }
    }

    SeriesSet {
        axis: window.axis.clone(),
        series,
    }
}

fn points(window: &PeriodWindow, field: &FieldSpec, data: &[SensorReading]) -> SeriesPoints {
    let gap = window.gap_policy;
    match window.period {
        Period::FullDay => SeriesPoints::Timed(
            data.iter()
                .filter_map(|r| {
                    let ts = r.timestamp()?;
                    Some((ts.timestamp_millis(), gap.apply(r.raw(field))))
                })
                .collect(),
        ),
        Period::DayAverage | Period::Week => {
            let mut slots = vec![None; window.axis.categories().map_or(0, <[String]>::len)];
            for reading in data {
                let Some(index) = window
                    .bucket_key(reading)
                    .and_then(|key| window.category_index(&key))
                else {
                    continue;
                };
                if let Some(value) = reading.aggregate(field) {
                    slots[index] = Some(value);
                }
            }
            SeriesPoints::Categorical(slots.into_iter().map(|v| gap.apply(v)).collect())
        }
        Period::Month => {
            // Stable sort: records sharing a timestamp keep their input order.
            let mut timed: Vec<(i64, Option<f64>)> = data
                .iter()
                .filter(|r| window.contains_reading(r))
                .filter_map(|r| {
                    let ts = r.date.as_deref().and_then(parse_naive_local_as_utc)?;
                    Some((ts.timestamp_millis(), gap.apply(r.aggregate(field))))
                })
                .collect();
            timed.sort_by_key(|(ts, _)| *ts);
            SeriesPoints::Timed(timed)
        }
        Period::PicAverage => {
            let record = data.first();
            SeriesPoints::Categorical(
                [PeakBranch::Day, PeakBranch::Night]
                    .into_iter()
                    .map(|branch| gap.apply(record.and_then(|r| r.peak(field, branch))))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::metrics::model::{ModeSelector, SensorFamily};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
    }

    fn build(
        family: SensorFamily,
        mode: ModeSelector,
        period: Period,
        offset: i32,
        readings: serde_json::Value,
    ) -> SeriesSet {
        let readings: ReadingsByMode = serde_json::from_value(readings).unwrap();
        build_series(
            &SensorCatalog::default(),
            &SensorSeriesRequest { family, mode, period, offset },
            &readings,
            today(),
        )
    }

    fn series<'a>(set: &'a SeriesSet, mode: ModeKey, field: &str) -> &'a ChartSeries {
        set.series
            .iter()
            .find(|s| s.mode == mode && s.field == field)
            .unwrap_or_else(|| panic!("no series for {mode} {field}"))
    }

    #[test]
    fn full_day_single_point() {
        let set = build(
            SensorFamily::Light,
            ModeSelector::One(ModeKey::Ext),
            Period::FullDay,
            0,
            json!({ "ext": [{ "datetime": "2024-01-01 08:00:00", "value": 120 }] }),
        );
        assert_eq!(set.series.len(), 1);
        let s = &set.series[0];
        assert_eq!(s.name, "Ext Lum");
        assert_eq!(s.color, "#F9B233");
        assert_eq!(s.points, SeriesPoints::Timed(vec![(1_704_096_000_000, Some(120.0))]));
    }

    #[test]
    fn full_day_keeps_nulls_and_drops_bad_timestamps() {
        let set = build(
            SensorFamily::Env,
            ModeSelector::One(ModeKey::Int),
            Period::FullDay,
            0,
            json!({ "int": [
                { "datetime": "2024-01-01 08:00:00", "valueTemp": 20 },
                { "datetime": "garbage", "valueTemp": 21 },
                { "datetime": "2024-01-01 08:05:00", "valueTemp": "x" }
            ]}),
        );
        let s = series(&set, ModeKey::Int, "valueTemp");
        assert_eq!(
            s.points,
            SeriesPoints::Timed(vec![
                (1_704_096_000_000, Some(20.0)),
                (1_704_096_300_000, None),
            ])
        );
        assert_eq!(s.y_axis, 1);
    }

    #[test]
    fn day_average_zero_fills() {
        let set = build(
            SensorFamily::Env,
            ModeSelector::All,
            Period::DayAverage,
            0,
            json!({ "ext": [{ "hour": 8, "average_valueTemp": 22.5 }], "int": [] }),
        );
        assert_eq!(set.axis.categories().unwrap().len(), 24);
        assert_eq!(set.series.len(), 6);

        let SeriesPoints::Categorical(ext) = &series(&set, ModeKey::Ext, "valueTemp").points else {
            panic!("day average must be categorical");
        };
        assert_eq!(ext.len(), 24);
        assert_eq!(ext[8], Some(22.5));
        assert_eq!(ext[7], Some(0.0));

        let SeriesPoints::Categorical(int) = &series(&set, ModeKey::Int, "valueTemp").points else {
            panic!("day average must be categorical");
        };
        assert!(int.iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn week_projects_onto_seven_dates() {
        // Prior week of 2024-03-06 runs 2024-02-26 .. 2024-03-03; Wednesday is 02-28.
        let set = build(
            SensorFamily::Soil,
            ModeSelector::One(ModeKey::Soil2),
            Period::Week,
            -1,
            json!({ "2": [
                { "date": "2024-02-28", "average_valueSM": 34 },
                { "date": "2024-03-05", "average_valueSM": 99 }
            ]}),
        );
        assert_eq!(set.series.len(), 3);
        let SeriesPoints::Categorical(points) = &series(&set, ModeKey::Soil2, "valueSM").points else {
            panic!("week must be categorical");
        };
        assert_eq!(points.len(), 7);
        assert_eq!(points[2], Some(34.0));
        assert_eq!(points.iter().filter(|p| p.is_none()).count(), 6);
    }

    #[test]
    fn axis_is_independent_of_mode_selection() {
        for period in Period::ALL {
            let all = build(SensorFamily::Soil, ModeSelector::All, period, -1, json!({}));
            let one = build(
                SensorFamily::Soil,
                ModeSelector::One(ModeKey::Soil3),
                period,
                -1,
                json!({}),
            );
            assert_eq!(all.axis, one.axis, "{period}");
            assert_eq!(all.series.len(), 12);
            assert_eq!(one.series.len(), 3);
        }
    }

    #[test]
    fn month_plots_in_month_records_only() {
        let set = build(
            SensorFamily::Light,
            ModeSelector::One(ModeKey::Int),
            Period::Month,
            0,
            json!({ "int": [
                { "date": "2024-02-29 20:00:00", "average_value": 1 },
                { "date": "2024-03-01 00:00:00", "average_value": 2 },
                { "date": "2024-03-01 04:00:00" },
                { "date": "2024-03-02", "average_value": 3 }
            ]}),
        );
        let SeriesPoints::Timed(points) = &set.series[0].points else {
            panic!("month must be timed");
        };
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].1, Some(2.0));
        assert_eq!(points[1].1, None);
        assert_eq!(points[2].1, Some(3.0));
        assert!(matches!(set.axis, Axis::Datetime { min: Some(_), max: Some(_) }));
    }

    #[test]
    fn month_keeps_records_sharing_a_date() {
        let set = build(
            SensorFamily::Light,
            ModeSelector::One(ModeKey::Int),
            Period::Month,
            0,
            json!({ "int": [
                { "date": "2024-03-02 04:00:00", "average_value": 5 },
                { "date": "2024-03-01 04:00:00", "average_value": 1 },
                { "date": "2024-03-02 04:00:00", "average_value": 7 }
            ]}),
        );
        let SeriesPoints::Timed(points) = &set.series[0].points else {
            panic!("month must be timed");
        };
        assert_eq!(points.len(), 3);
        let values: Vec<_> = points.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![Some(1.0), Some(5.0), Some(7.0)]);
        assert_eq!(points[1].0, points[2].0);
    }

    #[test]
    fn full_day_accepts_utc_marked_datetimes() {
        let set = build(
            SensorFamily::Light,
            ModeSelector::One(ModeKey::Ext),
            Period::FullDay,
            0,
            json!({ "ext": [{ "datetime": "2024-01-01T08:00:00Z", "value": 120 }] }),
        );
        assert_eq!(
            set.series[0].points,
            SeriesPoints::Timed(vec![(1_704_096_000_000, Some(120.0))])
        );
    }

    #[test]
    fn pic_average_two_points() {
        let set = build(
            SensorFamily::Light,
            ModeSelector::One(ModeKey::Int),
            Period::PicAverage,
            0,
            json!({ "int": [{ "max_day": 500, "max_night": 5 }] }),
        );
        assert_eq!(
            set.axis.categories().unwrap(),
            &["Day".to_owned(), "Night".to_owned()]
        );
        assert_eq!(
            set.series[0].points,
            SeriesPoints::Categorical(vec![Some(500.0), Some(5.0)])
        );
        assert_eq!(set.series[0].color, "#40513B");

        let empty = build(SensorFamily::Env, ModeSelector::All, Period::PicAverage, 0, json!({}));
        assert!(empty
            .series
            .iter()
            .all(|s| s.points == SeriesPoints::Categorical(vec![Some(0.0), Some(0.0)])));
    }

    #[test]
    fn soil_series_carry_dash_styles() {
        let set = build(SensorFamily::Soil, ModeSelector::One(ModeKey::Soil1), Period::FullDay, 0, json!({}));
        let json = serde_json::to_value(series(&set, ModeKey::Soil1, "valueSM")).unwrap();
        assert_eq!(json["dashStyle"], "Solid");
        assert_eq!(json["yAxisIndex"], 0);
        assert_eq!(json["name"], "Soil 1 Hum");
        assert_eq!(json["points"], json!([]));
    }
}
