use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{ser::SerializeMap, Serialize, Serializer};
use tracing::debug;

use super::{
    catalog::SensorCatalog,
    error::MetricsError,
    model::{
        readings_for, FieldSpec, ModeKey, PeakBranch, Period, ReadingsByMode, SensorFamily,
        SensorReading,
    },
    window::{self, DAY_NIGHT_CATEGORIES},
};

/// Readings of several families, as sent to the export endpoint.
pub type ReadingsByFamily = BTreeMap<SensorFamily, ReadingsByMode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(MetricsError::UnknownExportFormat(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Value of the key column identifying a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TimeKey {
    Text(String),
    Hour(u32),
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeKey::Text(s) => f.write_str(s),
            TimeKey::Hour(h) => write!(f, "{h}"),
        }
    }
}

/// One flattened record: key columns followed by the populated fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub family: SensorFamily,
    pub mode: ModeKey,
    pub time_column: &'static str,
    pub time: Option<TimeKey>,
    pub values: Vec<(&'static str, f64)>,
}

impl ExportRow {
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

impl Serialize for ExportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.values.len()))?;
        map.serialize_entry("family", &self.family)?;
        map.serialize_entry("mode", &self.mode)?;
        map.serialize_entry(self.time_column, &self.time)?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Flattened rows plus the column layout shared by every row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub time_column: &'static str,
    pub columns: Vec<FieldSpec>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    /// CSV with a byte-order mark and a `key (unit)` header.
    pub fn to_csv(&self) -> String {
        let mut header = vec![
            "family".to_owned(),
            "mode".to_owned(),
            self.time_column.to_owned(),
        ];
        header.extend(self.columns.iter().map(FieldSpec::column_header));

        let mut csv = String::from("\u{FEFF}");
        push_line(&mut csv, header);
        for row in &self.rows {
            let mut line = vec![
                row.family.to_string(),
                row.mode.to_string(),
                row.time.as_ref().map(ToString::to_string).unwrap_or_default(),
            ];
            line.extend(
                self.columns
                    .iter()
                    .map(|c| row.value(c.key).map(|v| v.to_string()).unwrap_or_default()),
            );
            push_line(&mut csv, line);
        }
        csv
    }

    pub fn to_json(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    pub fn encode(&self, format: ExportFormat) -> Result<String, MetricsError> {
        match format {
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Json => self.to_json(),
        }
    }
}

fn push_line(csv: &mut String, cells: Vec<String>) {
    let line = cells
        .iter()
        .map(|cell| escape_csv(cell))
        .collect::<Vec<_>>()
        .join(",");
    csv.push_str(&line);
    csv.push('\n');
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

// ---------------------------------------------------------------------------
// Flattener
// ---------------------------------------------------------------------------

/// Flatten the fetched readings of every family into export rows.
///
/// Values are extracted the way the summary block extracts them: raw for
/// full-day, aggregate otherwise, and the two peaks for pic-average (one row
/// per branch). Month exports keep only records of the target month. Rows
/// without any populated field are dropped.
pub fn flatten(
    catalog: &SensorCatalog,
    period: Period,
    offset: i32,
    families: &ReadingsByFamily,
    today: NaiveDate,
) -> ExportTable {
    let window = window::resolve(period, offset, today);
    let mut columns: Vec<FieldSpec> = Vec::new();
    let mut rows = Vec::new();
    let in_window =
        |r: &&SensorReading| period != Period::Month || window.contains_reading(r);

    for (&family, readings) in families {
        let fields = catalog.fields(family);
        for field in fields {
            if !columns.iter().any(|c| c.key == field.key) {
                columns.push(field.clone());
            }
        }
        for &mode in family.modes() {
            let data = readings_for(readings, mode);
            let before = rows.len();
            for reading in data.iter().filter(in_window) {
                rows.extend(
                    record_rows(period, family, mode, fields, reading)
                        .into_iter()
                        .filter(|row| !row.values.is_empty()),
                );
            }
            debug!(
                family = %family,
                mode = %mode,
                period = %period,
                records = data.len(),
                rows = rows.len() - before,
                "Flattened readings"
            );
        }
    }

    ExportTable {
        time_column: period.time_column(),
        columns,
        rows,
    }
}

fn record_rows(
    period: Period,
    family: SensorFamily,
    mode: ModeKey,
    fields: &[FieldSpec],
    reading: &SensorReading,
) -> Vec<ExportRow> {
    let row = |time: Option<TimeKey>, values: Vec<(&'static str, f64)>| ExportRow {
        family,
        mode,
        time_column: period.time_column(),
        time,
        values,
    };
    let extract = |value: &dyn Fn(&FieldSpec) -> Option<f64>| -> Vec<(&'static str, f64)> {
        fields
            .iter()
            .filter_map(|f| value(f).map(|v| (f.key, v)))
            .collect()
    };

    match period {
        Period::FullDay => vec![row(
            reading.datetime.clone().map(TimeKey::Text),
            extract(&|f| reading.raw(f)),
        )],
        Period::DayAverage => vec![row(
            reading.hour.map(TimeKey::Hour),
            extract(&|f| reading.aggregate(f)),
        )],
        Period::Week | Period::Month => vec![row(
            reading.date.clone().map(TimeKey::Text),
            extract(&|f| reading.aggregate(f)),
        )],
        Period::PicAverage => [PeakBranch::Day, PeakBranch::Night]
            .into_iter()
            .zip(DAY_NIGHT_CATEGORIES)
            .map(|(branch, name)| {
                row(
                    Some(TimeKey::Text(name.to_owned())),
                    extract(&|f| reading.peak(f, branch)),
                )
            })
            .collect(),
    }
}
