pub mod catalog;
pub mod chart;
pub mod error;
pub mod export;
pub mod model;
pub mod series;
pub mod status;
pub mod summary;
pub mod window;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::{debug, warn};

use catalog::{FetchTarget, SensorCatalog};
use chart::ChartOptions;
use export::{ExportTable, ReadingsByFamily};
use model::{ModeSelector, Period, ReadingsByMode, SensorSeriesRequest};
use series::SeriesSet;
use status::SensorStatus;
use summary::SummaryBlock;
use window::PeriodWindow;

/// Pure aggregation engine over an injected [`SensorCatalog`].
///
/// Every call is independent: it takes already fetched readings plus the
/// selector, and returns freshly built render-ready values. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    catalog: Arc<SensorCatalog>,
}

impl MetricsEngine {
    pub fn new(catalog: SensorCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &SensorCatalog {
        &self.catalog
    }

    pub fn window(&self, period: Period, offset: i32, today: NaiveDate) -> PeriodWindow {
        window::resolve(period, offset, today)
    }

    pub fn summarize(
        &self,
        request: &SensorSeriesRequest,
        readings: &ReadingsByMode,
        today: NaiveDate,
    ) -> Vec<SummaryBlock> {
        self.check_selector(request);
        summary::summarize(&self.catalog, request, readings, today)
    }

    pub fn series(
        &self,
        request: &SensorSeriesRequest,
        readings: &ReadingsByMode,
        today: NaiveDate,
    ) -> SeriesSet {
        self.check_selector(request);
        series::build_series(&self.catalog, request, readings, today)
    }

    pub fn chart(
        &self,
        request: &SensorSeriesRequest,
        readings: &ReadingsByMode,
        today: NaiveDate,
    ) -> ChartOptions {
        self.check_selector(request);
        chart::chart_options(&self.catalog, request, readings, today)
    }

    pub fn export(
        &self,
        period: Period,
        offset: i32,
        families: &ReadingsByFamily,
        today: NaiveDate,
    ) -> ExportTable {
        export::flatten(&self.catalog, period, offset, families, today)
    }

    pub fn status(
        &self,
        readings: &ReadingsByFamily,
        now: DateTime<Utc>,
        threshold: TimeDelta,
    ) -> SensorStatus {
        status::sensor_status(readings, now, threshold)
    }

    /// Endpoint URLs the HTTP collaborator must fetch for `request`, one per
    /// selected mode, prefixed with `base_url`.
    pub fn fetch_plan(
        &self,
        request: &SensorSeriesRequest,
        base_url: &str,
        today: NaiveDate,
    ) -> Vec<FetchTarget> {
        self.check_selector(request);
        let offset = window::resolve(request.period, request.offset, today).offset;
        let base_url = base_url.trim_end_matches('/');

        request
            .mode
            .modes_for(request.family)
            .into_iter()
            .filter_map(|mode| {
                let path = self
                    .catalog
                    .endpoint(request.family, request.period, mode, offset)?;
                Some(FetchTarget {
                    mode,
                    url: format!("{base_url}{path}"),
                })
            })
            .collect()
    }

    fn check_selector(&self, request: &SensorSeriesRequest) {
        if let ModeSelector::One(mode) = request.mode {
            if !mode.family_matches(request.family) {
                warn!(
                    family = %request.family,
                    mode = %mode,
                    "Mode does not belong to family; nothing selected"
                );
            }
        }
        debug!(
            family = %request.family,
            mode = %request.mode,
            period = %request.period,
            offset = request.offset,
            "Engine request"
        );
    }
}
