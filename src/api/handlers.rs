use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use utoipa::OpenApi;

use super::{
    dto::{
        EndpointsParams, EngineRequest, ExportParams, ExportRequest, FetchPlanDto, StatusRequest,
    },
    errors::AppError,
    AppState,
};
use crate::metrics::{
    catalog::FetchTarget,
    chart::ChartOptions,
    export::ExportFormat,
    model::{ModeKey, Period, SensorFamily, SensorSeriesRequest},
    series::{ChartSeries, SeriesSet},
    status::{SensorState, SensorStatus},
    summary::{SummaryBlock, SummaryEntry},
};

// ---------------------------------------------------------------------------
// Engine endpoints
// ---------------------------------------------------------------------------

/// Scalar "current value" blocks, one per selected mode.
#[utoipa::path(
    post,
    path = "/metrics/summary",
    request_body = EngineRequest,
    responses(
        (status = 200, description = "One summary block per selected mode", body = Vec<SummaryBlock>),
        (status = 400, description = "Malformed selector"),
    ),
    tag = "metrics"
)]
pub async fn summary(
    State(state): State<AppState>,
    payload: Result<Json<EngineRequest>, JsonRejection>,
) -> Result<Json<Vec<SummaryBlock>>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.engine.summarize(&req.selector(), &req.readings, req.today())))
}

/// Chart series aligned to the period's axis.
#[utoipa::path(
    post,
    path = "/metrics/series",
    request_body = EngineRequest,
    responses(
        (status = 200, description = "Axis and series", body = SeriesSet),
        (status = 400, description = "Malformed selector"),
    ),
    tag = "metrics"
)]
pub async fn series(
    State(state): State<AppState>,
    payload: Result<Json<EngineRequest>, JsonRejection>,
) -> Result<Json<SeriesSet>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.engine.series(&req.selector(), &req.readings, req.today())))
}

/// Complete options object for the charting library.
#[utoipa::path(
    post,
    path = "/metrics/chart",
    request_body = EngineRequest,
    responses(
        (status = 200, description = "Chart options", body = ChartOptions),
        (status = 400, description = "Malformed selector"),
    ),
    tag = "metrics"
)]
pub async fn chart(
    State(state): State<AppState>,
    payload: Result<Json<EngineRequest>, JsonRejection>,
) -> Result<Json<ChartOptions>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.engine.chart(&req.selector(), &req.readings, req.today())))
}

/// Flattened rows of every posted family, as CSV (default) or JSON.
#[utoipa::path(
    post,
    path = "/metrics/export",
    params(
        ("format" = Option<String>, Query, description = "`csv` (default) or `json`"),
    ),
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Export file", body = String, content_type = "text/csv"),
        (status = 400, description = "Unknown format or malformed body"),
    ),
    tag = "metrics"
)]
pub async fn export(
    State(state): State<AppState>,
    params: Result<Query<ExportParams>, QueryRejection>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params?;
    let format: ExportFormat = params.format.as_deref().unwrap_or("csv").parse()?;
    let Json(req) = payload?;

    let table = state
        .engine
        .export(req.period, req.offset, &req.families, req.today());
    let body = table.encode(format)?;
    let extension = match format {
        ExportFormat::Csv => "csv",
        ExportFormat::Json => "json",
    };
    let disposition = format!(
        "attachment; filename=\"greenhouse-{}.{extension}\"",
        req.period
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Online / offline counts from the latest full-day readings.
#[utoipa::path(
    post,
    path = "/metrics/status",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Sensor freshness", body = SensorStatus),
        (status = 400, description = "Malformed body"),
    ),
    tag = "metrics"
)]
pub async fn status(
    State(state): State<AppState>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<SensorStatus>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.engine.status(
        &req.readings,
        req.now().and_utc(),
        state.config.online_threshold,
    )))
}

/// Upstream URLs to fetch for a selector.
#[utoipa::path(
    get,
    path = "/metrics/endpoints",
    params(
        ("family" = SensorFamily, Query, description = "light, env or soil"),
        ("mode" = Option<String>, Query, description = "all (default), ext, int or 1-4"),
        ("period" = Period, Query, description = "full-day, day-average, week, month or pic-average"),
        ("offset" = Option<i32>, Query, description = "Periods into the past (week / month)"),
    ),
    responses(
        (status = 200, description = "Fetch plan", body = FetchPlanDto),
        (status = 400, description = "Unknown family, mode or period"),
    ),
    tag = "metrics"
)]
pub async fn endpoints(
    State(state): State<AppState>,
    params: Result<Query<EndpointsParams>, QueryRejection>,
) -> Result<Json<FetchPlanDto>, AppError> {
    let Query(params) = params?;
    let request = SensorSeriesRequest {
        family: params.family.parse()?,
        mode: params.mode.as_deref().unwrap_or("all").parse()?,
        period: params.period.parse()?,
        offset: params.offset.unwrap_or(0),
    };

    let today = chrono::Local::now().date_naive();
    let window = state.engine.window(request.period, request.offset, today);
    let targets = state
        .engine
        .fetch_plan(&request, &state.config.sensor_api_base_url, today);

    Ok(Json(FetchPlanDto {
        family: request.family,
        mode: request.mode,
        period: request.period,
        offset: window.offset,
        label: window.label,
        targets,
    }))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(summary, series, chart, export, status, endpoints, health),
    components(schemas(
        EngineRequest,
        ExportRequest,
        StatusRequest,
        FetchPlanDto,
        FetchTarget,
        SummaryBlock,
        SummaryEntry,
        SeriesSet,
        ChartSeries,
        ChartOptions,
        SensorStatus,
        SensorState,
        SensorFamily,
        ModeKey,
        Period,
    )),
    tags(
        (name = "metrics", description = "Sensor aggregation and chart synthesis"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Greenhouse Metrics API",
        version = "0.1.0",
        description = "Turns fetched greenhouse sensor readings into summaries, chart series and exports"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::{
        api::{router, AppState},
        config::Config,
    };

    fn test_server() -> TestServer {
        TestServer::new(router(AppState::new(Config::default()))).unwrap()
    }

    // -----------------------------------------------------------------------
    // POST /metrics/summary
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn summary_latest_light_reading() {
        let server = test_server();
        let resp = server
            .post("/metrics/summary")
            .json(&json!({
                "family": "light",
                "mode": "ext",
                "period": "full-day",
                "readings": { "ext": [{ "datetime": "2024-01-01 08:00:00", "value": 120 }] }
            }))
            .await;
        resp.assert_status_ok();

        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["mode"], "ext");
        assert_eq!(body[0]["values"][0]["value"], 120.0);
        assert_eq!(body[0]["values"][0]["unit"], "Lux");
    }

    #[tokio::test]
    async fn summary_all_modes_reports_na() {
        let server = test_server();
        let resp = server
            .post("/metrics/summary")
            .json(&json!({
                "family": "env",
                "mode": "all",
                "period": "day-average",
                "readings": { "ext": [{ "hour": 8, "average_valueTemp": 22.5 }], "int": [] }
            }))
            .await;
        resp.assert_status_ok();

        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0]["values"][0]["value"], 22.5);
        assert_eq!(body[1]["values"][0]["value"], "N/A");
    }

    #[tokio::test]
    async fn summary_rejects_unknown_mode() {
        let server = test_server();
        let resp = server
            .post("/metrics/summary")
            .json(&json!({ "family": "soil", "mode": "7", "period": "week" }))
            .expect_failure()
            .await;
        assert!(resp.status_code().is_client_error());
        let body: Value = resp.json();
        assert!(body["error"].is_string());
    }

    // -----------------------------------------------------------------------
    // POST /metrics/series and /metrics/chart
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn series_week_has_seven_points() {
        let server = test_server();
        let resp = server
            .post("/metrics/series")
            .json(&json!({
                "family": "soil",
                "mode": "2",
                "period": "week",
                "offset": -1,
                "today": "2024-03-06",
                "readings": { "2": [{ "date": "2024-02-28", "average_valueSM": 34 }] }
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["axis"]["type"], "categories");
        assert_eq!(body["axis"]["categories"][0], "2024-02-26");
        let sm = body["series"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["field"] == "valueSM")
            .unwrap();
        assert_eq!(sm["points"], json!([null, null, 34.0, null, null, null, null]));
        assert_eq!(sm["color"], "#00CED1");
    }

    #[tokio::test]
    async fn chart_pic_average_options() {
        let server = test_server();
        let resp = server
            .post("/metrics/chart")
            .json(&json!({
                "family": "light",
                "mode": "int",
                "period": "pic-average",
                "readings": { "int": [{ "max_day": 500, "max_night": 5 }] }
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["chart"]["type"], "column");
        assert_eq!(body["xAxis"]["categories"], json!(["Day", "Night"]));
        assert_eq!(body["series"][0]["data"], json!([500.0, 5.0]));
    }

    // -----------------------------------------------------------------------
    // POST /metrics/export
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn export_csv_by_default() {
        let server = test_server();
        let resp = server
            .post("/metrics/export")
            .json(&json!({
                "period": "full-day",
                "families": {
                    "light": { "ext": [{ "datetime": "2024-01-01 08:00:00", "value": 120 }] }
                }
            }))
            .await;
        resp.assert_status_ok();
        assert_eq!(
            resp.header("content-type").to_str().unwrap(),
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            resp.text(),
            "\u{FEFF}family,mode,datetime,value (Lux)\nlight,ext,2024-01-01 08:00:00,120\n"
        );
    }

    #[tokio::test]
    async fn export_json_rows() {
        let server = test_server();
        let resp = server
            .post("/metrics/export")
            .add_query_param("format", "json")
            .json(&json!({
                "period": "day-average",
                "families": { "env": { "int": [{ "hour": 5, "average_valueHum": 80 }, { "hour": 6 }] } }
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(
            body,
            json!([{ "family": "env", "mode": "int", "hour": 5, "valueHum": 80.0 }])
        );
    }

    #[tokio::test]
    async fn export_unknown_format_is_bad_request() {
        let server = test_server();
        let resp = server
            .post("/metrics/export")
            .add_query_param("format", "xlsx")
            .json(&json!({ "period": "week", "families": {} }))
            .expect_failure()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // POST /metrics/status
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn status_counts_online_sensors() {
        let server = test_server();
        let resp = server
            .post("/metrics/status")
            .json(&json!({
                "now": "2024-03-06T12:00:00",
                "readings": {
                    "env": {
                        "ext": [{ "datetime": "2024-03-06 11:55:00" }],
                        "int": [{ "datetime": "2024-03-06 09:00:00" }]
                    }
                }
            }))
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["total"], 2);
        assert_eq!(body["online"], 1);
        assert_eq!(body["offline"], 1);
    }

    // -----------------------------------------------------------------------
    // GET /metrics/endpoints
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn endpoints_list_fetch_plan() {
        let server = test_server();
        let resp = server
            .get("/metrics/endpoints")
            .add_query_param("family", "light")
            .add_query_param("period", "week")
            .add_query_param("offset", "-2")
            .await;
        resp.assert_status_ok();

        let body: Value = resp.json();
        assert_eq!(body["mode"], "all");
        assert_eq!(body["offset"], -2);
        assert_eq!(
            body["targets"][1]["url"],
            "http://localhost:8080/api/sensors/sensor_light_int/week?offset=-2"
        );
    }

    #[tokio::test]
    async fn endpoints_reject_unknown_period() {
        let server = test_server();
        let resp = server
            .get("/metrics/endpoints")
            .add_query_param("family", "soil")
            .add_query_param("period", "year")
            .expect_failure()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["error"], "unknown period: \"year\"");
    }

    // -----------------------------------------------------------------------
    // GET /health and /api-docs/openapi.json
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = test_server();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Greenhouse Metrics API");
        assert!(body["paths"]["/metrics/summary"].is_object());
    }
}
