use thiserror::Error;

/// Errors raised while interpreting selectors or encoding exports.
///
/// The aggregation paths themselves never fail: missing or malformed readings
/// degrade to `"N/A"`, `null` or `0` depending on the period.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unknown sensor family: {0:?}")]
    UnknownFamily(String),

    #[error("unknown mode: {0:?} (expected all, ext, int or 1-4)")]
    UnknownMode(String),

    #[error("unknown period: {0:?}")]
    UnknownPeriod(String),

    #[error("unknown export format: {0:?} (expected csv or json)")]
    UnknownExportFormat(String),

    #[error("failed to encode export as JSON: {0}")]
    Json(#[from] serde_json::Error),
}
