//! Extraction of stations and PM2.5 values from WAQI JSON bodies

use airq_core::Target;
use serde_json::Value;
use thiserror::Error;

/// A response body that does not carry usable data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// `status` was not `"ok"`; carries the service message if any.
    #[error("api status {status}: {message}")]
    Status {
        /// Reported status, `"missing"` if absent
        status: String,
        /// Error message from `data`, if it was a string
        message: String,
    },

    /// The body does not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Shape(&'static str),
}

/// Fail unless the body reports `"status": "ok"`.
fn check_status(body: &Value) -> Result<(), ExtractError> {
    match body.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(()),
        status => Err(ExtractError::Status {
            status: status.unwrap_or("missing").to_string(),
            message: body
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
    }
}

/// A JSON number or a numeric string.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stations listed by a map bounds query.
///
/// Entries missing `lat` or `lon` are skipped.
pub fn extract_stations(body: &Value) -> Result<Vec<Target>, ExtractError> {
    check_status(body)?;

    let stations = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or(ExtractError::Shape("`data` is not an array"))?;

    Ok(stations
        .iter()
        .filter_map(|station| {
            let lat = station.get("lat").and_then(as_number)?;
            let lon = station.get("lon").and_then(as_number)?;
            Some(Target::new(lat, lon))
        })
        .collect())
}

/// PM2.5 value of a geolocalized feed, at `data.iaqi.pm25.v`.
///
/// A missing or non-numeric value is `Ok(None)`.
pub fn extract_pm25(body: &Value) -> Result<Option<f64>, ExtractError> {
    check_status(body)?;

    Ok(body.pointer("/data/iaqi/pm25/v").and_then(as_number))
}
