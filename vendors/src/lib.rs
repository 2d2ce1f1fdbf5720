//! Remote collaborators for airq-core sampling sessions
//!
//! This crate provides implementations of the `TargetDiscovery` and
//! `TargetFetcher` traits for:
//!
//! - World Air Quality Index (WAQI) map bounds and geolocalized feeds

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extract;
pub mod http;
pub mod waqi;

pub use extract::{extract_pm25, extract_stations, ExtractError};
pub use http::{ClientError, HttpConfig};
pub use waqi::{WaqiClient, DEFAULT_BASE_URL};
