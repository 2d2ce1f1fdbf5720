//! Geographic types: sampling targets and the bounding box they are discovered in

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// A monitoring station, identified by its coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Latitude in degrees
    #[serde(rename = "lat")]
    pub latitude: f64,

    /// Longitude in degrees
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl Target {
    /// Create a new target
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.latitude, self.longitude)
    }
}

/// Bounding box given as two opposite corners
///
/// The corners are passed to discovery as-is; no ordering between them is
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Latitude of the first corner
    pub lat1: f64,
    /// Longitude of the first corner
    pub lon1: f64,
    /// Latitude of the second corner
    pub lat2: f64,
    /// Longitude of the second corner
    pub lon2: f64,
}

impl Bounds {
    /// Create bounds from two corners
    pub fn new(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Self {
        Self {
            lat1,
            lon1,
            lat2,
            lon2,
        }
    }

    /// Check that both corners are real coordinates
    pub fn validate(&self) -> Result<(), ConfigError> {
        for lat in [self.lat1, self.lat2] {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::InvalidBounds(format!(
                    "latitude {lat} outside [-90, 90]"
                )));
            }
        }
        for lon in [self.lon1, self.lon2] {
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(ConfigError::InvalidBounds(format!(
                    "longitude {lon} outside [-180, 180]"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.lat1, self.lon1, self.lat2, self.lon2)
    }
}

impl FromStr for Bounds {
    type Err = ConfigError;

    /// Parse `lat1,lon1,lat2,lon2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidBounds(format!("{s:?}: {e}")))?;

        match parts.as_slice() {
            &[lat1, lon1, lat2, lon2] => {
                let bounds = Bounds::new(lat1, lon1, lat2, lon2);
                bounds.validate()?;
                Ok(bounds)
            }
            _ => Err(ConfigError::InvalidBounds(format!(
                "expected 4 comma-separated values, got {}",
                parts.len()
            ))),
        }
    }
}
