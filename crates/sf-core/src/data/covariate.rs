//! Covariate vocabulary shared by every model family

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DataError;

/// Longitude column name
pub const LONGITUDE: &str = "lon";
/// Latitude column name
pub const LATITUDE: &str = "lat";
/// Year column name
pub const YEAR: &str = "year";
/// Response column: strikes per unit area per month
pub const STRIKES: &str = "strikes";

/// A climate predictor available in the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Covariate {
    /// Convective available potential energy
    Cape,
    /// Precipitation
    Precip,
    /// CAPE × precipitation
    CapeXPrecip,
    /// Near-surface air temperature
    AirTemperature,
    /// Near-surface wind speed
    WindSpeed,
    /// Downward shortwave radiation
    ShortwaveRadiation,
    /// Surface pressure
    SurfacePressure,
    /// Relative humidity
    RelativeHumidity,
}

impl Covariate {
    /// Every covariate, in panel column order
    pub const ALL: [Covariate; 8] = [
        Covariate::Cape,
        Covariate::Precip,
        Covariate::CapeXPrecip,
        Covariate::AirTemperature,
        Covariate::WindSpeed,
        Covariate::ShortwaveRadiation,
        Covariate::SurfacePressure,
        Covariate::RelativeHumidity,
    ];

    /// Column name in the input panel
    pub fn column(&self) -> &'static str {
        match self {
            Covariate::Cape => "cape",
            Covariate::Precip => "precip",
            Covariate::CapeXPrecip => "cxp",
            Covariate::AirTemperature => "tair",
            Covariate::WindSpeed => "wind",
            Covariate::ShortwaveRadiation => "swr",
            Covariate::SurfacePressure => "sp",
            Covariate::RelativeHumidity => "rh",
        }
    }

    /// Short label used in report tables
    pub fn label(&self) -> &'static str {
        match self {
            Covariate::Cape => "CAPE",
            Covariate::Precip => "P",
            Covariate::CapeXPrecip => "CAPE×P",
            Covariate::AirTemperature => "T",
            Covariate::WindSpeed => "W",
            Covariate::ShortwaveRadiation => "SWR",
            Covariate::SurfacePressure => "SP",
            Covariate::RelativeHumidity => "RH",
        }
    }

    /// Join labels of a covariate subset, e.g. `SWR + T + RH`
    pub fn subset_label(covariates: &[Covariate]) -> String {
        covariates
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl fmt::Display for Covariate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Covariate {
    type Err = DataError;

    /// Accepts either the column name or the report label, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Covariate::ALL
            .into_iter()
            .find(|c| {
                c.column().eq_ignore_ascii_case(needle) || c.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| DataError::InvalidParameter(format!("unknown covariate '{}'", s)))
    }
}
