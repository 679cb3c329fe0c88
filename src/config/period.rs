use serde::Deserialize;
use std::fmt;

/// Selection period for the raster epochs to sample.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// One year back from the latest tested date in the input table.
    #[serde(rename(deserialize = "year"))]
    Year,
    /// Three months either side of January 1st of the measurement year.
    #[serde(rename(deserialize = "winter"))]
    Winter,
    /// Every available epoch.
    #[serde(rename(deserialize = "all"))]
    All,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Period::Year => write!(f, "year"),
            Period::Winter => write!(f, "winter"),
            Period::All => write!(f, "all"),
        }
    }
}
