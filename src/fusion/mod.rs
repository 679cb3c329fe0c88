use gdal::errors::GdalError;
use std::fmt;

use crate::dates::DateError;
use crate::raster::RasterError;
use crate::table::TableError;
use crate::vector::VectorError;

pub mod differential;
pub mod engine;
pub mod merge;

pub use engine::{FusionEngine, FusionReport};

#[derive(Debug)]
pub enum FusionError {
    Dates(DateError),
    Gdal(GdalError),
    Raster(RasterError),
    Vector(VectorError),
    Table(TableError),
    /// A source stack was selected but none of its keys carried a date token.
    NoDates(String),
    EmptyTable(String),
    EmptyLayer(String),
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FusionError::Dates(e) => write!(f, "{}", e),
            FusionError::Gdal(e) => write!(f, "GDAL error: {}", e),
            FusionError::Raster(e) => write!(f, "{}", e),
            FusionError::Vector(e) => write!(f, "{}", e),
            FusionError::Table(e) => write!(f, "{}", e),
            FusionError::NoDates(source) => {
                write!(f, "no dated keys were found in source '{}'", source)
            }
            FusionError::EmptyTable(path) => {
                write!(f, "input table '{}' holds no records", path)
            }
            FusionError::EmptyLayer(path) => {
                write!(f, "vector layer '{}' holds no features", path)
            }
        }
    }
}

impl std::error::Error for FusionError {}

impl From<DateError> for FusionError {
    fn from(err: DateError) -> FusionError {
        FusionError::Dates(err)
    }
}

impl From<GdalError> for FusionError {
    fn from(err: GdalError) -> FusionError {
        FusionError::Gdal(err)
    }
}

impl From<RasterError> for FusionError {
    fn from(err: RasterError) -> FusionError {
        FusionError::Raster(err)
    }
}

impl From<VectorError> for FusionError {
    fn from(err: VectorError) -> FusionError {
        FusionError::Vector(err)
    }
}

impl From<TableError> for FusionError {
    fn from(err: TableError) -> FusionError {
        FusionError::Table(err)
    }
}
