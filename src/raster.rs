use gdal::Dataset;
use gdal::errors::GdalError;
use gdal::spatial_ref::SpatialRef;
use glob::glob;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::project;

#[derive(Debug)]
pub enum RasterError {
    Gdal(GdalError),
    NoGeoreference(String),
    Pattern(glob::PatternError),
    EmptyStack(String),
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::Gdal(e) => write!(f, "GDAL error: {}", e),
            RasterError::NoGeoreference(path) => {
                write!(f, "raster '{}' has no georeferencing", path)
            }
            RasterError::Pattern(e) => write!(f, "invalid stack pattern: {}", e),
            RasterError::EmptyStack(pattern) => {
                write!(f, "no raster files were selected using '{}'", pattern)
            }
        }
    }
}

impl std::error::Error for RasterError {}

impl From<GdalError> for RasterError {
    fn from(err: GdalError) -> RasterError {
        RasterError::Gdal(err)
    }
}

impl From<glob::PatternError> for RasterError {
    fn from(err: glob::PatternError) -> RasterError {
        RasterError::Pattern(err)
    }
}

/// Pixel geometry of a north-up raster: origin, pixel size and dimensions.
/// `pixel_h` is conventionally negative.
#[derive(Debug, Clone, Copy)]
pub struct RasterGeometry {
    pub origin_x: f64,
    pub pixel_w: f64,
    pub origin_y: f64,
    pub pixel_h: f64,
    pub cols: isize,
    pub rows: isize,
}

impl RasterGeometry {
    /// Pixel containing the projected point.
    pub fn pixel(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.origin_x) / self.pixel_w).floor() as isize;
        let row = ((y - self.origin_y) / self.pixel_h).floor() as isize;
        (col, row)
    }

    pub fn contains(&self, col: isize, row: isize) -> bool {
        col >= 0 && col < self.cols && row >= 0 && row < self.rows
    }
}

/// Single-band point lookup over one open raster. The dataset handle is
/// released on drop, so samplers are scoped to one stack iteration.
pub struct RasterSampler {
    dataset: Dataset,
    geometry: RasterGeometry,
}

impl RasterSampler {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let dataset = Dataset::open(path)?;
        let transform = dataset
            .geo_transform()
            .map_err(|_| RasterError::NoGeoreference(path.display().to_string()))?;
        let (cols, rows) = dataset.raster_size();

        let geometry = RasterGeometry {
            origin_x: transform[0],
            pixel_w: transform[1],
            origin_y: transform[3],
            pixel_h: transform[5],
            cols: cols as isize,
            rows: rows as isize,
        };

        Ok(Self { dataset, geometry })
    }

    #[allow(dead_code)]
    pub fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    pub fn spatial_ref(&self) -> Result<SpatialRef, RasterError> {
        Ok(project::gis_order(self.dataset.spatial_ref()?))
    }

    pub fn no_data_value(&self) -> Result<Option<f64>, RasterError> {
        Ok(self.dataset.rasterband(1)?.no_data_value())
    }

    pub fn sample(&self, col: isize, row: isize) -> Result<f64, RasterError> {
        let band = self.dataset.rasterband(1)?;
        let buffer = band.read_as::<f64>((col, row), (1, 1), (1, 1), None)?;
        Ok(buffer[(0, 0)])
    }

    /// Looks up the pixel under a projected point; NaN when the point falls
    /// outside the raster extent. No-data checks are left to the caller,
    /// whose policy differs per pass.
    pub fn sample_point(&self, x: f64, y: f64) -> Result<f64, RasterError> {
        let (col, row) = self.geometry.pixel(x, y);
        if !self.geometry.contains(col, row) {
            return Ok(f64::NAN);
        }
        self.sample(col, row)
    }
}

/// Expands a glob pattern into a date-sorted stack of GeoTIFF paths.
/// Lexical order sorts by the embedded `YYYYMMDD` token for uniform names.
pub fn load_stack(pattern: &str) -> Result<Vec<PathBuf>, RasterError> {
    let mut files: Vec<PathBuf> = glob(pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("tif"))
        .collect();

    if files.is_empty() {
        return Err(RasterError::EmptyStack(pattern.to_string()));
    }

    files.sort();
    Ok(files)
}
