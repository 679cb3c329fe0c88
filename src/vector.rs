use gdal::Dataset;
use gdal::errors::GdalError;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{FieldValue, LayerAccess};
use std::fmt;
use std::path::Path;

use crate::project::{self, PointProjector};
use crate::table::{Column, Table, TableError};

/// Column labels for the reprojected layer point coordinates.
pub const X_LABEL: &str = "SHP_X";
pub const Y_LABEL: &str = "SHP_Y";

#[derive(Debug)]
pub enum VectorError {
    Gdal(GdalError),
    NoSpatialRef(String),
    Table(TableError),
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorError::Gdal(e) => write!(f, "GDAL error: {}", e),
            VectorError::NoSpatialRef(path) => {
                write!(f, "layer '{}' declares no spatial reference", path)
            }
            VectorError::Table(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for VectorError {}

impl From<GdalError> for VectorError {
    fn from(err: GdalError) -> VectorError {
        VectorError::Gdal(err)
    }
}

impl From<TableError> for VectorError {
    fn from(err: TableError) -> VectorError {
        VectorError::Table(err)
    }
}

enum Cell {
    Num(f64),
    Str(String),
    Null,
}

/// A static point layer: reprojected coordinates plus the attribute table.
/// The first two attribute columns are the coordinates themselves, so a
/// joined record carries its neighbor's location.
pub struct VectorLayer {
    points: Vec<(f64, f64)>,
    attributes: Table,
}

impl VectorLayer {
    /// Opens the first layer of a point dataset and reprojects every feature
    /// into `dst`. Features without geometry are dropped.
    pub fn open<P: AsRef<Path>>(path: P, dst: &SpatialRef) -> Result<Self, VectorError> {
        let path = path.as_ref();
        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;

        let src = layer
            .spatial_ref()
            .ok_or_else(|| VectorError::NoSpatialRef(path.display().to_string()))?;
        let projector = PointProjector::new(&project::gis_order(src), dst)?;

        let field_names: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();

        let mut points = Vec::new();
        let mut cells: Vec<Vec<Cell>> = field_names.iter().map(|_| Vec::new()).collect();

        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                continue;
            };
            let (x, y, _) = geometry.get_point(0);
            points.push(projector.project(x, y)?);

            for (slot, name) in cells.iter_mut().zip(&field_names) {
                slot.push(cell_from_field(feature.field(feature.field_index(name)?)?));
            }
        }

        let mut attributes = Table::new();
        attributes.push(
            X_LABEL,
            Column::Float(points.iter().map(|p| p.0).collect()),
        )?;
        attributes.push(
            Y_LABEL,
            Column::Float(points.iter().map(|p| p.1).collect()),
        )?;
        for (name, column) in field_names.iter().zip(cells) {
            attributes.push(name, column_from_cells(column))?;
        }

        Ok(Self { points, attributes })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn attributes(&self) -> &Table {
        &self.attributes
    }

    /// Envelope of the reprojected points as (xmin, ymin, xmax, ymax).
    pub fn extent(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        let mut extent = (first.0, first.1, first.0, first.1);
        for &(x, y) in &self.points[1..] {
            extent.0 = extent.0.min(x);
            extent.1 = extent.1.min(y);
            extent.2 = extent.2.max(x);
            extent.3 = extent.3.max(y);
        }
        Some(extent)
    }
}

fn cell_from_field(value: Option<FieldValue>) -> Cell {
    match value {
        Some(FieldValue::IntegerValue(v)) => Cell::Num(v as f64),
        Some(FieldValue::Integer64Value(v)) => Cell::Num(v as f64),
        Some(FieldValue::RealValue(v)) => Cell::Num(v),
        Some(FieldValue::StringValue(v)) => Cell::Str(v),
        // List and date field types are not meaningful for scatterer
        // attributes; they read as null.
        Some(_) => Cell::Null,
        None => Cell::Null,
    }
}

fn column_from_cells(cells: Vec<Cell>) -> Column {
    if cells.iter().any(|c| matches!(c, Cell::Str(_))) {
        Column::Text(
            cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Str(s) => s,
                    Cell::Num(v) => format!("{}", v),
                    Cell::Null => String::new(),
                })
                .collect(),
        )
    } else {
        Column::Float(
            cells
                .into_iter()
                .map(|cell| match cell {
                    Cell::Num(v) => v,
                    _ => f64::NAN,
                })
                .collect(),
        )
    }
}
