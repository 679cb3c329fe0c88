use gdal::errors::GdalError;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};

/// A spatial reference with longitude/latitude axis order regardless of what
/// the authority definition declares.
pub fn spatial_ref_from_epsg(code: u32) -> Result<SpatialRef, GdalError> {
    let mut srs = SpatialRef::from_epsg(code)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

pub fn gis_order(mut srs: SpatialRef) -> SpatialRef {
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    srs
}

/// One source-to-destination coordinate transform, reusable across points.
pub struct PointProjector {
    transform: CoordTransform,
}

impl PointProjector {
    pub fn new(src: &SpatialRef, dst: &SpatialRef) -> Result<Self, GdalError> {
        Ok(Self {
            transform: CoordTransform::new(src, dst)?,
        })
    }

    #[allow(dead_code)]
    pub fn between_epsg(src: u32, dst: u32) -> Result<Self, GdalError> {
        Self::new(&spatial_ref_from_epsg(src)?, &spatial_ref_from_epsg(dst)?)
    }

    pub fn project(&self, x: f64, y: f64) -> Result<(f64, f64), GdalError> {
        let mut xs = [x];
        let mut ys = [y];
        self.transform
            .transform_coords(&mut xs, &mut ys, &mut [])?;
        Ok((xs[0], ys[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_projection() {
        // Requires a PROJ installation; bail out like any gdal-backed test
        let Ok(projector) = PointProjector::between_epsg(4326, 4326) else {
            return;
        };

        let (x, y) = projector.project(-78.5, 38.0).unwrap();
        assert!((x - -78.5).abs() < 1e-9);
        assert!((y - 38.0).abs() < 1e-9);
    }

    #[test]
    fn test_wgs84_to_web_mercator_origin() {
        let Ok(projector) = PointProjector::between_epsg(4326, 3857) else {
            return;
        };

        let (x, y) = projector.project(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }
}
