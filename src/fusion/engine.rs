use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{AmplitudeSource, DisplacementSource, FusionConfig, Period, ScattererSource};
use crate::dates::{self, DateWindow, DatedEntry, Processing};
use crate::fusion::FusionError;
use crate::fusion::differential::DifferentialAccumulator;
use crate::fusion::merge;
use crate::project::{self, PointProjector};
use crate::raster::{self, RasterSampler};
use crate::spatial::{PointIndex, approx_distance_m};
use crate::table::{Column, Table};
use crate::vector::VectorLayer;

/// Column attached to the records matched against a displacement layer.
const DISTANCE_LABEL: &str = "Aprx. Distance (m)";

/// Summary of one fusion run.
#[derive(Debug)]
pub struct FusionReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_out: usize,
    pub outputs: Vec<PathBuf>,
}

/// Drives a whole fusion run: reads the record table, walks each configured
/// source in a fixed order (amplitude stack, displacement layer, scatterer
/// stack), attaches the sampled columns and writes the outputs.
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<FusionReport, FusionError> {
        let mut table = Table::from_csv_path(self.config.table())?;
        let rows_in = table.rows();
        if rows_in == 0 {
            return Err(FusionError::EmptyTable(self.config.table().to_string()));
        }
        info!("read {} records from {}", rows_in, self.config.table());

        table.fill_invalid(0.0);

        let year = table.float(self.config.year_column())?[0] as i32;
        let window = self.date_window(&table, year)?;
        info!(
            "sampling epochs between {} and {} ({} period)",
            window.min,
            window.max,
            self.config.period()
        );

        let mut attached: Vec<String> = Vec::new();

        if let Some(source) = self.config.amplitude() {
            self.amplitude_pass(source, &mut table, &window, &mut attached)?;
        }
        if let Some(source) = self.config.displacement() {
            self.displacement_pass(source, &mut table, &window, &mut attached)?;
        }
        if let Some(source) = self.config.scatterer() {
            self.scatterer_pass(source, &mut table, &mut attached)?;
        }

        self.attach_condition_classes(&mut table)?;
        let output = self.assemble_output(&table, &attached)?;

        let base = self.output_basename(year);
        let dir = Path::new(self.config.output_dir());

        let summary_path = dir.join(format!("{base}.csv"));
        output.write_csv(&summary_path)?;
        let snapshot_path = dir.join(format!("{base}.bin"));
        output.write_snapshot(&snapshot_path)?;
        let full_path = dir.join(format!("{base}_full.csv"));
        table.write_csv(&full_path)?;

        Ok(FusionReport {
            rows_in,
            rows_out: output.rows(),
            columns_out: output.width(),
            outputs: vec![summary_path, snapshot_path, full_path],
        })
    }

    /// The epoch selection window for this run. The tested-date column is
    /// only read under the trailing-year period; a blank date cell (zero
    /// after invalid fill) must not abort a winter or all-epochs run.
    fn date_window(&self, table: &Table, year: i32) -> Result<DateWindow, FusionError> {
        let tested = match self.config.period() {
            Period::Year => self.tested_dates(table)?,
            _ => Vec::new(),
        };
        Ok(DateWindow::for_period(self.config.period(), year, &tested)?)
    }

    fn tested_dates(&self, table: &Table) -> Result<Vec<NaiveDate>, FusionError> {
        table
            .float(self.config.date_column())?
            .iter()
            .map(|&v| dates::parse_compact_date(v).map_err(FusionError::from))
            .collect()
    }

    /// Rows disqualified by a negative value in any correlation field; a
    /// negative condition index marks an untested section.
    fn bad_rows(&self, table: &Table) -> Result<Vec<bool>, FusionError> {
        let mut bad = vec![false; table.rows()];
        for field in self.config.correlation_base_fields() {
            for (flag, &v) in bad.iter_mut().zip(table.float(&field)?) {
                if v < 0.0 {
                    *flag = true;
                }
            }
        }
        Ok(bad)
    }

    /// Opens one raster, reprojects the record coordinates into its spatial
    /// reference and looks up the pixel under every record. No-data pixels
    /// read as NaN; zero is additionally invalid for amplitude backscatter.
    fn sample_raster(
        &self,
        path: &Path,
        coords: &[(f64, f64)],
        zero_invalid: bool,
    ) -> Result<Vec<f64>, FusionError> {
        let sampler = RasterSampler::open(path)?;
        let source = project::spatial_ref_from_epsg(self.config.epsg())?;
        let projector = PointProjector::new(&source, &sampler.spatial_ref()?)?;
        let raster_no_data = sampler.no_data_value()?;

        let mut values = Vec::with_capacity(coords.len());
        for &(x, y) in coords {
            let (px, py) = projector.project(x, y)?;
            let v = sampler.sample_point(px, py)?;
            let invalid = v.is_nan()
                || v == self.config.no_data()
                || raster_no_data == Some(v)
                || (zero_invalid && v == 0.0);
            values.push(if invalid { f64::NAN } else { v });
        }
        Ok(values)
    }

    /// Samples the dated amplitude stack under every record, attaching one
    /// column per in-window epoch plus the derived rate-of-change fields.
    /// Unless bad rows are kept, records left without a valid sample are
    /// removed before the next pass.
    fn amplitude_pass(
        &self,
        source: &AmplitudeSource,
        table: &mut Table,
        window: &DateWindow,
        attached: &mut Vec<String>,
    ) -> Result<(), FusionError> {
        let stack = raster::load_stack(&source.pattern)?;
        let keys = stack_keys(&stack);
        let dates = dates::classify_stack(&keys, window, self.config.differential(), &source.prefix)?
            .ok_or_else(|| FusionError::NoDates(source.pattern.clone()))?;

        let coords = table.coordinates(self.config.lon_column(), self.config.lat_column())?;
        let bad = self.bad_rows(table)?;
        let mut acc = DifferentialAccumulator::new();

        for (path, key) in stack.iter().zip(&keys) {
            let Some(entry) = dates.get(key) else {
                continue;
            };
            if entry.processing == Processing::Skip {
                continue;
            }

            let mut values = self.sample_raster(path, &coords, true)?;
            for (v, &is_bad) in values.iter_mut().zip(&bad) {
                if is_bad {
                    *v = f64::NAN;
                }
            }

            match entry.processing {
                Processing::DifferentialBoundary => acc.anchor(values),
                Processing::Full => {
                    info!("attaching {} from {}", entry.date_tag, path.display());
                    if self.config.differential() {
                        acc.step(&entry.date_tag, entry.months, values.clone());
                    }
                    table.push(&entry.date_tag, Column::Float(values))?;
                    attached.push(entry.date_tag.clone());
                }
                Processing::Skip => unreachable!(),
            }
        }

        for (name, rates) in acc.into_fields() {
            table.push(&name, Column::Float(rates))?;
            attached.push(name);
        }

        if !self.config.keep_bad() {
            let removed = table.drop_invalid();
            info!("dropped {} records without a valid amplitude sample", removed);
        }
        Ok(())
    }

    /// Joins each record to its nearest displacement scatterer and copies the
    /// neighbor's attributes over: dated displacement labels go through the
    /// window classification, everything else is carried as-is. Records
    /// outside the layer envelope are clipped away first.
    fn displacement_pass(
        &self,
        source: &DisplacementSource,
        table: &mut Table,
        window: &DateWindow,
        attached: &mut Vec<String>,
    ) -> Result<(), FusionError> {
        let target = project::spatial_ref_from_epsg(self.config.epsg())?;
        let layer = VectorLayer::open(&source.path, &target)?;
        let Some(extent) = layer.extent() else {
            return Err(FusionError::EmptyLayer(source.path.clone()));
        };

        let coords = table.coordinates(self.config.lon_column(), self.config.lat_column())?;
        let keep: Vec<bool> = coords
            .iter()
            .map(|&(x, y)| x >= extent.0 && x <= extent.2 && y >= extent.1 && y <= extent.3)
            .collect();
        let clipped = keep.iter().filter(|&&k| !k).count();
        if clipped > 0 {
            info!("clipped {} records outside the displacement layer extent", clipped);
            table.retain(&keep);
        }

        let coords = table.coordinates(self.config.lon_column(), self.config.lat_column())?;
        let index = PointIndex::build(layer.points().to_vec());
        let matches: Vec<usize> = coords
            .iter()
            .filter_map(|&(x, y)| index.nearest(x, y).map(|n| n.index))
            .collect();
        let neighbors = layer.attributes().gather(&matches);

        let distances: Vec<f64> = coords
            .iter()
            .zip(&matches)
            .map(|(&(x, y), &m)| {
                let (px, py) = layer.points()[m];
                approx_distance_m(x, y, px, py)
            })
            .collect();

        let (dated, plain): (Vec<String>, Vec<String>) = neighbors
            .names()
            .iter()
            .cloned()
            .partition(|name| dates::is_dated_label(name, &source.prefix));

        let entries =
            dates::classify_stack(&dated, window, self.config.differential(), &source.prefix)?
                .ok_or_else(|| FusionError::NoDates(source.path.clone()))?;
        self.attach_displacement_columns(table, &neighbors, &dated, &entries, attached)?;

        for name in &plain {
            if let Some(column) = neighbors.column(name) {
                table.push(name, column.clone())?;
                attached.push(name.clone());
            }
        }

        table.push(DISTANCE_LABEL, Column::Float(distances))?;
        attached.push(DISTANCE_LABEL.to_string());
        Ok(())
    }

    fn attach_displacement_columns(
        &self,
        table: &mut Table,
        neighbors: &Table,
        dated: &[String],
        entries: &HashMap<String, DatedEntry>,
        attached: &mut Vec<String>,
    ) -> Result<(), FusionError> {
        let mut acc = DifferentialAccumulator::new();
        for label in dated {
            let Some(entry) = entries.get(label) else {
                continue;
            };
            if entry.processing == Processing::Skip {
                continue;
            }
            let values = neighbors.float(label)?.to_vec();
            match entry.processing {
                Processing::DifferentialBoundary => acc.anchor(values),
                Processing::Full => {
                    if self.config.differential() {
                        acc.step(&entry.date_tag, entry.months, values.clone());
                    }
                    table.push(label, Column::Float(values))?;
                    attached.push(label.clone());
                }
                Processing::Skip => unreachable!(),
            }
        }

        for (name, rates) in acc.into_fields() {
            table.push(&name, Column::Float(rates))?;
            attached.push(name);
        }
        Ok(())
    }

    /// Samples every scatterer velocity raster, then merges each keyword
    /// family into one `TS_<keyword>` column by element-wise maximum.
    fn scatterer_pass(
        &self,
        source: &ScattererSource,
        table: &mut Table,
        attached: &mut Vec<String>,
    ) -> Result<(), FusionError> {
        let stack = raster::load_stack(&source.pattern)?;
        let families = merge::assign_families(&source.keywords, &stack);

        let coords = table.coordinates(self.config.lon_column(), self.config.lat_column())?;

        for (keyword, files) in families {
            if files.is_empty() {
                warn!("no scatterer raster matched keyword '{}'", keyword);
            }
            let mut series = Vec::with_capacity(files.len());
            for path in &files {
                series.push(self.sample_raster(path, &coords, false)?);
            }
            let merged = merge::merge_max(table.rows(), &series);

            let label = format!("TS_{keyword}");
            info!("attaching {} merged from {} rasters", label, files.len());
            table.push(&label, Column::Float(merged))?;
            attached.push(label);
        }

        if !self.config.keep_bad() {
            let removed = table.drop_invalid();
            info!("dropped {} records without a valid scatterer sample", removed);
        }
        Ok(())
    }

    /// Computes the bucketed class column for every correlation field named
    /// `<base> Class`, overwriting a same-named input column if one exists.
    fn attach_condition_classes(&self, table: &mut Table) -> Result<(), FusionError> {
        for field in self.config.correlation_fields() {
            let Some(base) = field.strip_suffix(" Class") else {
                continue;
            };
            let classes = condition_classes(table.float(base)?);
            let column = Column::Float(classes);
            if table.column(field).is_some() {
                table.replace(field, column)?;
            } else {
                table.push(field, column)?;
            }
        }
        Ok(())
    }

    /// The exchange table: source coordinates first, then the correlation
    /// fields and every attached column, in attachment order.
    fn assemble_output(&self, table: &Table, attached: &[String]) -> Result<Table, FusionError> {
        let mut names: Vec<String> = self.config.correlation_fields().to_vec();
        names.extend(attached.iter().cloned());

        let mut output = table.select(&names)?;
        output.insert_front(
            "Source Latitude",
            Column::Float(table.float(self.config.lat_column())?.to_vec()),
        )?;
        output.insert_front(
            "Source Longitude",
            Column::Float(table.float(self.config.lon_column())?.to_vec()),
        )?;
        Ok(output)
    }

    /// `<prepend><year>_<period>[_AMP][_SHP][_TS][_DIF]_<field|many>`
    fn output_basename(&self, year: i32) -> String {
        let mut name = format!(
            "{}{}_{}",
            self.config.prepend(),
            year,
            self.config.period()
        );
        if self.config.amplitude().is_some() {
            name.push_str("_AMP");
        }
        if self.config.displacement().is_some() {
            name.push_str("_SHP");
        }
        if self.config.scatterer().is_some() {
            name.push_str("_TS");
        }
        if self.config.differential() {
            name.push_str("_DIF");
        }
        let fields = match self.config.correlation_fields() {
            [single] => single.replace(' ', "_"),
            _ => "many".to_string(),
        };
        format!("{name}_{fields}")
    }
}

/// Pavement condition class from a continuous condition index. Buckets are
/// right-open except the top one; an index above 100 or NaN stays invalid.
fn condition_classes(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            if v < 50.0 {
                0.0
            } else if v < 60.0 {
                1.0
            } else if v < 70.0 {
                2.0
            } else if v < 90.0 {
                3.0
            } else if v <= 100.0 {
                4.0
            } else {
                f64::NAN
            }
        })
        .collect()
}

fn stack_keys(stack: &[PathBuf]) -> Vec<String> {
    stack
        .iter()
        .map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}
