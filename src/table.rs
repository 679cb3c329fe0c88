use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Debug)]
pub enum TableError {
    Io(std::io::Error),
    Csv(csv::Error),
    Snapshot(bincode::Error),
    MissingColumn(String),
    NotNumeric(String),
    DuplicateColumn(String),
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Io(e) => write!(f, "I/O error: {}", e),
            TableError::Csv(e) => write!(f, "CSV error: {}", e),
            TableError::Snapshot(e) => write!(f, "snapshot error: {}", e),
            TableError::MissingColumn(name) => write!(f, "no column named '{}'", name),
            TableError::NotNumeric(name) => write!(f, "column '{}' is not numeric", name),
            TableError::DuplicateColumn(name) => {
                write!(f, "column '{}' already exists", name)
            }
            TableError::LengthMismatch {
                column,
                expected,
                actual,
            } => write!(
                f,
                "column '{}' has {} rows, expected {}",
                column, actual, expected
            ),
        }
    }
}

impl std::error::Error for TableError {}

impl From<std::io::Error> for TableError {
    fn from(err: std::io::Error) -> TableError {
        TableError::Io(err)
    }
}

impl From<csv::Error> for TableError {
    fn from(err: csv::Error) -> TableError {
        TableError::Csv(err)
    }
}

/// One named column; NaN is the invalid sentinel in float columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Column {
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory table of named, ordered columns; one row per record.
/// Fields are append-only while fusion proceeds, rows are only removed in
/// bulk invalid-row passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a CSV file with a header row. A column becomes numeric when
    /// every non-empty cell parses as a float; empty cells read as NaN.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let file = File::open(path.as_ref())?;
        let mut reader = csv::Reader::from_reader(BufReader::new(file));

        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];

        for record in reader.records() {
            let record = record?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        let columns = cells.into_iter().map(column_from_cells).collect();
        Ok(Self { names, columns })
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn float(&self, name: &str) -> Result<&[f64], TableError> {
        match self.column(name) {
            Some(Column::Float(values)) => Ok(values),
            Some(Column::Text(_)) => Err(TableError::NotNumeric(name.to_string())),
            None => Err(TableError::MissingColumn(name.to_string())),
        }
    }

    fn check_new(&self, name: &str, column: &Column) -> Result<(), TableError> {
        if self.position(name).is_some() {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        if !self.columns.is_empty() && column.len() != self.rows() {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows(),
                actual: column.len(),
            });
        }
        Ok(())
    }

    pub fn push(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        self.check_new(name, &column)?;
        self.names.push(name.to_string());
        self.columns.push(column);
        Ok(())
    }

    pub fn insert_front(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        self.check_new(name, &column)?;
        self.names.insert(0, name.to_string());
        self.columns.insert(0, column);
        Ok(())
    }

    /// Replaces the contents of an existing column, keeping its position.
    pub fn replace(&mut self, name: &str, column: Column) -> Result<(), TableError> {
        if column.len() != self.rows() {
            return Err(TableError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows(),
                actual: column.len(),
            });
        }
        let index = self
            .position(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        self.columns[index] = column;
        Ok(())
    }

    #[allow(dead_code)]
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        if self.position(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        let index = self
            .position(from)
            .ok_or_else(|| TableError::MissingColumn(from.to_string()))?;
        self.names[index] = to.to_string();
        Ok(())
    }

    /// Replaces NaN with `value` in every float column.
    pub fn fill_invalid(&mut self, value: f64) {
        for column in &mut self.columns {
            if let Column::Float(values) = column {
                for v in values.iter_mut() {
                    if v.is_nan() {
                        *v = value;
                    }
                }
            }
        }
    }

    /// Keeps only the rows flagged true. `keep` must be one flag per row.
    pub fn retain(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.rows());
        for column in &mut self.columns {
            match column {
                Column::Float(values) => {
                    let mut row = 0;
                    values.retain(|_| {
                        let kept = keep[row];
                        row += 1;
                        kept
                    });
                }
                Column::Text(values) => {
                    let mut row = 0;
                    values.retain(|_| {
                        let kept = keep[row];
                        row += 1;
                        kept
                    });
                }
            }
        }
    }

    /// Removes every row holding a NaN in any float column; returns the
    /// number of rows removed.
    pub fn drop_invalid(&mut self) -> usize {
        let rows = self.rows();
        let mut keep = vec![true; rows];
        for column in &self.columns {
            if let Column::Float(values) = column {
                for (flag, v) in keep.iter_mut().zip(values) {
                    if v.is_nan() {
                        *flag = false;
                    }
                }
            }
        }

        let kept = keep.iter().filter(|&&k| k).count();
        self.retain(&keep);
        rows - kept
    }

    pub fn coordinates(&self, lon: &str, lat: &str) -> Result<Vec<(f64, f64)>, TableError> {
        let lons = self.float(lon)?;
        let lats = self.float(lat)?;
        Ok(lons.iter().copied().zip(lats.iter().copied()).collect())
    }

    /// A new table holding the named columns in the given order.
    pub fn select(&self, names: &[String]) -> Result<Table, TableError> {
        let mut table = Table::new();
        for name in names {
            let column = self
                .column(name)
                .ok_or_else(|| TableError::MissingColumn(name.clone()))?;
            table.push(name, column.clone())?;
        }
        Ok(table)
    }

    /// A new table holding, per column, the values at the given row indices.
    /// Used to align matched neighbor attributes with the record set.
    pub fn gather(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|column| match column {
                Column::Float(values) => {
                    Column::Float(rows.iter().map(|&r| values[r]).collect())
                }
                Column::Text(values) => {
                    Column::Text(rows.iter().map(|&r| values[r].clone()).collect())
                }
            })
            .collect();
        Table {
            names: self.names.clone(),
            columns,
        }
    }

    /// Row-oriented exchange output; NaN writes as an empty field.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let file = File::create(path.as_ref())?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));

        writer.write_record(&self.names)?;
        for row in 0..self.rows() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|column| match column {
                    Column::Float(values) => {
                        let v = values[row];
                        if v.is_nan() {
                            String::new()
                        } else {
                            format!("{}", v)
                        }
                    }
                    Column::Text(values) => values[row].clone(),
                })
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Persisted binary snapshot of the whole table.
    pub fn write_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let file = File::create(path.as_ref())?;
        bincode::serialize_into(BufWriter::new(file), self).map_err(TableError::Snapshot)
    }

    #[allow(dead_code)]
    pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Table, TableError> {
        let file = File::open(path.as_ref())?;
        bincode::deserialize_from(BufReader::new(file)).map_err(TableError::Snapshot)
    }
}

fn column_from_cells(cells: Vec<String>) -> Column {
    let mut floats = Vec::with_capacity(cells.len());
    for cell in &cells {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            floats.push(f64::NAN);
            continue;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => floats.push(v),
            Err(_) => return Column::Text(cells),
        }
    }
    Column::Float(floats)
}
