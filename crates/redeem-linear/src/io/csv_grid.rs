//! Delimited text reader producing a [`DenseGrid`].
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::data_handling::{Attribute, DataGrid, DenseGrid};

/// Configuration for reading delimited files into a grid.
#[derive(Debug, Clone)]
pub struct CsvGridConfig {
    /// Column holding the class label.
    pub class_column: String,
    pub delimiter: u8,
}

impl Default for CsvGridConfig {
    fn default() -> Self {
        Self {
            class_column: "label".to_string(),
            delimiter: b',',
        }
    }
}

/// Read a comma separated file with a header row. `class_column` becomes the
/// grid's single class attribute.
pub fn read_csv_grid<P: AsRef<Path>>(path: P, class_column: &str) -> Result<DenseGrid> {
    let config = CsvGridConfig {
        class_column: class_column.to_string(),
        ..CsvGridConfig::default()
    };
    read_csv_grid_with_config(path, &config)
}

/// Read a delimited file using a custom configuration.
///
/// Columns whose values all parse as numbers become float attributes; any
/// other column becomes a categorical attribute with its categories in
/// first-seen order.
pub fn read_csv_grid_with_config<P: AsRef<Path>>(path: P, config: &CsvGridConfig) -> Result<DenseGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open grid file: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let class_idx = find_column(&headers, &config.class_column)
        .ok_or_else(|| anyhow!("Missing class column '{}'", config.class_column))?;

    let records = reader
        .records()
        .enumerate()
        .map(|(row_idx, result)| {
            result.with_context(|| format!("Failed to read row {}", row_idx + 1))
        })
        .collect::<Result<Vec<StringRecord>>>()?;

    let columns: Vec<Column> = (0..headers.len())
        .map(|idx| Column::infer(headers.get(idx).unwrap_or(""), idx, &records))
        .collect();

    let mut grid = DenseGrid::new();
    for (idx, column) in columns.iter().enumerate() {
        if idx == class_idx {
            grid.add_class_attribute(column.attribute.clone());
        } else {
            grid.add_attribute(column.attribute.clone());
        }
    }

    let mut values = Vec::with_capacity(columns.len());
    for (row_idx, record) in records.iter().enumerate() {
        values.clear();
        for column in &columns {
            let cell = record.get(column.idx).ok_or_else(|| {
                anyhow!(
                    "Missing value in column '{}' at row {}",
                    column.attribute.name(),
                    row_idx + 1
                )
            })?;
            values.push(column.value(cell));
        }
        grid.push_row(&values)
            .with_context(|| format!("Invalid row {}", row_idx + 1))?;
    }

    log::debug!(
        "Read {} rows x {} columns from {}",
        grid.rows(),
        columns.len(),
        path.as_ref().display()
    );
    Ok(grid)
}

struct Column {
    idx: usize,
    attribute: Attribute,
}

impl Column {
    fn infer(name: &str, idx: usize, records: &[StringRecord]) -> Self {
        let numeric = records
            .iter()
            .all(|r| r.get(idx).map_or(true, |v| v.parse::<f64>().is_ok()));
        let attribute = if numeric {
            Attribute::float(name)
        } else {
            let mut categories: Vec<String> = Vec::new();
            for value in records.iter().filter_map(|r| r.get(idx)) {
                if !categories.iter().any(|c| c == value) {
                    categories.push(value.to_string());
                }
            }
            Attribute::categorical(name, categories)
        };
        Column { idx, attribute }
    }

    fn value(&self, cell: &str) -> f64 {
        match &self.attribute {
            Attribute::Float { .. } => cell.parse::<f64>().unwrap_or(f64::NAN),
            Attribute::Categorical { values, .. } => values
                .iter()
                .position(|v| v == cell)
                .map_or(f64::NAN, |i| i as f64),
        }
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}
