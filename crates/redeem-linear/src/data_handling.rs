//! Tabular data grids the classifiers read from and write predictions into.
//!
//! Cells are stored as packed bytes. Float attributes hold an 8-byte
//! little-endian `f64`; categorical attributes hold the index of the
//! category, packed the same way.
use std::collections::BTreeMap;

use crate::error::{LinearError, Result};

/// Class label (as rendered by the class attribute) → number of rows.
pub type ClassDistribution = BTreeMap<String, usize>;

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Float { name: String, precision: usize },
    Categorical { name: String, values: Vec<String> },
}

impl Attribute {
    pub fn float(name: &str) -> Self {
        Attribute::Float {
            name: name.to_string(),
            precision: 0,
        }
    }

    pub fn categorical(name: &str, values: Vec<String>) -> Self {
        Attribute::Categorical {
            name: name.to_string(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Attribute::Float { name, .. } | Attribute::Categorical { name, .. } => name,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Attribute::Float { .. })
    }

    /// Render a packed cell the way labels are shown to users.
    pub fn format_value(&self, bytes: &[u8]) -> String {
        let value = unpack_f64(bytes);
        match self {
            Attribute::Float { precision, .. } => format!("{:.*}", precision, value),
            Attribute::Categorical { values, .. } => values
                .get(value as usize)
                .cloned()
                .unwrap_or_else(|| format!("{}", value)),
        }
    }

    /// Integer class label stored in a packed cell.
    ///
    /// Float cells must hold an integral value within `i32` range.
    /// Categorical cells resolve to their category text, which must parse as
    /// an integer.
    pub fn class_label(&self, bytes: &[u8]) -> Result<i32> {
        let value = unpack_f64(bytes);
        match self {
            Attribute::Float { .. } => {
                if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
                    Ok(value as i32)
                } else {
                    Err(LinearError::InvalidClassLabel(value.to_string()))
                }
            }
            Attribute::Categorical { values, .. } => match values.get(value as usize) {
                Some(text) if value >= 0.0 && value.fract() == 0.0 => parse_class_label(text),
                _ => Err(LinearError::InvalidClassLabel(value.to_string())),
            },
        }
    }

    /// Packed cell holding class `label`, the inverse of [`Attribute::class_label`].
    pub fn class_cell(&self, label: i32) -> Result<[u8; 8]> {
        match self {
            Attribute::Float { .. } => Ok(pack_f64(label as f64)),
            Attribute::Categorical { values, .. } => values
                .iter()
                .position(|v| parse_class_label(v).ok() == Some(label))
                .map(|idx| pack_f64(idx as f64))
                .ok_or_else(|| LinearError::InvalidClassLabel(label.to_string())),
        }
    }
}

/// Parse a rendered class label as an integer.
pub fn parse_class_label(label: &str) -> Result<i32> {
    label
        .trim()
        .parse::<i32>()
        .map_err(|_| LinearError::InvalidClassLabel(label.to_string()))
}

/// An attribute resolved to its column position in one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub position: usize,
    pub attribute: Attribute,
}

pub fn pack_f64(value: f64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Read a packed `f64`. Short buffers are zero-padded.
pub fn unpack_f64(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    f64::from_le_bytes(buf)
}

/// Read-only view over a row-major tabular dataset.
pub trait DataGrid {
    fn all_attributes(&self) -> Vec<Attribute>;

    fn all_class_attributes(&self) -> Vec<Attribute>;

    fn rows(&self) -> usize;

    /// Raw cell bytes.
    fn get(&self, spec: &AttributeSpec, row: usize) -> &[u8];

    /// Non-class float attributes, in declaration order.
    fn non_class_float_attributes(&self) -> Vec<Attribute> {
        let classes = self.all_class_attributes();
        self.all_attributes()
            .into_iter()
            .filter(|a| a.is_float() && !classes.contains(a))
            .collect()
    }

    /// Resolve attributes to their positions, skipping unknown ones.
    fn resolve_attributes(&self, attributes: &[Attribute]) -> Vec<AttributeSpec> {
        let all = self.all_attributes();
        attributes
            .iter()
            .filter_map(|a| {
                all.iter().position(|b| b == a).map(|position| AttributeSpec {
                    position,
                    attribute: a.clone(),
                })
            })
            .collect()
    }

    /// Call `f` with the selected cells of every row, in row order.
    ///
    /// Iteration stops early when `f` returns `Ok(false)`; errors propagate.
    fn map_over_rows(
        &self,
        specs: &[AttributeSpec],
        f: &mut dyn FnMut(&[&[u8]], usize) -> Result<bool>,
    ) -> Result<()> {
        let mut cells: Vec<&[u8]> = Vec::with_capacity(specs.len());
        for row in 0..self.rows() {
            cells.clear();
            for spec in specs {
                cells.push(self.get(spec, row));
            }
            if !f(&cells, row)? {
                break;
            }
        }
        Ok(())
    }
}

/// Count rows per class label. The grid must have exactly one class attribute.
pub fn class_distribution(grid: &dyn DataGrid) -> Result<ClassDistribution> {
    let classes = grid.all_class_attributes();
    if classes.len() != 1 {
        return Err(LinearError::WrongClassCount(classes.len()));
    }
    let specs = grid.resolve_attributes(&classes);
    let spec = &specs[0];

    let mut distribution = ClassDistribution::new();
    for row in 0..grid.rows() {
        let label = spec.attribute.format_value(grid.get(spec, row));
        *distribution.entry(label).or_insert(0) += 1;
    }
    Ok(distribution)
}

/// In-memory data grid.
#[derive(Debug, Clone, Default)]
pub struct DenseGrid {
    attributes: Vec<Attribute>,
    class_flags: Vec<bool>,
    /// One packed cell per attribute per row, row-major.
    cells: Vec<[u8; 8]>,
    rows: usize,
}

impl DenseGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. Existing rows get a zero cell.
    pub fn add_attribute(&mut self, attribute: Attribute) -> AttributeSpec {
        let position = self.attributes.len();
        self.attributes.push(attribute.clone());
        self.class_flags.push(false);

        let width = self.attributes.len();
        let mut cells = Vec::with_capacity(self.rows * width);
        for row in 0..self.rows {
            let start = row * (width - 1);
            cells.extend_from_slice(&self.cells[start..start + width - 1]);
            cells.push(pack_f64(0.0));
        }
        self.cells = cells;
        AttributeSpec {
            position,
            attribute,
        }
    }

    pub fn add_class_attribute(&mut self, attribute: Attribute) -> AttributeSpec {
        let spec = self.add_attribute(attribute);
        self.class_flags[spec.position] = true;
        spec
    }

    pub fn set_class_attribute(&mut self, attribute: &Attribute, is_class: bool) -> bool {
        match self.attributes.iter().position(|a| a == attribute) {
            Some(position) => {
                self.class_flags[position] = is_class;
                true
            }
            None => false,
        }
    }

    /// Append zero-filled rows.
    pub fn extend_rows(&mut self, n: usize) {
        self.cells
            .extend(std::iter::repeat(pack_f64(0.0)).take(n * self.attributes.len()));
        self.rows += n;
    }

    /// Append a row of values, one per attribute.
    pub fn push_row(&mut self, values: &[f64]) -> Result<usize> {
        if values.len() != self.attributes.len() {
            return Err(LinearError::RaggedRows {
                row: self.rows,
                expected: self.attributes.len(),
                found: values.len(),
            });
        }
        self.cells.extend(values.iter().map(|&v| pack_f64(v)));
        self.rows += 1;
        Ok(self.rows - 1)
    }

    pub fn set(&mut self, spec: &AttributeSpec, row: usize, bytes: &[u8]) {
        let width = self.attributes.len();
        let cell = &mut self.cells[row * width + spec.position];
        *cell = [0u8; 8];
        let n = bytes.len().min(8);
        cell[..n].copy_from_slice(&bytes[..n]);
    }

    pub fn get_f64(&self, spec: &AttributeSpec, row: usize) -> f64 {
        unpack_f64(self.get(spec, row))
    }

    /// Empty grid shaped like `grid`'s predictions: same row count, class
    /// attributes only.
    pub fn generate_prediction_vector(grid: &dyn DataGrid) -> DenseGrid {
        let mut ret = DenseGrid::new();
        for attribute in grid.all_class_attributes() {
            ret.add_class_attribute(attribute);
        }
        ret.extend_rows(grid.rows());
        ret
    }
}

impl DataGrid for DenseGrid {
    fn all_attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }

    fn all_class_attributes(&self) -> Vec<Attribute> {
        self.attributes
            .iter()
            .zip(&self.class_flags)
            .filter(|(_, is_class)| **is_class)
            .map(|(a, _)| a.clone())
            .collect()
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn get(&self, spec: &AttributeSpec, row: usize) -> &[u8] {
        &self.cells[row * self.attributes.len() + spec.position]
    }
}
