use std::path::Path;

use crate::data_handling::{DataGrid, DenseGrid};
use crate::error::Result;

/// Trainable / queryable classifier over a data grid with a single class
/// attribute.
pub trait Classifier {
    /// Fit on every non-class float attribute of `grid`, in declaration order.
    fn fit(&mut self, grid: &dyn DataGrid) -> Result<()>;

    /// One prediction per row, written into a fresh grid holding only the
    /// class attribute. `grid` is left untouched.
    fn predict(&self, grid: &dyn DataGrid) -> Result<DenseGrid>;

    /// Write the fitted model to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
