use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Errors raised while building, training or querying a linear model.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearError {
    /// The feature matrix has no rows.
    EmptyProblem,
    /// A row has a different width than the first row.
    RaggedRows { row: usize, expected: usize, found: usize },
    /// Number of labels differs from the number of rows.
    LabelCount { rows: usize, labels: usize },
    /// NaN or infinite value found in labels or features (row index).
    NonFinite(usize),
    /// The data grid does not declare exactly one class attribute.
    WrongClassCount(usize),
    /// Unknown penalty / loss name or unsupported combination.
    InvalidConfig(String),
    /// A class label could not be used as an integer class id.
    InvalidClassLabel(String),
    /// The same class label appears twice in a weight table.
    DuplicateClassLabel(i32),
    /// Feature attributes at predict time differ from the fitted ones.
    SchemaMismatch { expected: Vec<String>, found: Vec<String> },
    /// Predict or export was called before fit.
    NotFitted,
    /// The solver reported a non-zero status while writing the model.
    Export { path: PathBuf, status: i32 },
    /// The solver could not read a model from the given file.
    Load { path: PathBuf },
}

impl LinearError {
    /// Precondition violations are programmer errors; the caller should stop
    /// rather than inspect and retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinearError::NonFinite(_) | LinearError::WrongClassCount(_))
    }
}

impl fmt::Display for LinearError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinearError::EmptyProblem => write!(f, "Feature matrix has no rows"),
            LinearError::RaggedRows { row, expected, found } => write!(
                f,
                "Row {} has {} features, expected {}",
                row, found, expected
            ),
            LinearError::LabelCount { rows, labels } => write!(
                f,
                "Got {} labels for {} rows",
                labels, rows
            ),
            LinearError::NonFinite(row) => write!(
                f,
                "Invalid input data: found NaN or Inf values (row {})",
                row
            ),
            LinearError::WrongClassCount(n) => write!(f, "{} Wrong number of classes", n),
            LinearError::InvalidConfig(msg) => write!(f, "{}", msg),
            LinearError::InvalidClassLabel(label) => {
                write!(f, "Class label '{}' is not an integer", label)
            }
            LinearError::DuplicateClassLabel(label) => {
                write!(f, "Class label {} is weighted more than once", label)
            }
            LinearError::SchemaMismatch { expected, found } => write!(
                f,
                "Feature attributes {:?} do not match fitted attributes {:?}",
                found, expected
            ),
            LinearError::NotFitted => write!(f, "Model has not been fitted"),
            LinearError::Export { path, status } => write!(
                f,
                "Problem occurred during export to {} (status was {})",
                path.display(),
                status
            ),
            LinearError::Load { path } => {
                write!(f, "Failed to load model from {}", path.display())
            }
        }
    }
}

impl Error for LinearError {}

pub type Result<T> = std::result::Result<T, LinearError>;
