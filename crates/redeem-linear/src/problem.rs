//! Training set and solver configuration assembly.
//!
//! Nothing here touches the solver engine; a [`Problem`] / [`Parameter`] pair
//! is handed to [`crate::trainer::Trainer::train`] which stages it.
use std::collections::HashMap;

use ndarray::ArrayView2;

use crate::config::SolverType;
use crate::data_handling::{parse_class_label, ClassDistribution};
use crate::error::{LinearError, Result};
use crate::sparse::SparseRows;

/// Encoded training rows with their labels.
#[derive(Debug, Clone)]
pub struct Problem {
    labels: Vec<f64>,
    rows: SparseRows,
    n_features: usize,
    bias: f64,
}

impl Problem {
    /// Build a problem from dense rows.
    ///
    /// # Arguments
    ///
    /// * `x` - One dense feature vector per row, all of the same length.
    /// * `y` - One label per row.
    /// * `bias` - Value of the synthetic intercept feature, `<= 0` disables it.
    pub fn new<R: AsRef<[f64]>>(x: &[R], y: &[f64], bias: f64) -> Result<Self> {
        let first = x.first().ok_or(LinearError::EmptyProblem)?;
        let n_features = first.as_ref().len();
        for (row, values) in x.iter().enumerate() {
            let found = values.as_ref().len();
            if found != n_features {
                return Err(LinearError::RaggedRows {
                    row,
                    expected: n_features,
                    found,
                });
            }
        }
        if y.len() != x.len() {
            return Err(LinearError::LabelCount {
                rows: x.len(),
                labels: y.len(),
            });
        }

        Ok(Problem {
            labels: y.to_vec(),
            rows: SparseRows::encode(x, bias),
            n_features,
            bias,
        })
    }

    /// Build a problem from a row-major ndarray matrix.
    pub fn from_array(x: ArrayView2<f64>, y: &[f64], bias: f64) -> Result<Self> {
        let rows: Vec<Vec<f64>> = x.outer_iter().map(|row| row.to_vec()).collect();
        Problem::new(&rows, y, bias)
    }

    /// Check that every label and encoded feature value is finite and that
    /// every label is an integer in `i32` range.
    ///
    /// Returns the first offending row in [`LinearError::NonFinite`];
    /// fractional or out-of-range labels give [`LinearError::InvalidClassLabel`].
    pub fn validate(&self) -> Result<()> {
        for (i, &label) in self.labels.iter().enumerate() {
            if !label.is_finite() {
                return Err(LinearError::NonFinite(i));
            }
            if label.fract() != 0.0 || label < i32::MIN as f64 || label > i32::MAX as f64 {
                return Err(LinearError::InvalidClassLabel(label.to_string()));
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.iter().any(|node| !node.value.is_finite()) {
                return Err(LinearError::NonFinite(i));
            }
        }
        Ok(())
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn rows(&self) -> &SparseRows {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Width of the dense rows, bias excluded.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

/// Per-class multipliers on the regularization constant C.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassWeights {
    entries: Vec<(i32, f64)>,
}

impl ClassWeights {
    /// No overrides: every class uses C unchanged.
    pub fn none() -> Self {
        Self::default()
    }

    /// Weight 1.0 for every class label present in a class distribution.
    pub fn uniform(distribution: &ClassDistribution) -> Result<Self> {
        let mut weights = ClassWeights::none();
        for label in distribution.keys() {
            weights.insert(parse_class_label(label)?, 1.0)?;
        }
        Ok(weights)
    }

    /// Caller supplied weights keyed by class label.
    pub fn from_overrides(overrides: &HashMap<String, f64>) -> Result<Self> {
        let mut parsed = overrides
            .iter()
            .map(|(label, &weight)| Ok((parse_class_label(label)?, weight)))
            .collect::<Result<Vec<(i32, f64)>>>()?;
        // HashMap order is arbitrary; keep the table stable
        parsed.sort_by_key(|&(label, _)| label);

        let mut weights = ClassWeights::none();
        for (label, weight) in parsed {
            weights.insert(label, weight)?;
        }
        Ok(weights)
    }

    pub fn insert(&mut self, label: i32, weight: f64) -> Result<()> {
        if self.entries.iter().any(|&(l, _)| l == label) {
            return Err(LinearError::DuplicateClassLabel(label));
        }
        if !(weight.is_finite() && weight > 0.0) {
            return Err(LinearError::InvalidConfig(format!(
                "Weight for class {} must be positive, got {}",
                label, weight
            )));
        }
        self.entries.push((label, weight));
        Ok(())
    }

    pub fn get(&self, label: i32) -> Option<f64> {
        self.entries
            .iter()
            .find(|&&(l, _)| l == label)
            .map(|&(_, w)| w)
    }

    pub fn labels(&self) -> Vec<i32> {
        self.entries.iter().map(|&(l, _)| l).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.entries.iter().map(|&(_, w)| w).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Solver configuration for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub solver: SolverType,
    /// Cost of constraint violation.
    pub c: f64,
    /// Stopping tolerance.
    pub eps: f64,
    pub weights: ClassWeights,
}

impl Parameter {
    pub fn new(solver: SolverType, c: f64, eps: f64) -> Self {
        Parameter {
            solver,
            c,
            eps,
            weights: ClassWeights::none(),
        }
    }

    pub fn with_weights(mut self, weights: ClassWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Reject values the solvers cannot work with.
    pub fn check(&self) -> Result<()> {
        if !(self.eps > 0.0) {
            return Err(LinearError::InvalidConfig(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if !(self.c > 0.0) || !self.c.is_finite() {
            return Err(LinearError::InvalidConfig(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::bias_index;

    #[test]
    fn rejects_empty_and_ragged_input() {
        let empty: Vec<Vec<f64>> = vec![];
        assert_eq!(
            Problem::new(&empty, &[], 0.0).unwrap_err(),
            LinearError::EmptyProblem
        );

        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(
            Problem::new(&ragged, &[1.0, -1.0], 0.0),
            Err(LinearError::RaggedRows { row: 1, expected: 2, found: 1 })
        ));

        let rows = vec![vec![1.0], vec![2.0]];
        assert!(matches!(
            Problem::new(&rows, &[1.0], 0.0),
            Err(LinearError::LabelCount { rows: 2, labels: 1 })
        ));
    }

    #[test]
    fn bias_disabled_leaves_no_reserved_index() {
        let rows = vec![vec![1.0, 0.0, 3.0], vec![0.0, 5.0, 0.0]];
        for bias in [0.0, -1.0] {
            let prob = Problem::new(&rows, &[1.0, -1.0], bias).unwrap();
            for row in prob.rows().iter() {
                assert!(row.iter().all(|n| n.index != bias_index(3)));
            }
        }
        let prob = Problem::new(&rows, &[1.0, -1.0], 1.0).unwrap();
        assert!(prob.rows().iter().all(|row| row.last().unwrap().index == 4));
    }

    #[test]
    fn validate_reports_non_finite_values() {
        let rows = vec![vec![1.0, 2.0], vec![f64::NAN, 1.0]];
        let prob = Problem::new(&rows, &[1.0, -1.0], 0.0).unwrap();
        assert_eq!(prob.validate(), Err(LinearError::NonFinite(1)));

        let rows = vec![vec![1.0, 2.0], vec![3.0, 1.0]];
        let prob = Problem::new(&rows, &[f64::INFINITY, -1.0], 0.0).unwrap();
        assert_eq!(prob.validate(), Err(LinearError::NonFinite(0)));

        let prob = Problem::new(&rows, &[1.0, -1.0], 0.0).unwrap();
        assert!(prob.validate().is_ok());
    }

    #[test]
    fn validate_rejects_fractional_labels() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 1.0]];
        let prob = Problem::new(&rows, &[0.4, 1.0], 0.0).unwrap();
        assert_eq!(
            prob.validate(),
            Err(LinearError::InvalidClassLabel("0.4".to_string()))
        );

        let prob = Problem::new(&rows, &[1.0, 3.0e10], 0.0).unwrap();
        assert!(matches!(
            prob.validate(),
            Err(LinearError::InvalidClassLabel(_))
        ));
    }

    #[test]
    fn uniform_weights_need_integer_labels() {
        let mut dist = ClassDistribution::new();
        dist.insert("1".to_string(), 4);
        dist.insert("-1".to_string(), 2);
        let weights = ClassWeights::uniform(&dist).unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights.get(-1), Some(1.0));
        assert_eq!(weights.get(1), Some(1.0));

        dist.insert("spam".to_string(), 1);
        assert_eq!(
            ClassWeights::uniform(&dist),
            Err(LinearError::InvalidClassLabel("spam".to_string()))
        );
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("1".to_string(), 2.0);
        overrides.insert("01".to_string(), 3.0);
        assert_eq!(
            ClassWeights::from_overrides(&overrides),
            Err(LinearError::DuplicateClassLabel(1))
        );
    }

    #[test]
    fn ndarray_rows_match_nested_vectors() {
        let x = ndarray::arr2(&[[1.0, 0.0], [0.0, -2.0], [3.0, 4.0]]);
        let y = [1.0, -1.0, 1.0];
        let from_array = Problem::from_array(x.view(), &y, 1.0).unwrap();
        let rows = vec![vec![1.0, 0.0], vec![0.0, -2.0], vec![3.0, 4.0]];
        let from_vecs = Problem::new(&rows, &y, 1.0).unwrap();
        assert_eq!(from_array.rows(), from_vecs.rows());
        assert_eq!(from_array.n_features(), 2);
    }

    #[test]
    fn parameter_check() {
        assert!(Parameter::new(SolverType::L2R_LR, 1.0, 0.01).check().is_ok());
        assert!(Parameter::new(SolverType::L2R_LR, 0.0, 0.01).check().is_err());
        assert!(Parameter::new(SolverType::L2R_LR, 1.0, 0.0).check().is_err());
    }
}
