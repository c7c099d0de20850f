use std::collections::HashMap;
use std::path::Path;

use crate::config::SolverType;
use crate::data_handling::{DataGrid, DenseGrid};
use crate::error::{LinearError, Result};
use crate::models::adapter::GridAdapter;
use crate::models::classifier_trait::Classifier;
use crate::problem::{ClassWeights, Parameter};
use crate::trainer::{Model, Trainer};

/// Linear support vector classifier over a data grid.
///
/// | penalty | loss | dual  | solver                |
/// |---------|------|-------|-----------------------|
/// | l2      | l1   | true  | `L2R_L1LOSS_SVC_DUAL` |
/// | l2      | l2   | true  | `L2R_L2LOSS_SVC_DUAL` |
/// | l2      | l2   | false | `L2R_L2LOSS_SVC`      |
/// | l1      | l2   | false | `L1R_L2LOSS_SVC`      |
pub struct LinearSvc {
    inner: GridAdapter,
}

impl LinearSvc {
    pub fn new(loss: &str, penalty: &str, dual: bool, c: f64, eps: f64) -> Result<Self> {
        let solver = SolverType::for_svc(loss, penalty, dual).map_err(LinearError::InvalidConfig)?;
        Self::with_solver(solver, c, eps)
    }

    /// Any SVC solver, including Crammer and Singer's multi-class one.
    pub fn with_solver(solver: SolverType, c: f64, eps: f64) -> Result<Self> {
        if solver.is_logistic() {
            return Err(LinearError::InvalidConfig(format!(
                "{} is not a support vector solver",
                solver
            )));
        }
        let parameter = Parameter::new(solver, c, eps);
        parameter.check()?;
        Ok(LinearSvc {
            inner: GridAdapter::new(parameter, -1.0),
        })
    }

    /// Value of the synthetic intercept feature; `<= 0` disables it.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.inner.bias = bias;
        self
    }

    /// Per-class multipliers on C, keyed by integer class label.
    pub fn with_class_weights(mut self, weights: &HashMap<String, f64>) -> Result<Self> {
        self.inner.overrides = Some(ClassWeights::from_overrides(weights)?);
        Ok(self)
    }

    pub fn with_trainer(mut self, trainer: Trainer) -> Self {
        self.inner.trainer = trainer;
        self
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(Trainer::default(), path)
    }

    pub fn load_with<P: AsRef<Path>>(trainer: Trainer, path: P) -> Result<Self> {
        let model = trainer.load(path)?;
        let solver = model.solver();
        if solver.is_logistic() {
            return Err(LinearError::InvalidConfig(format!(
                "{} is not a support vector model",
                solver
            )));
        }
        let parameter = Parameter::new(solver, 1.0, 0.1);
        Ok(LinearSvc {
            inner: GridAdapter::from_model(trainer, model, parameter),
        })
    }

    pub fn solver(&self) -> SolverType {
        self.inner.parameter.solver
    }

    pub fn model(&self) -> Option<&Model> {
        self.inner.model.as_ref()
    }

    /// Decision values of every row, one per decision function.
    pub fn decision_function(&self, grid: &dyn DataGrid) -> Result<Vec<Vec<f64>>> {
        let trainer = &self.inner.trainer;
        self.inner
            .map_rows(grid, &mut |model, row| Ok(trainer.predict_values(model, row).1))
    }
}

impl Classifier for LinearSvc {
    fn fit(&mut self, grid: &dyn DataGrid) -> Result<()> {
        self.inner.fit(grid)
    }

    fn predict(&self, grid: &dyn DataGrid) -> Result<DenseGrid> {
        self.inner.predict(grid)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.inner.save(path)
    }

    fn name(&self) -> &str {
        "linear_svc"
    }
}
