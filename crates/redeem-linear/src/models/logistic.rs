use std::path::Path;

use crate::config::SolverType;
use crate::data_handling::{DataGrid, DenseGrid};
use crate::error::{LinearError, Result};
use crate::models::adapter::GridAdapter;
use crate::models::classifier_trait::Classifier;
use crate::problem::Parameter;
use crate::trainer::{Model, Trainer};

/// L1- or L2-regularized logistic regression over a data grid.
pub struct LogisticRegression {
    penalty: String,
    inner: GridAdapter,
}

impl LogisticRegression {
    /// # Arguments
    ///
    /// * `penalty` - `"l2"` or `"l1"`.
    /// * `c` - Cost of constraint violation.
    /// * `eps` - Stopping tolerance.
    pub fn new(penalty: &str, c: f64, eps: f64) -> Result<Self> {
        let solver = SolverType::for_logistic(penalty, false).map_err(LinearError::InvalidConfig)?;
        let parameter = Parameter::new(solver, c, eps);
        parameter.check()?;
        Ok(LogisticRegression {
            penalty: penalty.to_string(),
            inner: GridAdapter::new(parameter, -1.0),
        })
    }

    /// Value of the synthetic intercept feature; `<= 0` disables it.
    pub fn with_bias(mut self, bias: f64) -> Self {
        self.inner.bias = bias;
        self
    }

    /// Solve the dual problem (L2 penalty only).
    pub fn with_dual(mut self, dual: bool) -> Result<Self> {
        self.inner.parameter.solver =
            SolverType::for_logistic(&self.penalty, dual).map_err(LinearError::InvalidConfig)?;
        Ok(self)
    }

    /// Train and predict through `trainer` instead of the default engine.
    pub fn with_trainer(mut self, trainer: Trainer) -> Self {
        self.inner.trainer = trainer;
        self
    }

    /// Load a model written by [`Classifier::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(Trainer::default(), path)
    }

    pub fn load_with<P: AsRef<Path>>(trainer: Trainer, path: P) -> Result<Self> {
        let model = trainer.load(path)?;
        let solver = model.solver();
        if !solver.is_logistic() {
            return Err(LinearError::InvalidConfig(format!(
                "{} is not a logistic regression model",
                solver
            )));
        }
        let penalty = if solver == SolverType::L1R_LR { "l1" } else { "l2" };
        let parameter = Parameter::new(solver, 1.0, 0.01);
        Ok(LogisticRegression {
            penalty: penalty.to_string(),
            inner: GridAdapter::from_model(trainer, model, parameter),
        })
    }

    pub fn solver(&self) -> SolverType {
        self.inner.parameter.solver
    }

    pub fn model(&self) -> Option<&Model> {
        self.inner.model.as_ref()
    }

    /// Class probabilities of every row, in [`Model::labels`] order.
    pub fn predict_proba(&self, grid: &dyn DataGrid) -> Result<Vec<Vec<f64>>> {
        let trainer = &self.inner.trainer;
        self.inner.map_rows(grid, &mut |model, row| {
            trainer.predict_probability(model, row).map(|(_, probs)| probs)
        })
    }
}

impl Classifier for LogisticRegression {
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
        "logistic_regression"
    }
}
