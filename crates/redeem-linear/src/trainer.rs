//! Training and inference over a solver [`Backend`].
//!
//! The trainer owns the boundary between caller data and solver-side
//! resources: problems and parameters are staged into the engine layout only
//! for the duration of a training call, and every trained or loaded model is
//! wrapped in a [`Model`] that returns its weights to the backend when
//! dropped.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, trace};

use crate::config::SolverType;
use crate::engine::{Backend, Liblinear, RawModel, StagedParameter, StagedProblem};
use crate::error::{LinearError, Result};
use crate::problem::{Parameter, Problem};
use crate::sparse::{encode_row_for, FeatureNode};

/// Engine-layout view of a problem / parameter pair, scoped to one
/// training call.
struct Staging<'a> {
    problem: StagedProblem<'a>,
    parameter: StagedParameter,
}

impl<'a> Staging<'a> {
    fn new(problem: &'a Problem, parameter: &Parameter) -> Self {
        let staged = Staging {
            problem: StagedProblem::new(
                problem.labels(),
                problem.rows(),
                problem.n_features(),
                problem.bias(),
            ),
            parameter: StagedParameter {
                solver: parameter.solver,
                c: parameter.c,
                eps: parameter.eps,
                weight_label: parameter.weights.labels(),
                weight: parameter.weights.weights(),
            },
        };
        trace!(
            "Staged {} rows x {} columns for {}",
            staged.problem.l,
            staged.problem.n,
            staged.parameter.solver
        );
        staged
    }
}

/// A trained linear model. Exclusively owns its backend handle.
pub struct Model {
    raw: Option<RawModel>,
    backend: Arc<dyn Backend>,
}

impl Model {
    fn new(raw: RawModel, backend: Arc<dyn Backend>) -> Self {
        Model {
            raw: Some(raw),
            backend,
        }
    }

    fn raw(&self) -> &RawModel {
        // only `Drop` takes the handle out
        self.raw.as_ref().unwrap_or_else(|| unreachable!())
    }

    pub fn nr_class(&self) -> usize {
        self.raw().nr_class
    }

    /// Feature count the model was trained on, bias excluded.
    pub fn nr_feature(&self) -> usize {
        self.raw().nr_feature
    }

    /// Class labels in the order the decision values use.
    pub fn labels(&self) -> &[i32] {
        &self.raw().labels
    }

    pub fn bias(&self) -> f64 {
        self.raw().bias
    }

    pub fn solver(&self) -> SolverType {
        self.raw().solver
    }

    /// Weights of one decision function, bias weight last when the bias is on.
    ///
    /// Binary models other than Crammer and Singer have a single decision
    /// function, `class` 0.
    pub fn coefficients(&self, class: usize) -> Option<Vec<f64>> {
        let raw = self.raw();
        let nr_w = raw.nr_w();
        if class >= nr_w {
            return None;
        }
        Some(raw.w.iter().skip(class).step_by(nr_w).copied().collect())
    }

    fn encode(&self, row: &[f64]) -> Vec<FeatureNode> {
        encode_row_for(row, self.nr_feature(), self.bias())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => f
                .debug_struct("Model")
                .field("solver", &raw.solver)
                .field("nr_class", &raw.nr_class)
                .field("nr_feature", &raw.nr_feature)
                .field("bias", &raw.bias)
                .finish(),
            None => f.write_str("Model(released)"),
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.backend.free_model(raw);
        }
    }
}

/// Entry point for training, prediction and model files.
#[derive(Clone)]
pub struct Trainer {
    backend: Arc<dyn Backend>,
}

impl Default for Trainer {
    fn default() -> Self {
        Trainer::new(Arc::new(Liblinear::default()))
    }
}

impl fmt::Debug for Trainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Trainer")
    }
}

impl Trainer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Trainer { backend }
    }

    /// Train a model.
    ///
    /// Non-finite labels or features are rejected before anything is handed
    /// to the backend.
    pub fn train(&self, problem: &Problem, parameter: &Parameter) -> Result<Model> {
        problem.validate()?;
        parameter.check()?;

        let raw = {
            let staging = Staging::new(problem, parameter);
            self.backend.train(&staging.problem, &staging.parameter)
        };
        debug!(
            "Trained {} model: {} classes, {} features",
            raw.solver, raw.nr_class, raw.nr_feature
        );
        Ok(Model::new(raw, Arc::clone(&self.backend)))
    }

    /// Predicted label for one dense row.
    ///
    /// Columns beyond the model's feature count are ignored.
    pub fn predict(&self, model: &Model, row: &[f64]) -> f64 {
        model.backend.predict(model.raw(), &model.encode(row))
    }

    /// Decision values for one dense row, one per decision function.
    pub fn predict_values(&self, model: &Model, row: &[f64]) -> (f64, Vec<f64>) {
        let raw = model.raw();
        let mut dec_values = vec![0.0; raw.nr_w()];
        let label = model
            .backend
            .predict_values(raw, &model.encode(row), &mut dec_values);
        (label, dec_values)
    }

    /// Predicted label and class probabilities (in [`Model::labels`] order).
    ///
    /// Only logistic-regression models carry probabilities.
    pub fn predict_probability(&self, model: &Model, row: &[f64]) -> Result<(f64, Vec<f64>)> {
        let raw = model.raw();
        let mut probs = vec![0.0; raw.nr_class.max(2)];
        match model
            .backend
            .predict_probability(raw, &model.encode(row), &mut probs)
        {
            Some(label) => {
                probs.truncate(raw.nr_class);
                Ok((label, probs))
            }
            None => Err(LinearError::InvalidConfig(format!(
                "Probability outputs are only supported for logistic regression, not {}",
                raw.solver
            ))),
        }
    }

    /// Write `model` to `path` in the engine's text format.
    pub fn export<P: AsRef<Path>>(&self, model: &Model, path: P) -> Result<()> {
        let path = path.as_ref();
        let status = model.backend.save_model(path, model.raw());
        if status != 0 {
            return Err(LinearError::Export {
                path: path.to_path_buf(),
                status,
            });
        }
        info!("Exported {} model to {}", model.solver(), path.display());
        Ok(())
    }

    /// Read a model written by [`Trainer::export`].
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Model> {
        let path = path.as_ref();
        let raw = self
            .backend
            .load_model(path)
            .ok_or_else(|| LinearError::Load {
                path: path.to_path_buf(),
            })?;
        info!("Loaded {} model from {}", raw.solver, path.display());
        Ok(Model::new(raw, Arc::clone(&self.backend)))
    }
}
