//! In-process linear solver engine.
//!
//! The [`Backend`] trait is the narrow contract the rest of the crate trains
//! and predicts through. [`Liblinear`] is the default implementation: the
//! liblinear family of solvers for L1/L2-regularized logistic regression and
//! linear SVMs.
use std::fmt;
use std::path::Path;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SolverType;
use crate::sparse::{FeatureNode, SparseRows};

mod dual;
mod l1r;
mod mcsvm;
pub(crate) mod model_file;
mod tron;

use dual::SvcLoss;
use tron::{tron, L2rL2SvcFun, L2rLrFun};

/// Seed of the row shuffles in the coordinate-descent solvers.
const SHUFFLE_SEED: u64 = 1;

/// Training rows in the layout the engine consumes.
///
/// Borrowed from a [`crate::problem::Problem`] for the duration of one
/// training call.
#[derive(Debug, Clone, Copy)]
pub struct StagedProblem<'a> {
    /// Number of rows.
    pub l: usize,
    /// Number of weight columns, bias column included.
    pub n: usize,
    pub y: &'a [f64],
    pub x: &'a SparseRows,
    pub bias: f64,
}

impl<'a> StagedProblem<'a> {
    pub fn new(y: &'a [f64], x: &'a SparseRows, n_features: usize, bias: f64) -> Self {
        StagedProblem {
            l: y.len(),
            n: if bias > 0.0 { n_features + 1 } else { n_features },
            y,
            x,
            bias,
        }
    }

    /// Feature count without the bias column.
    pub fn n_features(&self) -> usize {
        if self.bias > 0.0 {
            self.n - 1
        } else {
            self.n
        }
    }
}

/// Solver settings in the layout the engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedParameter {
    pub solver: SolverType,
    pub c: f64,
    pub eps: f64,
    /// Class labels with a C multiplier, parallel to `weight`.
    pub weight_label: Vec<i32>,
    pub weight: Vec<f64>,
}

/// Trained weights as handed out by a backend.
///
/// `w` is feature-major: the `nr_w` weights of feature `j` (0-based) are
/// `w[j * nr_w..(j + 1) * nr_w]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModel {
    pub solver: SolverType,
    pub nr_class: usize,
    /// Feature count without the bias column.
    pub nr_feature: usize,
    pub labels: Vec<i32>,
    pub w: Vec<f64>,
    pub bias: f64,
}

impl RawModel {
    pub fn new(
        solver: SolverType,
        nr_class: usize,
        nr_feature: usize,
        bias: f64,
        labels: Vec<i32>,
        w: Vec<f64>,
    ) -> Self {
        RawModel {
            solver,
            nr_class,
            nr_feature,
            labels,
            w,
            bias,
        }
    }

    /// Weight vectors per feature: one for binary models, one per class
    /// otherwise (and always one per class for Crammer and Singer).
    pub fn nr_w(&self) -> usize {
        if self.nr_class == 2 && self.solver != SolverType::MCSVM_CS {
            1
        } else {
            self.nr_class.max(1)
        }
    }

    /// Weight rows, bias column included.
    pub fn w_size(&self) -> usize {
        if self.bias > 0.0 {
            self.nr_feature + 1
        } else {
            self.nr_feature
        }
    }
}

/// The solver engine seam.
///
/// Every `RawModel` a backend returns from [`Backend::train`] or
/// [`Backend::load_model`] must be handed back through
/// [`Backend::free_model`] exactly once.
pub trait Backend: Send + Sync {
    fn train(&self, prob: &StagedProblem, param: &StagedParameter) -> RawModel;

    /// Write the `nr_w` decision values of `x` into `dec_values` and return
    /// the predicted label.
    fn predict_values(&self, model: &RawModel, x: &[FeatureNode], dec_values: &mut [f64]) -> f64;

    /// Returns 0 on success.
    fn save_model(&self, path: &Path, model: &RawModel) -> i32;

    fn load_model(&self, path: &Path) -> Option<RawModel>;

    fn free_model(&self, model: RawModel);

    fn predict(&self, model: &RawModel, x: &[FeatureNode]) -> f64 {
        let mut dec_values = vec![0.0; model.nr_w()];
        self.predict_values(model, x, &mut dec_values)
    }

    /// Class probabilities, in `model.labels` order, for logistic-regression
    /// models. Returns `None` for every other solver.
    fn predict_probability(
        &self,
        model: &RawModel,
        x: &[FeatureNode],
        prob_estimates: &mut [f64],
    ) -> Option<f64> {
        if !model.solver.is_logistic() {
            return None;
        }
        let nr_class = model.nr_class;
        let nr_w = model.nr_w();
        let mut dec_values = vec![0.0; nr_w];
        let label = self.predict_values(model, x, &mut dec_values);

        for (p, dec) in prob_estimates.iter_mut().zip(&dec_values) {
            *p = 1.0 / (1.0 + (-dec).exp());
        }
        if nr_class == 2 {
            prob_estimates[1] = 1.0 - prob_estimates[0];
        } else {
            let sum: f64 = prob_estimates[..nr_class].iter().sum();
            prob_estimates[..nr_class].iter_mut().for_each(|p| *p /= sum);
        }
        Some(label)
    }
}

/// Sink for solver progress lines.
#[derive(Clone, Copy)]
pub(crate) struct Printer {
    print: fn(&str),
}

impl Printer {
    pub(crate) fn info(&self, args: fmt::Arguments) {
        (self.print)(&args.to_string());
    }
}

impl fmt::Debug for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Printer")
    }
}

fn print_debug(s: &str) {
    debug!(target: "redeem_linear::solver", "{}", s);
}

/// Rows of one solver run. `y` holds `+1/-1` for the binary solvers and
/// class indices for Crammer and Singer.
pub(crate) struct SubProblem<'a> {
    pub(crate) x: Vec<&'a [FeatureNode]>,
    pub(crate) y: Vec<f64>,
    /// Number of weight columns.
    pub(crate) n: usize,
}

impl SubProblem<'_> {
    pub(crate) fn len(&self) -> usize {
        self.x.len()
    }
}

/// Rows grouped by class.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassGroups {
    /// Labels in first-seen order, `+1` ahead of `-1` for binary `{-1, +1}`.
    pub(crate) labels: Vec<i32>,
    pub(crate) start: Vec<usize>,
    pub(crate) count: Vec<usize>,
    /// Row indices ordered by class.
    pub(crate) perm: Vec<usize>,
}

pub(crate) fn group_classes(y: &[f64]) -> ClassGroups {
    let mut labels: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut data_label = Vec::with_capacity(y.len());

    for &value in y {
        let this_label = value as i32;
        match labels.iter().position(|&l| l == this_label) {
            Some(j) => {
                count[j] += 1;
                data_label.push(j);
            }
            None => {
                data_label.push(labels.len());
                labels.push(this_label);
                count.push(1);
            }
        }
    }

    if labels == [-1, 1] {
        labels.swap(0, 1);
        count.swap(0, 1);
        for d in data_label.iter_mut() {
            *d = 1 - *d;
        }
    }

    let mut start = vec![0; labels.len()];
    for i in 1..labels.len() {
        start[i] = start[i - 1] + count[i - 1];
    }
    let mut perm = vec![0; y.len()];
    let mut next = start.clone();
    for (i, &d) in data_label.iter().enumerate() {
        perm[next[d]] = i;
        next[d] += 1;
    }

    ClassGroups {
        labels,
        start,
        count,
        perm,
    }
}

/// Pure-Rust liblinear backend.
#[derive(Debug, Clone, Copy)]
pub struct Liblinear {
    out: Printer,
}

impl Default for Liblinear {
    fn default() -> Self {
        Liblinear {
            out: Printer { print: print_debug },
        }
    }
}

impl Liblinear {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route solver progress lines to `print` instead of the debug log.
    pub fn with_print(print: fn(&str)) -> Self {
        Liblinear {
            out: Printer { print },
        }
    }

    fn train_one(&self, prob: &SubProblem, solver: SolverType, w: &mut [f64], eps: f64, cp: f64, cn: f64) {
        let l = prob.len();
        let pos = prob.y.iter().filter(|&&y| y > 0.0).count();
        let neg = l - pos;
        let primal_solver_tol = eps * pos.min(neg).max(1) as f64 / l as f64;
        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
        let out = &self.out;

        let costs = || -> Vec<f64> {
            prob.y
                .iter()
                .map(|&y| if y > 0.0 { cp } else { cn })
                .collect()
        };

        match solver {
            SolverType::L2R_LR => {
                let mut fun = L2rLrFun::new(prob, costs());
                tron(&mut fun, w, primal_solver_tol, out);
            }
            SolverType::L2R_L2LOSS_SVC => {
                let mut fun = L2rL2SvcFun::new(prob, costs());
                tron(&mut fun, w, primal_solver_tol, out);
            }
            SolverType::L2R_L2LOSS_SVC_DUAL => {
                dual::solve_l2r_l1l2_svc(prob, w, eps, cp, cn, SvcLoss::L2, &mut rng, out)
            }
            SolverType::L2R_L1LOSS_SVC_DUAL => {
                dual::solve_l2r_l1l2_svc(prob, w, eps, cp, cn, SvcLoss::L1, &mut rng, out)
            }
            SolverType::L1R_L2LOSS_SVC => {
                l1r::solve_l1r_l2_svc(prob, w, primal_solver_tol, cp, cn, &mut rng, out)
            }
            SolverType::L1R_LR => l1r::solve_l1r_lr(prob, w, primal_solver_tol, cp, cn, &mut rng, out),
            SolverType::L2R_LR_DUAL => dual::solve_l2r_lr_dual(prob, w, eps, cp, cn, &mut rng, out),
            SolverType::MCSVM_CS => unreachable!("Crammer and Singer is solved over all classes at once"),
        }
    }
}

impl Backend for Liblinear {
    fn train(&self, prob: &StagedProblem, param: &StagedParameter) -> RawModel {
        let n = prob.n;
        let groups = group_classes(prob.y);
        let nr_class = groups.labels.len();
        debug!(
            "Training {} on {} rows x {} columns, {} classes",
            param.solver, prob.l, n, nr_class
        );

        let mut weighted_c = vec![param.c; nr_class];
        for (label, weight) in param.weight_label.iter().zip(&param.weight) {
            match groups.labels.iter().position(|l| l == label) {
                Some(j) => weighted_c[j] *= weight,
                None => warn!("Class label {} specified in weight is not found", label),
            }
        }

        let x: Vec<&[FeatureNode]> = groups.perm.iter().map(|&i| prob.x.row(i)).collect();
        let mut model = RawModel::new(
            param.solver,
            nr_class,
            prob.n_features(),
            prob.bias,
            groups.labels.clone(),
            Vec::new(),
        );

        if param.solver == SolverType::MCSVM_CS {
            let mut y = vec![0.0; prob.l];
            for (class, (&start, &count)) in groups.start.iter().zip(&groups.count).enumerate() {
                y[start..start + count].iter_mut().for_each(|v| *v = class as f64);
            }
            let sub = SubProblem { x, y, n };
            let mut w = vec![0.0; n * nr_class];
            let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
            mcsvm::McsvmCs::new(&sub, nr_class, &weighted_c, param.eps).solve(&mut w, &mut rng, &self.out);
            model.w = w;
        } else if nr_class == 2 {
            let mut y = vec![-1.0; prob.l];
            y[..groups.count[0]].iter_mut().for_each(|v| *v = 1.0);
            let sub = SubProblem { x, y, n };
            let mut w = vec![0.0; n];
            self.train_one(&sub, param.solver, &mut w, param.eps, weighted_c[0], weighted_c[1]);
            model.w = w;
        } else {
            // one-vs-rest
            let mut w = vec![0.0; n * nr_class];
            let mut w_class = vec![0.0; n];
            let mut sub = SubProblem {
                x,
                y: vec![-1.0; prob.l],
                n,
            };
            for class in 0..nr_class {
                let (start, count) = (groups.start[class], groups.count[class]);
                sub.y.iter_mut().for_each(|v| *v = -1.0);
                sub.y[start..start + count].iter_mut().for_each(|v| *v = 1.0);

                self.train_one(&sub, param.solver, &mut w_class, param.eps, weighted_c[class], param.c);
                for (j, &wj) in w_class.iter().enumerate() {
                    w[j * nr_class + class] = wj;
                }
            }
            model.w = w;
        }
        model
    }

    fn predict_values(&self, model: &RawModel, x: &[FeatureNode], dec_values: &mut [f64]) -> f64 {
        let n = model.w_size();
        let nr_w = model.nr_w();
        let dec_values = &mut dec_values[..nr_w];
        dec_values.iter_mut().for_each(|v| *v = 0.0);

        for node in x.iter().take_while(|n| !n.is_sentinel()) {
            let idx = node.index as usize;
            if idx <= n {
                let row = &model.w[(idx - 1) * nr_w..idx * nr_w];
                for (dec, wi) in dec_values.iter_mut().zip(row) {
                    *dec += wi * node.value;
                }
            }
        }

        if model.nr_class == 2 && model.solver != SolverType::MCSVM_CS {
            if dec_values[0] > 0.0 {
                model.labels[0] as f64
            } else {
                model.labels[1] as f64
            }
        } else {
            let mut best = 0;
            for (i, &dec) in dec_values.iter().enumerate() {
                if dec > dec_values[best] {
                    best = i;
                }
            }
            model.labels[best] as f64
        }
    }

    fn save_model(&self, path: &Path, model: &RawModel) -> i32 {
        model_file::save(path, model)
    }

    fn load_model(&self, path: &Path) -> Option<RawModel> {
        model_file::load(path)
    }

    fn free_model(&self, model: RawModel) {
        trace!(
            "Releasing {} model with {} weights",
            model.solver,
            model.w.len()
        );
        drop(model);
    }
}
