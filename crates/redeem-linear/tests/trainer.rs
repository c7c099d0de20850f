use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use redeem_linear::config::SolverType;
use redeem_linear::engine::{Backend, Liblinear, RawModel, StagedParameter, StagedProblem};
use redeem_linear::error::LinearError;
use redeem_linear::problem::{ClassWeights, Parameter, Problem};
use redeem_linear::sparse::FeatureNode;
use redeem_linear::trainer::Trainer;

fn quiet_trainer() -> Trainer {
    Trainer::new(Arc::new(Liblinear::with_print(|_| {})))
}

fn two_clusters() -> (Vec<Vec<f64>>, Vec<f64>) {
    let x = vec![
        vec![0.0, 0.0],
        vec![0.5, 0.2],
        vec![0.2, 0.7],
        vec![1.0, 0.5],
        vec![10.0, 10.0],
        vec![9.5, 10.2],
        vec![10.3, 9.1],
        vec![9.0, 9.8],
    ];
    let y = vec![-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];
    (x, y)
}

/// Wraps the real engine and counts what reaches it.
struct Counting {
    inner: Liblinear,
    trained: AtomicUsize,
    freed: AtomicUsize,
}

impl Counting {
    fn new() -> Self {
        Counting {
            inner: Liblinear::with_print(|_| {}),
            trained: AtomicUsize::new(0),
            freed: AtomicUsize::new(0),
        }
    }
}

impl Backend for Counting {
    fn train(&self, prob: &StagedProblem, param: &StagedParameter) -> RawModel {
        self.trained.fetch_add(1, Ordering::SeqCst);
        self.inner.train(prob, param)
    }

    fn predict_values(&self, model: &RawModel, x: &[FeatureNode], dec: &mut [f64]) -> f64 {
        self.inner.predict_values(model, x, dec)
    }

    fn save_model(&self, path: &Path, model: &RawModel) -> i32 {
        self.inner.save_model(path, model)
    }

    fn load_model(&self, path: &Path) -> Option<RawModel> {
        self.inner.load_model(path)
    }

    fn free_model(&self, model: RawModel) {
        self.freed.fetch_add(1, Ordering::SeqCst);
        self.inner.free_model(model)
    }
}

#[test]
fn separable_toy_with_intercept() {
    let x = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
    let y = vec![-1.0, 1.0];
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let trainer = quiet_trainer();

    for solver in SolverType::ALL {
        let model = trainer.train(&problem, &Parameter::new(solver, 10.0, 0.01)).unwrap();
        assert_eq!(model.labels(), &[1, -1], "{}", solver);
        for (row, expected) in [
            ([0.0, 0.0], -1.0),
            ([10.0, 10.0], 1.0),
            ([1.0, 1.0], -1.0),
            ([9.0, 9.0], 1.0),
        ] {
            assert_eq!(trainer.predict(&model, &row), expected, "{} on {:?}", solver, row);
        }
    }
}

#[test]
fn separable_toy_without_intercept_fits_training_rows() {
    let x = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
    let y = vec![-1.0, 1.0];
    let problem = Problem::new(&x, &y, -1.0).unwrap();
    let trainer = quiet_trainer();

    // Crammer and Singer ties at the origin without an intercept
    for solver in SolverType::ALL.into_iter().filter(|s| *s != SolverType::MCSVM_CS) {
        let model = trainer.train(&problem, &Parameter::new(solver, 10.0, 0.01)).unwrap();
        assert_eq!(model.coefficients(0).unwrap().len(), 2);
        assert_eq!(trainer.predict(&model, &[0.0, 0.0]), -1.0, "{}", solver);
        assert_eq!(trainer.predict(&model, &[10.0, 10.0]), 1.0, "{}", solver);
    }
}

#[test]
fn clustered_data_for_every_solver() {
    let (x, y) = two_clusters();
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let trainer = quiet_trainer();

    for solver in SolverType::ALL {
        let model = trainer.train(&problem, &Parameter::new(solver, 1.0, 0.01)).unwrap();
        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(trainer.predict(&model, row), label, "{} on {:?}", solver, row);
        }
        assert_eq!(trainer.predict(&model, &[1.0, 1.0]), -1.0, "{}", solver);
        assert_eq!(trainer.predict(&model, &[9.0, 9.0]), 1.0, "{}", solver);
    }
}

#[test]
fn one_vs_rest_and_crammer_singer() {
    let x = vec![
        vec![0.0, 0.0],
        vec![0.5, 0.2],
        vec![0.3, 0.6],
        vec![10.0, 0.0],
        vec![9.5, 0.4],
        vec![10.2, 0.3],
        vec![0.0, 10.0],
        vec![0.4, 9.5],
        vec![0.2, 10.3],
    ];
    let y = vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0];
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let trainer = quiet_trainer();

    for solver in SolverType::ALL {
        let model = trainer.train(&problem, &Parameter::new(solver, 1.0, 0.01)).unwrap();
        assert_eq!(model.labels(), &[1, 2, 3]);
        assert_eq!(model.nr_class(), 3);
        assert!(model.coefficients(2).is_some());
        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(trainer.predict(&model, row), label, "{} on {:?}", solver, row);
        }
        let (_, dec) = trainer.predict_values(&model, &[9.0, 1.0]);
        assert_eq!(dec.len(), 3);
        assert_eq!(trainer.predict(&model, &[9.0, 1.0]), 2.0, "{}", solver);
    }
}

#[test]
fn multiclass_probabilities_are_normalized() {
    let x = vec![
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![5.0, 5.0],
        vec![0.2, 1.1],
        vec![1.2, 0.1],
        vec![5.5, 4.8],
    ];
    let y = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let trainer = quiet_trainer();
    let model = trainer
        .train(&problem, &Parameter::new(SolverType::L2R_LR, 1.0, 0.01))
        .unwrap();

    let (_, probs) = trainer.predict_probability(&model, &[0.1, 1.0]).unwrap();
    assert_eq!(probs.len(), 3);
    assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn non_finite_values_never_reach_the_engine() {
    let backend = Arc::new(Counting::new());
    let trainer = Trainer::new(backend.clone());
    let parameter = Parameter::new(SolverType::L2R_LR, 1.0, 0.01);

    let cases = [
        (vec![vec![1.0, f64::NAN], vec![0.0, 1.0]], vec![1.0, -1.0]),
        (vec![vec![1.0, 0.0], vec![f64::INFINITY, 1.0]], vec![1.0, -1.0]),
        (vec![vec![1.0, 0.0], vec![0.0, 1.0]], vec![f64::NAN, -1.0]),
    ];
    for (x, y) in &cases {
        let problem = Problem::new(x, y, -1.0).unwrap();
        let err = trainer.train(&problem, &parameter).unwrap_err();
        assert!(matches!(err, LinearError::NonFinite(_)));
        assert!(err.is_fatal());
    }
    assert_eq!(backend.trained.load(Ordering::SeqCst), 0);
    assert_eq!(backend.freed.load(Ordering::SeqCst), 0);
}

#[test]
fn fractional_labels_never_reach_the_backend() {
    let backend = Arc::new(Counting::new());
    let trainer = Trainer::new(backend.clone());
    let parameter = Parameter::new(SolverType::L2R_LR, 1.0, 0.01);

    let x = vec![vec![0.0, 0.0], vec![0.5, 0.2], vec![10.0, 10.0], vec![9.5, 10.2]];
    let problem = Problem::new(&x, &[0.4, 0.4, 1.6, 1.6], 1.0).unwrap();
    assert_eq!(
        trainer.train(&problem, &parameter).unwrap_err(),
        LinearError::InvalidClassLabel("0.4".to_string())
    );
    assert_eq!(backend.trained.load(Ordering::SeqCst), 0);
}

#[test]
fn every_model_is_released_exactly_once() {
    let backend = Arc::new(Counting::new());
    let trainer = Trainer::new(backend.clone());
    let (x, y) = two_clusters();
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clusters.model");

    {
        let model = trainer
            .train(&problem, &Parameter::new(SolverType::L2R_L2LOSS_SVC_DUAL, 1.0, 0.1))
            .unwrap();
        trainer.export(&model, &path).unwrap();
        let loaded = trainer.load(&path).unwrap();
        assert_eq!(loaded.nr_feature(), 2);
        assert_eq!(backend.freed.load(Ordering::SeqCst), 0);
    }
    assert_eq!(backend.trained.load(Ordering::SeqCst), 1);
    assert_eq!(backend.freed.load(Ordering::SeqCst), 2);

    // a failed parameter check stages nothing
    let err = trainer
        .train(&problem, &Parameter::new(SolverType::L2R_LR, -1.0, 0.01))
        .unwrap_err();
    assert!(matches!(err, LinearError::InvalidConfig(_)));
    assert_eq!(backend.trained.load(Ordering::SeqCst), 1);
}

#[test]
fn export_load_predict_is_identical() {
    let (x, y) = two_clusters();
    let trainer = quiet_trainer();
    let dir = tempfile::tempdir().unwrap();
    let probes = [[0.0, 0.0], [3.3, 4.1], [5.0, 5.0], [-2.5, 7.0], [9.0, 9.0]];

    for solver in SolverType::ALL {
        for bias in [1.0, -1.0] {
            let problem = Problem::new(&x, &y, bias).unwrap();
            let model = trainer.train(&problem, &Parameter::new(solver, 1.0, 0.01)).unwrap();
            let path = dir.path().join(format!("{}_{}.model", solver, bias));
            trainer.export(&model, &path).unwrap();
            let loaded = trainer.load(&path).unwrap();

            assert_eq!(loaded.solver(), solver);
            assert_eq!(loaded.labels(), model.labels());
            assert_eq!(loaded.bias(), model.bias());
            for probe in &probes {
                assert_eq!(trainer.predict(&loaded, probe), trainer.predict(&model, probe));
                assert_eq!(
                    trainer.predict_values(&loaded, probe),
                    trainer.predict_values(&model, probe)
                );
            }
        }
    }
}

#[test]
fn corrupt_headers_fail_to_load() {
    let trainer = quiet_trainer();
    let dir = tempfile::tempdir().unwrap();
    let headers = [
        "solver_type L2R_LR\nnr_class 0\nlabel\nnr_feature 1\nbias -1\nw\n0.5\n",
        "solver_type L2R_LR\nnr_class 2\nlabel 1 -1\nnr_feature 100000000000000\nbias -1\nw\n0.5\n",
        "solver_type L2R_LR\nnr_class 2\nlabel 1 -1\nnr_feature 18446744073709551615\nbias 1\nw\n0.5\n",
    ];
    for (i, text) in headers.iter().enumerate() {
        let path = dir.path().join(format!("corrupt_{}.model", i));
        std::fs::write(&path, text).unwrap();
        match trainer.load(&path) {
            Err(LinearError::Load { path: reported }) => assert_eq!(reported, path),
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[test]
fn native_call_failures_carry_the_path() {
    let trainer = quiet_trainer();
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.model");
    match trainer.load(&missing) {
        Err(LinearError::Load { path }) => assert_eq!(path, missing),
        other => panic!("unexpected {:?}", other),
    }

    let garbage = dir.path().join("garbage.model");
    std::fs::write(&garbage, "not a model\n").unwrap();
    assert!(matches!(trainer.load(&garbage), Err(LinearError::Load { .. })));

    let (x, y) = two_clusters();
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let model = trainer
        .train(&problem, &Parameter::new(SolverType::L2R_LR, 1.0, 0.01))
        .unwrap();
    let unwritable = dir.path().join("no_such_dir").join("m.model");
    match trainer.export(&model, &unwritable) {
        Err(LinearError::Export { path, status }) => {
            assert_eq!(path, unwritable);
            assert_ne!(status, 0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn class_weights_shift_the_boundary() {
    // overlapping classes along one axis
    let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64 / 2.0]).collect();
    let y: Vec<f64> = (0..20).map(|i| if (i < 12) ^ (i % 5 == 0) { -1.0 } else { 1.0 }).collect();
    let problem = Problem::new(&x, &y, 1.0).unwrap();
    let trainer = quiet_trainer();

    let positives = |weights: ClassWeights| {
        let parameter = Parameter::new(SolverType::L2R_LR, 1.0, 0.001).with_weights(weights);
        let model = trainer.train(&problem, &parameter).unwrap();
        x.iter().filter(|row| trainer.predict(&model, row) > 0.0).count()
    };

    let mut heavy_positive = ClassWeights::none();
    heavy_positive.insert(1, 20.0).unwrap();
    assert!(positives(heavy_positive) > positives(ClassWeights::none()));
}
