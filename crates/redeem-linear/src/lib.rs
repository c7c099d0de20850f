//! redeem-linear: regularized linear classifiers over tabular data grids.
//!
//! This crate wraps a liblinear-style solver engine (L1/L2-regularized
//! logistic regression and linear SVM variants) behind fit/predict semantics
//! on data grids with a single class attribute.
//!
//! Layering, bottom-up: sparse row encoding (`sparse`), problem and
//! parameter assembly (`problem`, `config`), the solver engine behind the
//! `engine::Backend` trait, the training / inference façade that owns model
//! handles (`trainer`), and the grid-facing classifiers (`models`).
pub mod config;
pub mod data_handling;
pub mod engine;
pub mod error;
pub mod io;
pub mod logging;
pub mod models;
pub mod problem;
pub mod sparse;
pub mod trainer;
