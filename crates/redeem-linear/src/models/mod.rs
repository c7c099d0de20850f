pub mod classifier_trait;
pub mod factory;
pub mod linear_svc;
pub mod logistic;

mod adapter;
