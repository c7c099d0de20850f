use crate::config::{ModelConfig, ModelType};
use crate::error::Result;
use crate::models::classifier_trait::Classifier;
use crate::models::linear_svc::LinearSvc;
use crate::models::logistic::LogisticRegression;

/// Build a boxed, unfitted classifier from a `ModelConfig`.
///
/// Invalid penalty / loss names and class-weight keys are reported here,
/// before anything is trained.
pub fn build_classifier(config: &ModelConfig) -> Result<Box<dyn Classifier>> {
    match &config.model_type {
        ModelType::LogisticRegression {
            penalty,
            c,
            eps,
            dual,
        } => {
            let model = LogisticRegression::new(penalty, *c, *eps)?
                .with_dual(*dual)?
                .with_bias(config.bias);
            Ok(Box::new(model))
        }
        ModelType::LinearSvc {
            loss,
            penalty,
            dual,
            c,
            eps,
            class_weights,
        } => {
            let mut model = LinearSvc::new(loss, penalty, *dual, *c, *eps)?.with_bias(config.bias);
            if let Some(weights) = class_weights {
                model = model.with_class_weights(weights)?;
            }
            Ok(Box::new(model))
        }
    }
}
