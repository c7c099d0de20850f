use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Training algorithm, with the loss / penalty combination it optimizes.
///
/// Discriminants are the ids the solver engine and the model file use.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum SolverType {
    /// L2-regularized logistic regression (primal, trust-region Newton)
    L2R_LR = 0,
    /// L2-regularized L2-loss SVC (dual coordinate descent)
    L2R_L2LOSS_SVC_DUAL = 1,
    /// L2-regularized L2-loss SVC (primal, trust-region Newton)
    L2R_L2LOSS_SVC = 2,
    /// L2-regularized L1-loss SVC (dual coordinate descent)
    L2R_L1LOSS_SVC_DUAL = 3,
    /// Multi-class SVM by Crammer and Singer
    MCSVM_CS = 4,
    /// L1-regularized L2-loss SVC
    L1R_L2LOSS_SVC = 5,
    /// L1-regularized logistic regression
    L1R_LR = 6,
    /// L2-regularized logistic regression (dual coordinate descent)
    L2R_LR_DUAL = 7,
}

impl SolverType {
    pub const ALL: [SolverType; 8] = [
        SolverType::L2R_LR,
        SolverType::L2R_L2LOSS_SVC_DUAL,
        SolverType::L2R_L2LOSS_SVC,
        SolverType::L2R_L1LOSS_SVC_DUAL,
        SolverType::MCSVM_CS,
        SolverType::L1R_L2LOSS_SVC,
        SolverType::L1R_LR,
        SolverType::L2R_LR_DUAL,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Self> {
        SolverType::ALL.iter().copied().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverType::L2R_LR => "L2R_LR",
            SolverType::L2R_L2LOSS_SVC_DUAL => "L2R_L2LOSS_SVC_DUAL",
            SolverType::L2R_L2LOSS_SVC => "L2R_L2LOSS_SVC",
            SolverType::L2R_L1LOSS_SVC_DUAL => "L2R_L1LOSS_SVC_DUAL",
            SolverType::MCSVM_CS => "MCSVM_CS",
            SolverType::L1R_L2LOSS_SVC => "L1R_L2LOSS_SVC",
            SolverType::L1R_LR => "L1R_LR",
            SolverType::L2R_LR_DUAL => "L2R_LR_DUAL",
        }
    }

    /// Logistic-regression solvers can report class probabilities.
    pub fn is_logistic(self) -> bool {
        matches!(
            self,
            SolverType::L2R_LR | SolverType::L1R_LR | SolverType::L2R_LR_DUAL
        )
    }

    /// Pick the logistic-regression solver for a penalty name.
    pub fn for_logistic(penalty: &str, dual: bool) -> Result<Self, String> {
        match (penalty, dual) {
            ("l2", false) => Ok(SolverType::L2R_LR),
            ("l2", true) => Ok(SolverType::L2R_LR_DUAL),
            ("l1", false) => Ok(SolverType::L1R_LR),
            ("l1", true) => Err("L1-regularized logistic regression has no dual solver".to_string()),
            _ => Err(format!("Invalid penalty '{}'", penalty)),
        }
    }

    /// Pick the SVC solver for a loss / penalty pair.
    pub fn for_svc(loss: &str, penalty: &str, dual: bool) -> Result<Self, String> {
        match (penalty, loss, dual) {
            ("l2", "l1", true) => Ok(SolverType::L2R_L1LOSS_SVC_DUAL),
            ("l2", "l1", false) => Err("L1-loss SVC needs the dual solver".to_string()),
            ("l2", "l2", true) => Ok(SolverType::L2R_L2LOSS_SVC_DUAL),
            ("l2", "l2", false) => Ok(SolverType::L2R_L2LOSS_SVC),
            ("l1", "l2", false) => Ok(SolverType::L1R_L2LOSS_SVC),
            ("l1", "l2", true) => Err("L1-regularized SVC has no dual solver".to_string()),
            ("l1", "l1", _) => Err("L1 penalty with L1 loss is not supported".to_string()),
            ("l1" | "l2", _, _) => Err(format!("Invalid loss '{}'", loss)),
            _ => Err(format!("Invalid penalty '{}'", penalty)),
        }
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SolverType::ALL
            .iter()
            .copied()
            .find(|solver| solver.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown solver type: {}", s))
    }
}

/// Central configuration for the classifiers in the crate.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    /// Value of the synthetic intercept feature; `<= 0` disables it.
    #[serde(default = "default_bias")]
    pub bias: f64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

fn default_bias() -> f64 {
    -1.0
}

/// Supported classifiers and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    LogisticRegression {
        penalty: String,
        c: f64,
        eps: f64,
        #[serde(default)]
        dual: bool,
    },
    LinearSvc {
        loss: String,
        penalty: String,
        dual: bool,
        c: f64,
        eps: f64,
        #[serde(default)]
        class_weights: Option<HashMap<String, f64>>,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::LogisticRegression {
            penalty: "l2".to_string(),
            c: 1.0,
            eps: 0.01,
            dual: false,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" | "logreg" | "logistic_regression" => Ok(ModelType::default()),
            "svc" | "svm" | "linear_svc" => Ok(ModelType::LinearSvc {
                loss: "l2".to_string(),
                penalty: "l2".to_string(),
                dual: true,
                c: 1.0,
                eps: 0.1,
                class_weights: None,
            }),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: logistic, svc",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(bias: f64, model_type: ModelType) -> Self {
        Self { bias, model_type }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            bias: default_bias(),
            model_type: ModelType::default(),
        }
    }
}

/// Load a model configuration from a JSON file.
pub fn load_model_config<P: AsRef<Path>>(path: P) -> anyhow::Result<ModelConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ModelConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_ids_round_trip() {
        for solver in SolverType::ALL {
            assert_eq!(SolverType::from_id(solver.id()), Some(solver));
            assert_eq!(solver.name().parse::<SolverType>().unwrap(), solver);
        }
        assert_eq!(SolverType::from_id(11), None);
    }

    #[test]
    fn penalty_names_map_to_solvers() {
        assert_eq!(SolverType::for_logistic("l2", false), Ok(SolverType::L2R_LR));
        assert_eq!(SolverType::for_logistic("l1", false), Ok(SolverType::L1R_LR));
        assert_eq!(SolverType::for_logistic("l2", true), Ok(SolverType::L2R_LR_DUAL));
        assert_eq!(
            SolverType::for_logistic("l3", false),
            Err("Invalid penalty 'l3'".to_string())
        );
    }

    #[test]
    fn svc_combinations() {
        assert_eq!(
            SolverType::for_svc("l1", "l2", true),
            Ok(SolverType::L2R_L1LOSS_SVC_DUAL)
        );
        assert_eq!(
            SolverType::for_svc("l2", "l1", false),
            Ok(SolverType::L1R_L2LOSS_SVC)
        );
        assert!(SolverType::for_svc("l1", "l2", false).is_err());
        assert!(SolverType::for_svc("l1", "l1", false).is_err());
        assert!(SolverType::for_svc("hinge", "l2", true).is_err());
    }

    #[test]
    fn config_file_round_trip() {
        let config = ModelConfig::new(
            1.0,
            ModelType::LinearSvc {
                loss: "l1".to_string(),
                penalty: "l2".to_string(),
                dual: true,
                c: 0.5,
                eps: 0.1,
                class_weights: None,
            },
        );
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&config).unwrap()).unwrap();
        let loaded = load_model_config(file.path()).unwrap();
        assert_eq!(loaded.bias, 1.0);
        assert_eq!(loaded.model_type, config.model_type);

        let defaults: ModelConfig =
            serde_json::from_str(r#"{ "LogisticRegression": { "penalty": "l1", "c": 2.0, "eps": 0.01 } }"#)
                .unwrap();
        assert_eq!(defaults.bias, -1.0);
        assert!(load_model_config("/nonexistent/config.json").is_err());
    }

    #[test]
    fn model_type_from_str() {
        assert!(matches!(
            "svc".parse::<ModelType>(),
            Ok(ModelType::LinearSvc { .. })
        ));
        assert!("forest".parse::<ModelType>().is_err());
    }
}
