//! Grid-facing fit / predict shared by the linear classifiers.
use std::path::Path;

use log::{debug, info};

use crate::data_handling::{
    unpack_f64, Attribute, AttributeSpec, ClassDistribution, DataGrid, DenseGrid,
};
use crate::error::{LinearError, Result};
use crate::problem::{ClassWeights, Parameter, Problem};
use crate::trainer::{Model, Trainer};

pub(crate) struct GridAdapter {
    pub(crate) trainer: Trainer,
    pub(crate) parameter: Parameter,
    pub(crate) bias: f64,
    /// Caller supplied class weights; `None` derives them from the class
    /// distribution at fit time.
    pub(crate) overrides: Option<ClassWeights>,
    pub(crate) model: Option<Model>,
    /// Feature attribute names seen at fit time. `None` for loaded models,
    /// which take the features positionally.
    pub(crate) feature_names: Option<Vec<String>>,
}

/// The single class attribute of `grid`.
fn class_attribute(grid: &dyn DataGrid) -> Result<Attribute> {
    let mut classes = grid.all_class_attributes();
    if classes.len() != 1 {
        return Err(LinearError::WrongClassCount(classes.len()));
    }
    Ok(classes.remove(0))
}

fn attribute_names(attributes: &[Attribute]) -> Vec<String> {
    attributes.iter().map(|a| a.name().to_string()).collect()
}

fn read_features(cells: &[&[u8]]) -> Vec<f64> {
    cells.iter().map(|c| unpack_f64(c)).collect()
}

impl GridAdapter {
    pub(crate) fn new(parameter: Parameter, bias: f64) -> Self {
        GridAdapter {
            trainer: Trainer::default(),
            parameter,
            bias,
            overrides: None,
            model: None,
            feature_names: None,
        }
    }

    pub(crate) fn from_model(trainer: Trainer, model: Model, parameter: Parameter) -> Self {
        GridAdapter {
            trainer,
            bias: model.bias(),
            parameter,
            overrides: None,
            model: Some(model),
            feature_names: None,
        }
    }

    pub(crate) fn fit(&mut self, grid: &dyn DataGrid) -> Result<()> {
        let class = class_attribute(grid)?;

        let features = grid.non_class_float_attributes();
        let n_features = features.len();
        let mut specs = grid.resolve_attributes(&features);
        specs.extend(grid.resolve_attributes(&[class.clone()]));

        let mut x: Vec<Vec<f64>> = Vec::with_capacity(grid.rows());
        let mut y: Vec<f64> = Vec::with_capacity(grid.rows());
        let mut distribution = ClassDistribution::new();
        grid.map_over_rows(&specs, &mut |cells, row| {
            let cell = cells[n_features];
            if !unpack_f64(cell).is_finite() {
                return Err(LinearError::NonFinite(row));
            }
            let label = class.class_label(cell)?;
            *distribution.entry(label.to_string()).or_insert(0) += 1;
            x.push(read_features(&cells[..n_features]));
            y.push(label as f64);
            Ok(true)
        })?;

        let weights = match &self.overrides {
            Some(weights) => weights.clone(),
            None => ClassWeights::uniform(&distribution)?,
        };

        let problem = Problem::new(&x, &y, self.bias)?;
        let parameter = self.parameter.clone().with_weights(weights);
        info!(
            "Fitting {} on {} rows with {} features",
            parameter.solver,
            problem.len(),
            n_features
        );

        self.model = Some(self.trainer.train(&problem, &parameter)?);
        self.feature_names = Some(attribute_names(&features));
        Ok(())
    }

    pub(crate) fn model(&self) -> Result<&Model> {
        self.model.as_ref().ok_or(LinearError::NotFitted)
    }

    /// Resolve the feature columns of `grid` against the fitted schema.
    fn feature_specs(&self, grid: &dyn DataGrid) -> Result<Vec<AttributeSpec>> {
        let features = grid.non_class_float_attributes();
        if let Some(expected) = &self.feature_names {
            let found = attribute_names(&features);
            if &found != expected {
                return Err(LinearError::SchemaMismatch {
                    expected: expected.clone(),
                    found,
                });
            }
        }
        Ok(grid.resolve_attributes(&features))
    }

    /// Apply `f` to the feature vector of every row, in row order.
    pub(crate) fn map_rows<T>(
        &self,
        grid: &dyn DataGrid,
        f: &mut dyn FnMut(&Model, &[f64]) -> Result<T>,
    ) -> Result<Vec<T>> {
        class_attribute(grid)?;
        let model = self.model()?;
        let specs = self.feature_specs(grid)?;

        let mut out = Vec::with_capacity(grid.rows());
        grid.map_over_rows(&specs, &mut |cells, _row| {
            out.push(f(model, &read_features(cells))?);
            Ok(true)
        })?;
        Ok(out)
    }

    pub(crate) fn predict(&self, grid: &dyn DataGrid) -> Result<DenseGrid> {
        let trainer = &self.trainer;
        let labels = self.map_rows(grid, &mut |model, row| Ok(trainer.predict(model, row)))?;

        let mut ret = DenseGrid::generate_prediction_vector(grid);
        let class_spec = ret
            .resolve_attributes(&ret.all_class_attributes())
            .into_iter()
            .next()
            .ok_or(LinearError::WrongClassCount(0))?;
        for (row, label) in labels.iter().enumerate() {
            let cell = class_spec.attribute.class_cell(*label as i32)?;
            ret.set(&class_spec, row, &cell);
        }
        debug!("Predicted {} rows", labels.len());
        Ok(ret)
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        self.trainer.export(self.model()?, path)
    }
}
