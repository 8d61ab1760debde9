use crate::domain::Parameters;
use crate::error::ModelError;
use crate::fit::{FitOutcome, FitStatistics};
use crate::models::CompositeModel;

/// A completed fit: the model it ran against, starting and refined parameters,
/// and diagnostics.
#[derive(Debug, Clone)]
pub struct FitResult {
    model: CompositeModel,
    init_params: Parameters,
    params: Parameters,
    stats: FitStatistics,
}

impl FitResult {
    pub fn new(model: CompositeModel, init_params: Parameters, outcome: FitOutcome) -> Self {
        Self {
            model,
            init_params,
            params: outcome.params,
            stats: outcome.stats,
        }
    }

    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn init_params(&self) -> &Parameters {
        &self.init_params
    }

    pub fn stats(&self) -> &FitStatistics {
        &self.stats
    }

    /// Best-fit curve at `x`.
    pub fn eval(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.model.eval(&self.params, x)
    }

    /// The fitted model evaluated with other parameter values.
    pub fn eval_with(&self, params: &Parameters, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.model.eval(params, x)
    }

    /// Best-fit curve of each component, keyed by prefix.
    pub fn eval_components(&self, x: &[f64]) -> Result<Vec<(String, Vec<f64>)>, ModelError> {
        self.model.eval_components(&self.params, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{CancelToken, FitProblem, LevenbergMarquardt, Optimizer};
    use crate::models::{Component, ModelKind};

    #[test]
    fn evaluates_with_refined_parameters() {
        let model = CompositeModel::new()
            .combine(Component::new(ModelKind::Constant, "c0_"))
            .unwrap();
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let data = vec![4.0, 4.0, 4.0, 4.0];
        let params = model.make_params();
        let problem = FitProblem {
            model: model.clone(),
            x: x.clone(),
            data,
            params: params.clone(),
        };
        let outcome = LevenbergMarquardt::default()
            .minimize(&problem, &CancelToken::new())
            .unwrap();
        let result = FitResult::new(model, params, outcome);

        let best = result.eval(&x).unwrap();
        assert!(best.iter().all(|v| (v - 4.0).abs() < 1e-6));
        assert_eq!(result.init_params().value("c0_c"), Some(0.0));
        assert_eq!(result.eval_components(&x).unwrap()[0].0, "c0_");
        assert_eq!(result.eval_with(result.init_params(), &[1.0]).unwrap(), vec![0.0]);
    }
}
