//! Logistic regression

use super::{Classifier, ClassifierKind, ParamSet, TrainedModel};
use crate::error::{HarnessError, Result};
use crate::preprocessing::StandardScaler;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// L2-regularized logistic regression fitted by batch gradient descent.
///
/// Inputs are standardized internally, so coefficients refer to z-scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    scaler: StandardScaler,
    /// Iterations run by the last fit
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            scaler: StandardScaler::new(),
            n_iter: 0,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit the model using gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(HarnessError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let x = self.scaler.fit_transform(x)?;
        let mut weights = Array1::zeros(x.ncols());
        let mut bias = 0.0;
        let lr = self.learning_rate;
        let alpha = self.alpha;

        self.n_iter = 0;
        for iter in 0..self.max_iter {
            let linear = x.dot(&weights) + bias;
            let errors = &Self::sigmoid(&linear) - y;
            let dw = (x.t().dot(&errors) / n_samples as f64) + (alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            self.n_iter = iter + 1;
            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if !grad_norm.is_finite() {
                return Err(HarnessError::ConvergenceFailure {
                    model: "logistic_regression".to_string(),
                    reason: format!("gradient became non-finite at iteration {}", iter + 1),
                });
            }
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias -= lr * db;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(HarnessError::ConvergenceFailure {
                model: "logistic_regression".to_string(),
                reason: "weights diverged".to_string(),
            });
        }
        debug!(iterations = self.n_iter, "Logistic regression fitted");

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(self)
    }

    fn params(&self) -> Result<(&Array1<f64>, f64)> {
        match (&self.coefficients, self.intercept) {
            (Some(c), Some(b)) => Ok((c, b)),
            _ => Err(HarnessError::ModelNotFitted),
        }
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (coefficients, intercept) = self.params()?;
        let x = self.scaler.transform(x)?;
        Ok(Self::sigmoid(&(x.dot(coefficients) + intercept)))
    }

    /// Probability for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let (coefficients, intercept) = self.params()?;
        let z = self.scaler.transform_row(row)?.dot(coefficients) + intercept;
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

/// Hyperparameters accepted by [`LogisticRegressionClassifier`]
pub const LOGISTIC_REGRESSION_KEYS: &[&str] = &["alpha", "learning_rate", "max_iter", "tol"];

/// Classifier adapter over [`LogisticRegression`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegressionClassifier;

impl LogisticRegressionClassifier {
    pub fn build(params: &ParamSet) -> Result<LogisticRegression> {
        params.ensure_known(LOGISTIC_REGRESSION_KEYS)?;
        let mut model = LogisticRegression::new();

        if let Some(alpha) = params.f64("alpha")? {
            if alpha < 0.0 {
                return Err(HarnessError::config("alpha", "must be non-negative"));
            }
            model = model.with_alpha(alpha);
        }
        if let Some(lr) = params.f64("learning_rate")? {
            if lr <= 0.0 {
                return Err(HarnessError::config("learning_rate", "must be positive"));
            }
            model = model.with_learning_rate(lr);
        }
        if let Some(max_iter) = params.usize("max_iter")? {
            if max_iter == 0 {
                return Err(HarnessError::config("max_iter", "must be at least 1"));
            }
            model = model.with_max_iter(max_iter);
        }
        if let Some(tol) = params.f64("tol")? {
            if tol < 0.0 {
                return Err(HarnessError::config("tol", "must be non-negative"));
            }
            model = model.with_tol(tol);
        }
        Ok(model)
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::LogisticRegression
    }

    fn validate(&self, params: &ParamSet) -> Result<()> {
        Self::build(params).map(|_| ())
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>, params: &ParamSet, _seed: u64) -> Result<TrainedModel> {
        let mut model = Self::build(params)?;
        model.fit(x, y)?;
        Ok(TrainedModel::LogisticRegression(model))
    }
}
