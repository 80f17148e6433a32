//! Logistic-regression baseline model.
//!
//! Features are standardized with statistics from the training split, then
//! fitted by batch gradient descent. Training holds out a deterministic 20%
//! of the labelled rows (seeded shuffle) and reports accuracy on it.

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{FeatureRow, Features};
use crate::ports::{ModelError, ModelFactory, TrainableModel};

const N: usize = Features::LEN;

/// Fewest labelled rows `train` accepts.
pub const MIN_TRAINING_ROWS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct Hyperparams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub seed: u64,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            epochs: 400,
            learning_rate: 0.1,
            l2: 0.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    mean: [f64; N],
    scale: [f64; N],
    weights: [f64; N],
    bias: f64,
}

impl Fitted {
    fn probability(&self, x: &[f64; N]) -> f64 {
        let z = (0..N).fold(self.bias, |acc, j| {
            acc + self.weights[j] * (x[j] - self.mean[j]) / self.scale[j]
        });
        sigmoid(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn standardization(xs: &[[f64; N]]) -> ([f64; N], [f64; N]) {
    let n = xs.len().max(1) as f64;
    let mut mean = [0.0; N];
    let mut scale = [1.0; N];
    for j in 0..N {
        mean[j] = xs.iter().map(|x| x[j]).sum::<f64>() / n;
        let var = xs.iter().map(|x| (x[j] - mean[j]).powi(2)).sum::<f64>() / n;
        if var > 1e-12 {
            scale[j] = var.sqrt();
        }
    }
    (mean, scale)
}

#[derive(Debug, Clone, Default)]
pub struct LogisticModel {
    params: Hyperparams,
    fitted: Option<Fitted>,
}

impl LogisticModel {
    pub fn new(params: Hyperparams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    fn fit(&self, xs: &[[f64; N]], ys: &[f64]) -> Fitted {
        let (mean, scale) = standardization(xs);
        let mut fitted = Fitted {
            mean,
            scale,
            weights: [0.0; N],
            bias: 0.0,
        };
        let n = xs.len() as f64;
        for _ in 0..self.params.epochs {
            let mut grad_w = [0.0; N];
            let mut grad_b = 0.0;
            for (x, y) in xs.iter().zip(ys) {
                let err = fitted.probability(x) - y;
                for j in 0..N {
                    grad_w[j] += err * (x[j] - mean[j]) / scale[j];
                }
                grad_b += err;
            }
            for j in 0..N {
                let g = grad_w[j] / n + self.params.l2 * fitted.weights[j];
                fitted.weights[j] -= self.params.learning_rate * g;
            }
            fitted.bias -= self.params.learning_rate * grad_b / n;
        }
        fitted
    }
}

#[async_trait]
impl TrainableModel for LogisticModel {
    async fn train(&mut self, rows: &[FeatureRow], _target: &str) -> Result<f64, ModelError> {
        let labelled: Vec<(&FeatureRow, bool)> = rows
            .iter()
            .filter_map(|r| r.label.map(|l| (r, l)))
            .collect();
        if labelled.len() < MIN_TRAINING_ROWS {
            return Err(ModelError::InsufficientData {
                rows: labelled.len(),
                required: MIN_TRAINING_ROWS,
            });
        }

        let mut order: Vec<usize> = (0..labelled.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.params.seed));
        let holdout = (labelled.len() / 5).max(1);
        let (valid_idx, train_idx) = order.split_at(holdout);

        let xs: Vec<[f64; N]> = train_idx
            .iter()
            .map(|&i| labelled[i].0.features.to_array())
            .collect();
        let ys: Vec<f64> = train_idx
            .iter()
            .map(|&i| if labelled[i].1 { 1.0 } else { 0.0 })
            .collect();
        let fitted = self.fit(&xs, &ys);

        let correct = valid_idx
            .iter()
            .filter(|&&i| {
                let (row, label) = labelled[i];
                (fitted.probability(&row.features.to_array()) >= 0.5) == label
            })
            .count();
        let accuracy = correct as f64 / valid_idx.len() as f64;
        if !accuracy.is_finite() {
            return Err(ModelError::Training("non-finite accuracy".to_string()));
        }

        self.fitted = Some(fitted);
        Ok(accuracy)
    }

    async fn predict(&self, features: &[Features]) -> Result<Vec<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotTrained)?;
        Ok(features
            .iter()
            .map(|f| fitted.probability(&f.to_array()))
            .collect())
    }
}

/// Builds logistic models for the model types the pipeline asks for.
///
/// "ensemble" is a longer, regularized fit; "hybrid" and "logistic" use the
/// defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticFactory;

impl ModelFactory for LogisticFactory {
    fn build(&self, model_type: &str) -> Result<Box<dyn TrainableModel>, ModelError> {
        let params = match model_type {
            "hybrid" | "logistic" => Hyperparams::default(),
            "ensemble" => Hyperparams {
                epochs: 800,
                learning_rate: 0.05,
                l2: 0.01,
                ..Hyperparams::default()
            },
            other => return Err(ModelError::UnknownModelType(other.to_string())),
        };
        Ok(Box::new(LogisticModel::new(params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label is "home player form beats away", plus one noise feature.
    fn separable_rows(n: usize) -> Vec<FeatureRow> {
        (0..n)
            .map(|i| {
                let player_form = (i as f64 - n as f64 / 2.0) / n as f64;
                FeatureRow {
                    match_id: format!("m{i}"),
                    home_team: "H".to_string(),
                    away_team: "A".to_string(),
                    features: Features {
                        player_form,
                        transfers: (i % 3) as f64,
                        weather: 1.0,
                        ..Features::default()
                    },
                    label: Some(player_form > 0.0),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn learns_a_separable_signal() {
        let mut model = LogisticFactory.build("hybrid").unwrap();
        let accuracy = model.train(&separable_rows(60), "dc_btts").await.unwrap();
        assert!(accuracy >= 0.75, "accuracy was {accuracy}");

        let samples = [
            Features {
                player_form: 0.4,
                weather: 1.0,
                ..Features::default()
            },
            Features {
                player_form: -0.4,
                weather: 1.0,
                ..Features::default()
            },
        ];
        let p = model.predict(&samples).await.unwrap();
        assert!(p[0] > 0.5 && p[1] < 0.5, "{p:?}");
    }

    #[tokio::test]
    async fn too_few_rows_is_rejected() {
        let mut model = LogisticModel::default();
        let err = model.train(&separable_rows(3), "dc_btts").await.unwrap_err();
        assert_eq!(
            err,
            ModelError::InsufficientData {
                rows: 3,
                required: MIN_TRAINING_ROWS
            }
        );
    }

    #[tokio::test]
    async fn untrained_model_cannot_predict() {
        let model = LogisticModel::default();
        assert_eq!(
            model.predict(&[Features::default()]).await.unwrap_err(),
            ModelError::NotTrained
        );
    }

    #[test]
    fn unknown_model_type_is_rejected() {
        assert!(matches!(
            LogisticFactory.build("lstm"),
            Err(ModelError::UnknownModelType(t)) if t == "lstm"
        ));
    }
}
