//! t-Distributed Stochastic Neighbor Embedding (t-SNE).
//!
//! Exact O(n^2) variant: fine for a validation batch, not for a dataset.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{utils, EmbeddingError, Result};

/// t-SNE for non-linear dimensionality reduction.
///
/// Without a seed every call starts from a different random layout, so two
/// runs on the same data give different (equally valid) pictures.
#[derive(Debug, Clone)]
pub struct TSNE {
    /// Target dimensionality (usually 2 or 3)
    n_components: usize,
    /// Effective number of neighbors
    perplexity: f32,
    learning_rate: f32,
    n_iter: usize,
    early_exaggeration: f32,
    early_exaggeration_iter: usize,
    momentum: f32,
    /// Momentum after the early exaggeration phase
    final_momentum: f32,
    min_gain: f32,
    seed: Option<u64>,
}

impl Default for TSNE {
    fn default() -> Self {
        Self::new(3)
    }
}

impl TSNE {
    pub fn new(n_components: usize) -> Self {
        Self::builder().n_components(n_components).build()
    }

    pub fn builder() -> TSNEBuilder {
        TSNEBuilder::default()
    }

    pub fn perplexity(&self) -> f32 {
        self.perplexity
    }

    /// Smallest sample count the configured perplexity supports: the
    /// perplexity must stay below the number of samples.
    pub fn min_samples(&self) -> usize {
        self.perplexity.floor() as usize + 1
    }

    /// Embed `data` (n_samples x n_features) into `n_components` dimensions.
    pub fn fit_transform(&self, data: ArrayView2<f32>) -> Result<Array2<f32>> {
        if self.n_components == 0 {
            return Err(EmbeddingError::InvalidParameter(
                "n_components must be positive".to_string(),
            ));
        }
        if self.perplexity <= 0.0 {
            return Err(EmbeddingError::InvalidParameter(
                "perplexity must be positive".to_string(),
            ));
        }
        utils::check_finite(data)?;

        let n = data.nrows();
        let min_samples = self.min_samples();
        if n < min_samples {
            return Err(EmbeddingError::InsufficientData {
                min: min_samples,
                got: n,
            });
        }

        let distances = utils::squared_distances(data);
        let p = self.joint_probabilities(&distances)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut embedding = Array2::from_shape_simple_fn((n, self.n_components), || {
            rng.gen_range(-1e-4f32..1e-4)
        });

        let mut gains = Array2::<f32>::ones((n, self.n_components));
        let mut velocities = Array2::<f32>::zeros((n, self.n_components));

        for iter in 0..self.n_iter {
            let (exaggeration, momentum) = if iter < self.early_exaggeration_iter {
                (self.early_exaggeration, self.momentum)
            } else {
                (1.0, self.final_momentum)
            };

            let gradients = self.gradients(&p, exaggeration, &embedding);

            // Adaptive gains: grow when the gradient flips against the velocity
            ndarray::Zip::from(&mut gains)
                .and(&mut velocities)
                .and(&gradients)
                .for_each(|gain, velocity, &grad| {
                    if (grad > 0.0) == (*velocity > 0.0) {
                        *gain = (*gain * 0.8).max(self.min_gain);
                    } else {
                        *gain += 0.2;
                    }
                    *velocity = momentum * *velocity - self.learning_rate * *gain * grad;
                });

            embedding += &velocities;
            utils::center_columns(embedding.view_mut());
        }

        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NumericalError(
                "t-SNE diverged to non-finite coordinates".to_string(),
            ));
        }
        Ok(embedding)
    }

    /// Symmetric joint probabilities P from squared distances.
    fn joint_probabilities(&self, distances: &Array2<f32>) -> Result<Array2<f32>> {
        let n = distances.nrows();
        let target_entropy = f64::from(self.perplexity).ln();
        let mut conditional = Array2::<f32>::zeros((n, n));

        for (i, row) in distances.outer_iter().enumerate() {
            let probs = conditional_row(row, i, target_entropy);
            conditional.row_mut(i).assign(&probs);
        }

        let mut joint = &conditional + &conditional.t();
        joint.mapv_inplace(|v| (v / (2.0 * n as f32)).max(1e-12));
        joint.diag_mut().fill(0.0);
        Ok(joint)
    }

    /// KL(P || Q) gradient with respect to the embedding.
    fn gradients(
        &self,
        p: &Array2<f32>,
        exaggeration: f32,
        embedding: &Array2<f32>,
    ) -> Array2<f32> {
        let n = embedding.nrows();
        let distances = utils::squared_distances(embedding.view());

        // Student-t kernel with one degree of freedom
        let mut kernel = distances.mapv(|d| 1.0 / (1.0 + d));
        kernel.diag_mut().fill(0.0);
        let sum_kernel = kernel.sum().max(1e-12);

        let weights = Array2::from_shape_fn((n, n), |(i, j)| {
            let q = (kernel[[i, j]] / sum_kernel).max(1e-12);
            (exaggeration * p[[i, j]] - q) * kernel[[i, j]]
        });

        let row_sums = weights.sum_axis(Axis(1)).insert_axis(Axis(1));
        (embedding * &row_sums - weights.dot(embedding)) * 4.0
    }
}

/// Conditional probabilities p_{j|i} whose entropy matches the target,
/// found by bisection on the Gaussian precision.
fn conditional_row(distances: ArrayView1<f32>, i: usize, target_entropy: f64) -> Array1<f32> {
    let nearest = distances
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| f64::from(d))
        .fold(f64::INFINITY, f64::min);

    let mut beta = 1.0f64;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut probs = vec![0.0f64; distances.len()];

    for _ in 0..64 {
        let mut sum = 0.0f64;
        let mut weighted = 0.0f64;
        for (j, &d) in distances.iter().enumerate() {
            if j == i {
                probs[j] = 0.0;
                continue;
            }
            // Shift by the nearest distance so the largest term is exp(0)
            let shifted = f64::from(d) - nearest;
            let value = (-beta * shifted).exp();
            probs[j] = value;
            sum += value;
            weighted += shifted * value;
        }

        let entropy = sum.ln() + beta * weighted / sum;
        for value in probs.iter_mut() {
            *value /= sum;
        }

        let diff = entropy - target_entropy;
        if diff.abs() < 1e-5 {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }

    probs.into_iter().map(|v| v as f32).collect()
}

/// Builder for configuring t-SNE.
#[derive(Debug, Clone)]
pub struct TSNEBuilder {
    n_components: usize,
    perplexity: f32,
    learning_rate: f32,
    n_iter: usize,
    early_exaggeration: f32,
    seed: Option<u64>,
}

impl Default for TSNEBuilder {
    fn default() -> Self {
        Self {
            n_components: 3,
            perplexity: 30.0,
            learning_rate: 200.0,
            n_iter: 1000,
            early_exaggeration: 12.0,
            seed: None,
        }
    }
}

impl TSNEBuilder {
    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    /// Set perplexity (effective number of neighbors).
    ///
    /// Typical values: 5-50. Must be below the number of samples.
    pub fn perplexity(mut self, p: f32) -> Self {
        self.perplexity = p;
        self
    }

    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn early_exaggeration(mut self, e: f32) -> Self {
        self.early_exaggeration = e;
        self
    }

    /// Fix the random initialization.
    pub fn seed(mut self, s: Option<u64>) -> Self {
        self.seed = s;
        self
    }

    pub fn build(self) -> TSNE {
        TSNE {
            n_components: self.n_components,
            perplexity: self.perplexity,
            learning_rate: self.learning_rate,
            n_iter: self.n_iter,
            early_exaggeration: self.early_exaggeration,
            early_exaggeration_iter: 250.min(self.n_iter / 4),
            momentum: 0.5,
            final_momentum: 0.8,
            min_gain: 0.01,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Range;

    fn clustered_data(n_clusters: usize, per_cluster: usize, dim: usize) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(12345);
        Array2::from_shape_fn((n_clusters * per_cluster, dim), |(i, d)| {
            let cluster = i / per_cluster;
            (cluster * 10 + d) as f32 + rng.gen_range(-0.5..0.5)
        })
    }

    fn mean_distance(embedding: &Array2<f32>, a: Range<usize>, b: Range<usize>) -> f32 {
        let mut total = 0.0f32;
        let mut count = 0;
        for i in a.clone() {
            for j in b.clone() {
                if i != j {
                    let diff = &embedding.row(i) - &embedding.row(j);
                    total += diff.dot(&diff).sqrt();
                    count += 1;
                }
            }
        }
        total / count as f32
    }

    #[test]
    fn test_tsne_basic() {
        let data = clustered_data(3, 20, 10);
        let tsne = TSNE::builder()
            .n_components(2)
            .perplexity(10.0)
            .n_iter(250)
            .seed(Some(7))
            .build();

        let result = tsne.fit_transform(data.view()).unwrap();
        assert_eq!(result.dim(), (60, 2));
        for &val in result.iter() {
            assert!(val.is_finite());
            assert!(val.abs() < 1000.0);
        }
    }

    #[test]
    fn test_tsne_separates_clusters() {
        let data = clustered_data(2, 30, 5);
        let tsne = TSNE::builder()
            .n_components(3)
            .perplexity(5.0)
            .n_iter(300)
            .seed(Some(3))
            .build();

        let result = tsne.fit_transform(data.view()).unwrap();
        assert_eq!(result.ncols(), 3);

        let within = mean_distance(&result, 0..30, 0..30);
        let across = mean_distance(&result, 0..30, 30..60);
        assert!(within < across, "within {} across {}", within, across);
    }

    #[test]
    fn test_tsne_seed_is_reproducible() {
        let data = clustered_data(2, 10, 4);
        let tsne = TSNE::builder()
            .n_components(2)
            .perplexity(3.0)
            .n_iter(50)
            .seed(Some(1))
            .build();
        let a = tsne.fit_transform(data.view()).unwrap();
        let b = tsne.fit_transform(data.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tsne_insufficient_data() {
        let data = ndarray::array![[1.0f32, 2.0], [3.0, 4.0]];
        let tsne = TSNE::new(2);
        assert!(matches!(
            tsne.fit_transform(data.view()),
            Err(EmbeddingError::InsufficientData { min: 31, got: 2 })
        ));
    }

    #[test]
    fn test_conditional_row_sums_to_one() {
        let distances = Array1::from(vec![0.0f32, 1.0, 4.0, 9.0, 16.0]);
        let probs = conditional_row(distances.view(), 0, 2.0f64.ln());
        assert_eq!(probs[0], 0.0);
        assert!((probs.sum() - 1.0).abs() < 1e-5);
        assert!(probs[1] > probs[4]);
    }
}
