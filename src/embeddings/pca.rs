//! Principal Component Analysis (PCA).
//!
//! Eigenvectors come from power iteration with deflation. When there are
//! fewer samples than features the `n x n` Gram matrix is decomposed
//! instead of the `d x d` covariance, which keeps 784-pixel images cheap.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use super::{utils, EmbeddingError, Result};

/// Principal Component Analysis for dimensionality reduction.
#[derive(Debug, Clone)]
pub struct PCA {
    /// Number of components to keep
    n_components: usize,
    /// Principal axes, one per row (n_components x n_features)
    components: Option<Array2<f32>>,
    /// Mean of training data
    mean: Option<Array1<f32>>,
    /// Variance captured by each component
    explained_variance: Option<Array1<f32>>,
    /// Total variance in original data
    total_variance: Option<f32>,
    /// Maximum iterations for power iteration
    max_iter: usize,
    /// Convergence tolerance
    tolerance: f32,
}

impl Default for PCA {
    fn default() -> Self {
        Self::new(3)
    }
}

impl PCA {
    /// Create a new PCA instance with specified number of components.
    pub fn new(n_components: usize) -> Self {
        Self::builder().n_components(n_components).build()
    }

    pub fn builder() -> PCABuilder {
        PCABuilder::default()
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Fit to `data` (n_samples x n_features).
    ///
    /// At most `min(n_samples, n_features)` components are extracted.
    pub fn fit(&mut self, data: ArrayView2<f32>) -> Result<&mut Self> {
        if self.n_components == 0 {
            return Err(EmbeddingError::InvalidParameter(
                "n_components must be positive".to_string(),
            ));
        }
        utils::check_finite(data)?;

        let (n_samples, n_features) = data.dim();
        let mean = data.mean_axis(Axis(0)).ok_or(EmbeddingError::EmptyInput)?;
        let mut centered = data.to_owned();
        utils::center_columns(centered.view_mut());

        let scale = 1.0 / (n_samples as f32 - 1.0).max(1.0);
        let total_variance = centered.iter().map(|v| v * v).sum::<f32>() * scale;
        let k = self.n_components.min(n_features).min(n_samples);

        let (components, eigenvalues) = if n_features <= n_samples {
            let cov = centered.t().dot(&centered) * scale;
            self.power_iteration(cov, k)
        } else {
            // Eigenvectors of X X^T map to principal axes through X^T.
            let gram = centered.dot(&centered.t()) * scale;
            let (left, eigenvalues) = self.power_iteration(gram, k);
            let mut axes = left.dot(&centered);
            for mut axis in axes.outer_iter_mut() {
                let mut owned = axis.to_owned();
                utils::normalize(&mut owned);
                axis.assign(&owned);
            }
            (axes, eigenvalues)
        };

        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = Some(eigenvalues);
        self.total_variance = Some(total_variance);
        Ok(self)
    }

    /// Project `data` onto the fitted components.
    pub fn transform(&self, data: ArrayView2<f32>) -> Result<Array2<f32>> {
        let components = self.components.as_ref().ok_or(EmbeddingError::NotFitted)?;
        let mean = self.mean.as_ref().ok_or(EmbeddingError::NotFitted)?;

        if data.ncols() != mean.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: mean.len(),
                got: data.ncols(),
            });
        }

        let centered = &data - mean;
        Ok(centered.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, data: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.fit(data)?;
        self.transform(data)
    }

    /// Fraction of total variance captured by each component.
    pub fn explained_variance_ratio(&self) -> Option<Vec<f32>> {
        let explained = self.explained_variance.as_ref()?;
        let total = self.total_variance?;

        if total < 1e-10 {
            return None;
        }

        Some(explained.iter().map(|&v| v / total).collect())
    }

    /// Leading `k` eigenpairs of a symmetric matrix, eigenvectors as rows.
    fn power_iteration(&self, mut mat: Array2<f32>, k: usize) -> (Array2<f32>, Array1<f32>) {
        let n = mat.nrows();
        let mut vectors = Array2::<f32>::zeros((k, n));
        let mut eigenvalues = Array1::<f32>::zeros(k);

        for c in 0..k {
            let mut v = Array1::from_shape_fn(n, |i| ((i * 7 + 13) % 100) as f32 / 100.0);
            utils::normalize(&mut v);
            let mut eigenvalue = 0.0f32;

            for _ in 0..self.max_iter {
                let mut next = mat.dot(&v);
                // Rayleigh quotient
                let estimate = next.dot(&v);
                utils::normalize(&mut next);

                let diff: f32 = (&v - &next).iter().map(|d| d.abs()).sum();
                v = next;
                eigenvalue = estimate;
                if diff < self.tolerance {
                    break;
                }
            }

            // Deflate: A -= lambda * v v^T
            let column = v.view().insert_axis(Axis(1));
            mat.scaled_add(-eigenvalue, &column.dot(&column.t()));

            vectors.row_mut(c).assign(&v);
            eigenvalues[c] = eigenvalue.max(0.0);
        }

        (vectors, eigenvalues)
    }
}

/// Builder for configuring PCA.
#[derive(Debug, Clone)]
pub struct PCABuilder {
    n_components: usize,
    max_iter: usize,
    tolerance: f32,
}

impl Default for PCABuilder {
    fn default() -> Self {
        Self {
            n_components: 3,
            max_iter: 200,
            tolerance: 1e-6,
        }
    }
}

impl PCABuilder {
    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    /// Set maximum iterations for power iteration.
    pub fn max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    pub fn tolerance(mut self, tol: f32) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn build(self) -> PCA {
        PCA {
            n_components: self.n_components,
            components: None,
            mean: None,
            explained_variance: None,
            total_variance: None,
            max_iter: self.max_iter,
            tolerance: self.tolerance,
        }
    }
}
