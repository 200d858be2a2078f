//! Dimensionality reduction of latent samples.
//!
//! # Supported Methods
//!
//! - **PCA**: linear projection onto the leading principal components
//! - **t-SNE**: non-linear embedding that preserves local neighborhoods
//!
//! Both operate on `(n_samples, n_features)` matrices.
//!
//! # Example
//!
//! ```rust,ignore
//! use latent_plot::embeddings::PCA;
//!
//! let mut pca = PCA::new(3);
//! let projected = pca.fit_transform(samples.view())?;
//! assert_eq!(projected.ncols(), 3);
//! ```

mod pca;
mod tsne;

pub use pca::{PCABuilder, PCA};
pub use tsne::{TSNEBuilder, TSNE};

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Empty input: no samples provided")]
    EmptyInput,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Insufficient data: need at least {min} samples, got {got}")]
    InsufficientData { min: usize, got: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Not fitted: call fit() before transform()")]
    NotFitted,
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

pub(crate) mod utils {
    use ndarray::{Array1, ArrayView2, ArrayViewMut2, Axis};

    use super::{EmbeddingError, Result};

    /// Reject empty or non-finite input.
    pub fn check_finite(data: ArrayView2<f32>) -> Result<()> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(EmbeddingError::EmptyInput);
        }
        if let Some((i, _)) = data
            .outer_iter()
            .enumerate()
            .find(|(_, row)| row.iter().any(|v| !v.is_finite()))
        {
            return Err(EmbeddingError::NumericalError(format!(
                "Non-finite value at sample {}",
                i
            )));
        }
        Ok(())
    }

    /// Unit-normalize in place. Near-zero vectors are left alone.
    pub fn normalize(v: &mut Array1<f32>) {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-10 {
            v.mapv_inplace(|x| x / norm);
        }
    }

    /// Subtract the column mean from every row.
    pub fn center_columns(mut data: ArrayViewMut2<f32>) {
        if let Some(mean) = data.mean_axis(Axis(0)) {
            data -= &mean;
        }
    }

    /// `n x n` matrix of squared Euclidean distances between rows.
    pub fn squared_distances(data: ArrayView2<f32>) -> ndarray::Array2<f32> {
        let gram = data.dot(&data.t());
        let norms = gram.diag().to_owned();
        let n = data.nrows();
        ndarray::Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                0.0
            } else {
                (norms[i] + norms[j] - 2.0 * gram[[i, j]]).max(0.0)
            }
        })
    }
}
