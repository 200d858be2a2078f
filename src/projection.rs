//! Reduce batches of latent samples to 2-D/3-D coordinates and scatter them.
//!
//! Axis 0 of the input is the sample axis; every other axis is flattened into
//! features. The returned coordinates always have exactly `target_dims`
//! columns, with missing components zero-filled.

use ndarray::{s, Array2, ArrayViewD, Axis};

use crate::dashboard::{Dashboard, WindowHandle};
use crate::embeddings::{EmbeddingError, PCA, TSNE};
use crate::error::{PlotError, Result};
use crate::plot::{plot_scatter, ScatterOptions};
use crate::session::Session;

/// Feature count above which t-SNE input is first reduced with PCA.
pub const TSNE_PCA_DIMS: usize = 100;

/// Default cap on the samples [`project_tsne`] embeds. Exact t-SNE is
/// quadratic in the sample count.
pub const TSNE_MAX_POINTS: usize = 1000;

/// Perplexity used once a batch has more than this many samples.
const DEFAULT_PERPLEXITY: usize = 30;

/// Coordinates sent to the dashboard and the scatter window showing them.
#[derive(Debug, Clone)]
pub struct Projection {
    pub coords: Array2<f32>,
    /// Input row of each coordinate row
    pub rows: Vec<usize>,
    pub window: WindowHandle,
}

/// How [`project_tsne`] runs t-SNE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsneSettings {
    /// Fixed random initialization; `None` differs between calls
    pub seed: Option<u64>,
    /// Larger batches are thinned to this many evenly spaced samples
    pub max_points: usize,
}

impl Default for TsneSettings {
    fn default() -> Self {
        Self {
            seed: None,
            max_points: TSNE_MAX_POINTS,
        }
    }
}

impl TsneSettings {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }
}

/// PCA coordinates of `data` with `target_dims` (2 or 3) columns.
pub fn pca_coordinates(data: ArrayViewD<f32>, target_dims: usize) -> Result<Array2<f32>> {
    check_target_dims(target_dims)?;
    let samples = flatten_samples(data)?;
    let projected = PCA::new(target_dims).fit_transform(samples.view())?;
    Ok(zero_fill(projected, target_dims))
}

/// t-SNE coordinates of `data` with `target_dims` (2 or 3) columns.
///
/// Without a seed the layout differs between calls.
pub fn tsne_coordinates(
    data: ArrayViewD<f32>,
    target_dims: usize,
    seed: Option<u64>,
) -> Result<Array2<f32>> {
    check_target_dims(target_dims)?;
    embed_tsne(flatten_samples(data)?, target_dims, seed)
}

fn embed_tsne(
    mut samples: Array2<f32>,
    target_dims: usize,
    seed: Option<u64>,
) -> Result<Array2<f32>> {
    let n = samples.nrows();
    if n < 4 {
        return Err(EmbeddingError::InsufficientData { min: 4, got: n }.into());
    }

    if samples.ncols() > TSNE_PCA_DIMS {
        tracing::debug!(
            "Reducing {} features to {} with PCA before t-SNE",
            samples.ncols(),
            TSNE_PCA_DIMS
        );
        samples = PCA::new(TSNE_PCA_DIMS).fit_transform(samples.view())?;
    }

    // Small batches cannot support the default perplexity
    let perplexity = if n > DEFAULT_PERPLEXITY {
        DEFAULT_PERPLEXITY
    } else {
        ((n - 1) / 3).max(1)
    };
    let embedded = TSNE::builder()
        .n_components(target_dims)
        .perplexity(perplexity as f32)
        .seed(seed)
        .build()
        .fit_transform(samples.view())?;
    Ok(zero_fill(embedded, target_dims))
}

/// PCA projection of `data` forwarded to [`plot_scatter`].
pub fn project_pca<D: Dashboard>(
    session: &mut Session<D>,
    data: ArrayViewD<f32>,
    labels: Option<&[usize]>,
    target_dims: usize,
    opts: &ScatterOptions,
) -> Result<Projection> {
    let coords = pca_coordinates(data, target_dims)?;
    let window = plot_scatter(session, coords.view(), labels, opts)?;
    Ok(Projection {
        rows: (0..coords.nrows()).collect(),
        coords,
        window,
    })
}

/// t-SNE projection of `data` forwarded to [`plot_scatter`].
///
/// Batches above `settings.max_points` are thinned to evenly spaced rows,
/// with their labels; [`Projection::rows`] lists the rows kept.
pub fn project_tsne<D: Dashboard>(
    session: &mut Session<D>,
    data: ArrayViewD<f32>,
    labels: Option<&[usize]>,
    target_dims: usize,
    opts: &ScatterOptions,
    settings: &TsneSettings,
) -> Result<Projection> {
    check_target_dims(target_dims)?;
    let samples = flatten_samples(data)?;
    let n = samples.nrows();
    if let Some(labels) = labels {
        if labels.len() != n {
            return Err(PlotError::shape(
                format!("{} labels", n),
                labels.len().to_string(),
            ));
        }
    }

    let rows = spaced_rows(n, settings.max_points);
    let (samples, labels) = if rows.len() < n {
        tracing::info!(
            "t-SNE on {} of {} samples ({})",
            rows.len(),
            n,
            opts.title
        );
        let kept: Option<Vec<usize>> =
            labels.map(|labels| rows.iter().map(|&r| labels[r]).collect());
        (samples.select(Axis(0), &rows), kept)
    } else {
        (samples, labels.map(<[usize]>::to_vec))
    };

    let coords = embed_tsne(samples, target_dims, settings.seed)?;
    let window = plot_scatter(session, coords.view(), labels.as_deref(), opts)?;
    Ok(Projection {
        coords,
        rows,
        window,
    })
}

/// Up to `max` evenly spaced indices out of `0..n`, in order.
fn spaced_rows(n: usize, max: usize) -> Vec<usize> {
    if n <= max {
        return (0..n).collect();
    }
    (0..max).map(|k| k * n / max).collect()
}

fn check_target_dims(target_dims: usize) -> Result<()> {
    if target_dims == 2 || target_dims == 3 {
        Ok(())
    } else {
        Err(PlotError::InvalidArgument(format!(
            "projections need 2 or 3 dimensions, got {}",
            target_dims
        )))
    }
}

/// `(N, ...)` to `(N, features)` in row-major order.
fn flatten_samples(data: ArrayViewD<f32>) -> Result<Array2<f32>> {
    let shape = data.shape();
    let n = *shape.first().ok_or_else(|| {
        PlotError::InvalidArgument("samples need at least one axis".into())
    })?;
    let features = shape[1..].iter().product::<usize>();
    Array2::from_shape_vec((n, features), data.iter().copied().collect())
        .map_err(|e| PlotError::InvalidArgument(e.to_string()))
}

fn zero_fill(coords: Array2<f32>, target_dims: usize) -> Array2<f32> {
    if coords.ncols() >= target_dims {
        return coords;
    }
    let mut filled = Array2::zeros((coords.nrows(), target_dims));
    filled.slice_mut(s![.., ..coords.ncols()]).assign(&coords);
    filled
}
