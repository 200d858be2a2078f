//! Push training and evaluation outputs into the metric windows.
//!
//! Evaluation arrays carry an iteration axis (axis 1). Slot 0 is the estimate
//! before refinement, slot [`FIRST_REFINEMENT`] the first refinement and the
//! last slot the final one. Headline metrics read the last slot; improvement
//! and visuals start from the first refinement.

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn, Slice};

use crate::config::{ModelArchitecture, RunConfig};
use crate::dashboard::Dashboard;
use crate::error::{PlotError, Result};
use crate::plot::{plot_images, update_trace, ScatterOptions};
use crate::projection::{project_tsne, TsneSettings};
use crate::registry::{PlotKey, WindowRegistry};
use crate::session::Session;

/// Iteration slot holding the first refinement.
pub const FIRST_REFINEMENT: usize = 1;

/// Scalar results of one training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutput {
    pub elbo: f32,
    pub cond_log_like: f32,
    /// One value per latent level
    pub kl: Vec<f32>,
}

/// Per-example results of one evaluation pass.
#[derive(Debug, Clone)]
pub struct EvalOutput {
    /// `(N, S)`
    pub elbo: Array2<f32>,
    /// `(N, S)`
    pub cond_log_like: Array2<f32>,
    /// Per level, `(N, S)`
    pub kl: Vec<Array2<f32>>,
    /// `N` class ids starting at 0
    pub labels: Vec<usize>,
    /// `(N, S, ...)`
    pub reconstructions: ArrayD<f32>,
    /// Per level, `(N, S, 2, ...)`; index 0 of axis 2 is the mean
    pub posterior: Vec<ArrayD<f32>>,
    /// Per level
    pub prior: Vec<ArrayD<f32>>,
    /// `(B, ...)` draws from the generative model
    pub samples: ArrayD<f32>,
}

/// Relative improvement in percent from the first refinement to the last slot:
/// `100 * mean((x[:, 1] - x[:, last]) / x[:, 1])`.
pub fn improvement(values: ArrayView2<f32>) -> Result<f64> {
    let slots = values.ncols();
    if slots <= FIRST_REFINEMENT {
        return Err(PlotError::shape(
            format!("at least {} iteration slots", FIRST_REFINEMENT + 1),
            slots.to_string(),
        ));
    }
    if values.nrows() == 0 {
        return Err(PlotError::InvalidArgument("empty evaluation batch".into()));
    }

    let first = values.column(FIRST_REFINEMENT);
    let last = values.column(slots - 1);
    let total: f64 = first
        .iter()
        .zip(last.iter())
        .map(|(&f, &l)| (f64::from(f) - f64::from(l)) / f64::from(f))
        .sum();
    Ok(100.0 * total / values.nrows() as f64)
}

/// Sends one run's outputs to its metric windows.
pub struct Reporter<'a, D: Dashboard> {
    session: &'a mut Session<D>,
    registry: &'a WindowRegistry,
    run: &'a RunConfig,
    arch: &'a ModelArchitecture,
}

impl<'a, D: Dashboard> Reporter<'a, D> {
    pub fn new(
        session: &'a mut Session<D>,
        registry: &'a WindowRegistry,
        run: &'a RunConfig,
        arch: &'a ModelArchitecture,
    ) -> Self {
        Self {
            session,
            registry,
            run,
            arch,
        }
    }

    /// Record one training epoch as `Train` points at x = `epoch`.
    pub fn train(&mut self, epoch: usize, output: &TrainOutput) -> Result<()> {
        self.check_levels(output.kl.len())?;

        self.push(PlotKey::Elbo, "Train", epoch, -f64::from(output.elbo))?;
        self.push(
            PlotKey::CondLogLike,
            "Train",
            epoch,
            -f64::from(output.cond_log_like),
        )?;
        for (level, &kl) in output.kl.iter().enumerate() {
            let name = format!("Train, Level {}", level);
            self.push(PlotKey::Kl, &name, epoch, f64::from(kl))?;
        }

        tracing::debug!("Reported training epoch {}", epoch);
        Ok(())
    }

    /// Record one evaluation pass.
    ///
    /// `visuals` is the shape of one data item; when given, reconstructions,
    /// samples and a t-SNE of each level's posterior mean are also shown.
    /// Posterior t-SNE runs on at most [`TSNE_MAX_POINTS`](crate::TSNE_MAX_POINTS)
    /// evenly spaced examples.
    pub fn evaluation(
        &mut self,
        epoch: usize,
        output: &EvalOutput,
        visuals: Option<&[usize]>,
    ) -> Result<()> {
        self.check_levels(output.kl.len())?;
        if visuals.is_some() {
            self.check_levels(output.posterior.len())?;
        }
        let slots = output.elbo.ncols();
        if slots == 0 {
            return Err(PlotError::InvalidArgument(
                "evaluation output has no iteration slots".into(),
            ));
        }
        let metrics = std::iter::once(&output.cond_log_like).chain(&output.kl);
        for (index, values) in metrics.enumerate() {
            if values.dim() != output.elbo.dim() {
                return Err(PlotError::shape(
                    format!("metric {} of shape {:?}", index, output.elbo.dim()),
                    format!("{:?}", values.dim()),
                ));
            }
        }

        let last = slots - 1;
        self.push(
            PlotKey::Elbo,
            "Validation",
            epoch,
            -column_mean(output.elbo.view(), last)?,
        )?;
        self.push(
            PlotKey::CondLogLike,
            "Validation",
            epoch,
            -column_mean(output.cond_log_like.view(), last)?,
        )?;
        for (level, kl) in output.kl.iter().enumerate() {
            let name = format!("Validation, Level {}", level);
            self.push(PlotKey::Kl, &name, epoch, column_mean(kl.view(), last)?)?;
        }

        if self.run.tracks_improvement() {
            self.push_improvement(PlotKey::ElboImprovement, "ELBO", epoch, output.elbo.view())?;
            self.push_improvement(
                PlotKey::ReconImprovement,
                "log P(x | z)",
                epoch,
                output.cond_log_like.view(),
            )?;
            for (level, kl) in output.kl.iter().enumerate() {
                let name = format!("Level {}", level);
                self.push_improvement(PlotKey::KlImprovement, &name, epoch, kl.view())?;
            }
        }

        if let Some(item_shape) = visuals {
            self.visuals(epoch, output, item_shape)?;
        }

        tracing::debug!("Reported evaluation epoch {}", epoch);
        Ok(())
    }

    fn visuals(&mut self, epoch: usize, output: &EvalOutput, item_shape: &[usize]) -> Result<()> {
        let refined = refinement_slot(output.reconstructions.view(), "reconstructions")?;
        let shown = self.run.batch_size.min(refined.len_of(Axis(0)));
        let refined = refined.slice_axis(Axis(0), Slice::from(..shown));
        let reconstructions = reshape_items(refined, item_shape, "reconstructions")?;
        plot_images(
            self.session,
            reconstructions.view(),
            &format!("Reconstructions, Epoch {}", epoch),
        )?;

        let samples = reshape_items(output.samples.view(), item_shape, "samples")?;
        plot_images(
            self.session,
            samples.view(),
            &format!("Samples, Epoch {}", epoch),
        )?;

        // Dashboard class ids start at 1
        let labels: Vec<usize> = output.labels.iter().map(|&label| label + 1).collect();
        for (level, posterior) in output.posterior.iter().enumerate() {
            let refined = refinement_slot(posterior.view(), "posterior")?;
            if refined.ndim() < 2 {
                return Err(PlotError::shape(
                    "posterior of shape (N, S, 2, ...)",
                    format!("{:?}", posterior.shape()),
                ));
            }
            let mean = refined.index_axis(Axis(1), 0);
            let opts = ScatterOptions::new(format!(
                "T-SNE Posterior Mean, Epoch {}, Level {}",
                epoch, level
            ));
            project_tsne(
                self.session,
                mean,
                Some(&labels[..]),
                3,
                &opts,
                &TsneSettings::default(),
            )?;
        }
        Ok(())
    }

    fn push_improvement(
        &mut self,
        key: PlotKey,
        name: &str,
        epoch: usize,
        values: ArrayView2<f32>,
    ) -> Result<()> {
        let value = improvement(values)?;
        if !value.is_finite() {
            tracing::warn!(
                "Improvement for '{}' at epoch {} is {} (zero at the first refinement?)",
                name,
                epoch,
                value
            );
        }
        self.push(key, name, epoch, value)
    }

    fn push(&mut self, key: PlotKey, name: &str, epoch: usize, value: f64) -> Result<()> {
        let registry = self.registry;
        let win = registry.get(key)?;
        update_trace(self.session, win, name, &[epoch as f64], &[value])
    }

    fn check_levels(&self, got: usize) -> Result<()> {
        let levels = self.arch.n_levels();
        if got != levels {
            return Err(PlotError::shape(
                format!("{} KL levels", levels),
                got.to_string(),
            ));
        }
        Ok(())
    }
}

fn column_mean(values: ArrayView2<f32>, slot: usize) -> Result<f64> {
    values
        .column(slot)
        .iter()
        .map(|&v| f64::from(v))
        .reduce(|a, b| a + b)
        .map(|sum| sum / values.nrows() as f64)
        .ok_or_else(|| PlotError::InvalidArgument("empty evaluation batch".into()))
}

/// `array[:, FIRST_REFINEMENT]`
fn refinement_slot<'v>(array: ArrayViewD<'v, f32>, what: &str) -> Result<ArrayViewD<'v, f32>> {
    if array.ndim() < 2 || array.shape()[1] <= FIRST_REFINEMENT {
        return Err(PlotError::shape(
            format!("{} with at least {} iteration slots", what, FIRST_REFINEMENT + 1),
            format!("{:?}", array.shape()),
        ));
    }
    Ok(array.index_axis_move(Axis(1), FIRST_REFINEMENT))
}

/// `(N, ...)` to `(N, item_shape...)`.
fn reshape_items(
    items: ArrayViewD<f32>,
    item_shape: &[usize],
    what: &str,
) -> Result<ArrayD<f32>> {
    let n = items.shape().first().copied().unwrap_or(0);
    let mut shape = vec![n];
    shape.extend_from_slice(item_shape);
    ArrayD::from_shape_vec(IxDyn(&shape), items.iter().copied().collect()).map_err(|_| {
        PlotError::shape(
            format!("{} of shape {:?}", what, shape),
            format!("{:?}", items.shape()),
        )
    })
}
