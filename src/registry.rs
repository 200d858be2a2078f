//! The fixed set of metric windows created at the start of a run.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;

use crate::config::{ModelArchitecture, RunConfig};
use crate::dashboard::{Dashboard, WindowHandle};
use crate::error::{PlotError, Result};
use crate::plot::{plot_config, plot_line, LineOptions, Scale};
use crate::session::Session;

/// Metric windows a run can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlotKey {
    Elbo,
    CondLogLike,
    Kl,
    ElboImprovement,
    ReconImprovement,
    KlImprovement,
}

impl PlotKey {
    pub fn as_str(self) -> &'static str {
        match self {
            PlotKey::Elbo => "elbo",
            PlotKey::CondLogLike => "cond_log_like",
            PlotKey::Kl => "kl",
            PlotKey::ElboImprovement => "elbo_improvement",
            PlotKey::ReconImprovement => "recon_improvement",
            PlotKey::KlImprovement => "kl_improvement",
        }
    }
}

impl fmt::Display for PlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window handle for every metric of a run.
///
/// Built once by [`initialize_plots`]; keys never change afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowRegistry {
    windows: BTreeMap<PlotKey, WindowHandle>,
}

impl WindowRegistry {
    pub fn get(&self, key: PlotKey) -> Result<&WindowHandle> {
        self.windows
            .get(&key)
            .ok_or(PlotError::MissingWindow(key.as_str()))
    }

    pub fn contains(&self, key: PlotKey) -> bool {
        self.windows.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = PlotKey> + '_ {
        self.windows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlotKey, &WindowHandle)> {
        self.windows.iter().map(|(key, win)| (*key, win))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Title, axis labels and trace names of every window a run needs.
fn window_layouts(run: &RunConfig, arch: &ModelArchitecture) -> Vec<(PlotKey, LineOptions)> {
    let levels = arch.n_levels();
    let metric = |title: &str, ylabel: &str| {
        LineOptions::new(title)
            .labels("Epochs", ylabel)
            .scales(Scale::Log, Scale::Log)
    };

    let mut layouts = vec![
        (
            PlotKey::Elbo,
            metric("ELBO", "-ELBO (Nats)").legend(["Train", "Validation"]),
        ),
        (
            PlotKey::CondLogLike,
            metric("Conditional Log Likelihood", "-log P(x | z) (Nats)")
                .legend(["Train", "Validation"]),
        ),
        (
            PlotKey::Kl,
            metric("KL Divergence", "KL(q || p) (Nats)").legend(
                ["Train", "Validation"]
                    .iter()
                    .flat_map(|split| (0..levels).map(move |l| format!("{}, Level {}", split, l))),
            ),
        ),
    ];

    if run.tracks_improvement() {
        let improvement = |what: &str| {
            LineOptions::new(format!(
                "Ave. Improvement in {} Over Inference Iterations",
                what
            ))
            .labels("Epochs", "Relative Improvement (%)")
            .scales(Scale::Log, Scale::Linear)
        };
        layouts.push((
            PlotKey::ElboImprovement,
            improvement("ELBO").legend(["ELBO"]),
        ));
        layouts.push((
            PlotKey::ReconImprovement,
            improvement("Reconstruction").legend(["log P(x | z)"]),
        ));
        layouts.push((
            PlotKey::KlImprovement,
            improvement("KL Divergence").legend((0..levels).map(|l| format!("Level {}", l))),
        ));
    }

    layouts
}

/// Create the metric windows for a run.
///
/// Each window starts with one not-a-number point per trace at x = 1, which
/// the dashboard draws as a gap.
pub fn initialize_plots<D: Dashboard>(
    session: &mut Session<D>,
    run: &RunConfig,
    arch: &ModelArchitecture,
) -> Result<WindowRegistry> {
    let mut registry = WindowRegistry::default();
    for (key, opts) in window_layouts(run, arch) {
        let traces = opts.legend.len();
        let y = Array2::from_elem((1, traces), f64::NAN);
        let x = Array2::ones((1, traces));
        let win = plot_line(session, y.view(), x.view(), &opts, None)?;
        registry.windows.insert(key, win);
    }

    tracing::info!(
        "Initialized {} metric windows in env '{}'",
        registry.len(),
        session.env()
    );
    Ok(registry)
}

/// Write the configuration panels, then create the metric windows.
pub fn init_plot<D: Dashboard>(
    session: &mut Session<D>,
    run: &RunConfig,
    arch: &ModelArchitecture,
) -> Result<WindowRegistry> {
    plot_config(session, run, arch)?;
    initialize_plots(session, run, arch)
}
