//! Plot primitives: thin wrappers turning arrays plus display options into
//! dashboard window creations and trace appends.
//!
//! Options are lenient. A missing title or legend is simply left empty and
//! only constraints the dashboard itself enforces are checked here.

mod images;

pub use images::{
    encode_png, image_grid, normalize_images, plot_images, plot_video, GRID_PADDING, GRID_ROW,
};

use std::collections::BTreeMap;

use ndarray::ArrayView2;
use serde_json::Value;

pub use crate::dashboard::Scale;
use crate::config::{ModelArchitecture, RunConfig};
use crate::dashboard::{
    Axis, Dashboard, Layout, Panel, Scene, TraceAppend, TraceData, WindowEvent, WindowHandle,
};
use crate::error::{PlotError, Result};
use crate::session::Session;

/// Display options for line plots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineOptions {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    /// One name per trace (column); unnamed traces get their column index.
    pub legend: Vec<String>,
    pub xscale: Scale,
    pub yscale: Scale,
}

impl LineOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn labels(mut self, xlabel: impl Into<String>, ylabel: impl Into<String>) -> Self {
        self.xlabel = xlabel.into();
        self.ylabel = ylabel.into();
        self
    }

    pub fn legend<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.legend = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn scales(mut self, xscale: Scale, yscale: Scale) -> Self {
        self.xscale = xscale;
        self.yscale = yscale;
        self
    }

    fn trace_name(&self, column: usize) -> String {
        self.legend
            .get(column)
            .cloned()
            .unwrap_or_else(|| column.to_string())
    }
}

/// Display options for scatter plots.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterOptions {
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    /// Only used by 3-D scatters
    pub zlabel: String,
    /// Name of label `k` is `legend[k - 1]`.
    pub legend: Vec<String>,
    pub markersize: f32,
}

impl Default for ScatterOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            xlabel: String::new(),
            ylabel: String::new(),
            zlabel: String::new(),
            legend: Vec::new(),
            markersize: 5.0,
        }
    }
}

impl ScatterOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Create a line plot window, or append to `win` when it is given.
///
/// `y` and `x` are `(points, traces)` matrices of the same shape. When
/// appending, column `k` goes to the trace named `opts.legend[k]`.
pub fn plot_line<D: Dashboard>(
    session: &mut Session<D>,
    y: ArrayView2<f64>,
    x: ArrayView2<f64>,
    opts: &LineOptions,
    win: Option<&WindowHandle>,
) -> Result<WindowHandle> {
    if x.shape() != y.shape() {
        return Err(PlotError::shape(
            format!("X of shape {:?}", y.shape()),
            format!("{:?}", x.shape()),
        ));
    }

    if let Some(win) = win {
        let env = session.env().to_string();
        for (k, (ys, xs)) in y.columns().into_iter().zip(x.columns()).enumerate() {
            session.append(TraceAppend::new(
                env.clone(),
                win.clone(),
                opts.trace_name(k),
                xs.to_vec(),
                ys.to_vec(),
            ))?;
        }
        return Ok(win.clone());
    }

    let traces = y
        .columns()
        .into_iter()
        .zip(x.columns())
        .enumerate()
        .map(|(k, (ys, xs))| {
            Panel::Trace(TraceData::line(opts.trace_name(k), xs.to_vec(), ys.to_vec()))
        })
        .collect();

    let event = WindowEvent::new(session.env(), traces)
        .with_layout(Layout {
            title: opts.title.clone(),
            showlegend: !opts.legend.is_empty(),
            xaxis: Axis::new(opts.xlabel.clone(), opts.xscale),
            yaxis: Axis::new(opts.ylabel.clone(), opts.yscale),
            scene: None,
        })
        .with_opt("title", opts.title.clone())
        .with_opt("xlabel", opts.xlabel.clone())
        .with_opt("ylabel", opts.ylabel.clone())
        .with_opt("legend", opts.legend.clone())
        .with_opt("xtype", scale_value(opts.xscale))
        .with_opt("ytype", scale_value(opts.yscale));

    session.create(event)
}

/// Append points to the trace `name` of window `win`.
///
/// The dashboard creates the trace on first use.
pub fn update_trace<D: Dashboard>(
    session: &mut Session<D>,
    win: &WindowHandle,
    name: &str,
    x: &[f64],
    y: &[f64],
) -> Result<()> {
    if x.len() != y.len() {
        return Err(PlotError::shape(
            format!("{} x values", y.len()),
            x.len().to_string(),
        ));
    }
    let env = session.env().to_string();
    let update = TraceAppend::new(env, win.clone(), name, x.to_vec(), y.to_vec());
    session.append(update)
}

/// Scatter plot of 2-D or 3-D points, one trace per label.
///
/// Labels are 1-based class ids; without labels every point is class 1.
pub fn plot_scatter<D: Dashboard>(
    session: &mut Session<D>,
    points: ArrayView2<f32>,
    labels: Option<&[usize]>,
    opts: &ScatterOptions,
) -> Result<WindowHandle> {
    let dims = points.ncols();
    if dims != 2 && dims != 3 {
        return Err(PlotError::InvalidArgument(format!(
            "scatter points need 2 or 3 columns, got {}",
            dims
        )));
    }
    if let Some(labels) = labels {
        if labels.len() != points.nrows() {
            return Err(PlotError::shape(
                format!("{} labels", points.nrows()),
                labels.len().to_string(),
            ));
        }
        if labels.iter().any(|&label| label == 0) {
            return Err(PlotError::InvalidArgument(
                "scatter labels must start at 1".into(),
            ));
        }
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for row in 0..points.nrows() {
        let label = labels.map_or(1, |labels| labels[row]);
        groups.entry(label).or_default().push(row);
    }

    let traces = groups
        .into_iter()
        .map(|(label, rows)| {
            let columns = (0..dims)
                .map(|c| rows.iter().map(|&r| f64::from(points[[r, c]])).collect())
                .collect();
            let name = opts
                .legend
                .get(label - 1)
                .cloned()
                .unwrap_or_else(|| label.to_string());
            Panel::Trace(TraceData::markers(name, columns, opts.markersize))
        })
        .collect();

    let event = WindowEvent::new(session.env(), traces)
        .with_layout(Layout {
            title: opts.title.clone(),
            showlegend: labels.is_some(),
            xaxis: Axis::new(opts.xlabel.clone(), Scale::Linear),
            yaxis: Axis::new(opts.ylabel.clone(), Scale::Linear),
            scene: (dims == 3).then(|| Scene {
                xaxis: Axis::new(opts.xlabel.clone(), Scale::Linear),
                yaxis: Axis::new(opts.ylabel.clone(), Scale::Linear),
                zaxis: Axis::new(opts.zlabel.clone(), Scale::Linear),
            }),
        })
        .with_opt("title", opts.title.clone())
        .with_opt("xlabel", opts.xlabel.clone())
        .with_opt("ylabel", opts.ylabel.clone())
        .with_opt("markersize", f64::from(opts.markersize));

    session.create(event)
}

/// Text panel.
pub fn plot_text<D: Dashboard>(session: &mut Session<D>, text: &str) -> Result<WindowHandle> {
    let event = WindowEvent::new(session.env(), vec![Panel::text(text)]);
    session.create(event)
}

/// Two text panels describing the run configuration and the model.
pub fn plot_config<D: Dashboard>(
    session: &mut Session<D>,
    run: &RunConfig,
    arch: &ModelArchitecture,
) -> Result<(WindowHandle, WindowHandle)> {
    let config_win = plot_text(session, &run.describe()?)?;
    let model_win = plot_text(session, &arch.describe()?)?;
    Ok((config_win, model_win))
}

fn scale_value(scale: Scale) -> Value {
    match scale {
        Scale::Linear => Value::from("linear"),
        Scale::Log => Value::from("log"),
    }
}
