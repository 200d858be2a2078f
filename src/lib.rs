//! Dashboard plotting for hierarchical latent-variable model training.
//!
//! This crate provides:
//! - A [`Session`] bound to one Visdom environment (or an offline recorder)
//! - Plot primitives: line, trace append, scatter, image grid, video, text
//! - PCA and t-SNE projections of latent samples forwarded to scatter plots
//! - A fixed [`WindowRegistry`] of metric windows built from the run config
//! - A [`Reporter`] that pushes training/evaluation outputs into those windows
//!
//! # Example
//!
//! ```rust,ignore
//! use latent_plot::{init_plot, ExperimentConfig, Reporter, Session, TrainOutput};
//!
//! let config = ExperimentConfig::from_file("experiment.json")?;
//! let mut session = Session::open(&config.dashboard)?;
//! let registry = init_plot(&mut session, &config.run, &config.architecture)?;
//!
//! for epoch in 1..=config.run.n_epochs {
//!     let output: TrainOutput = train_epoch(epoch);
//!     Reporter::new(&mut session, &registry, &config.run, &config.architecture)
//!         .train(epoch, &output)?;
//! }
//! session.save()?;
//! ```

pub mod config;
pub mod dashboard;
pub mod embeddings;
pub mod error;
pub mod plot;
pub mod projection;
pub mod registry;
pub mod report;
pub mod session;

pub use config::{DashboardConfig, ExperimentConfig, ModelArchitecture, RunConfig};
pub use dashboard::{
    Dashboard, DashboardCall, OfflineDashboard, TraceAppend, VisdomClient, WindowEvent,
    WindowHandle,
};
pub use embeddings::{EmbeddingError, PCABuilder, TSNEBuilder, PCA, TSNE};
pub use error::{PlotError, Result};
pub use plot::{
    normalize_images, plot_config, plot_images, plot_line, plot_scatter, plot_text, plot_video,
    update_trace, LineOptions, Scale, ScatterOptions,
};
pub use projection::{
    pca_coordinates, project_pca, project_tsne, tsne_coordinates, Projection, TsneSettings,
    TSNE_MAX_POINTS, TSNE_PCA_DIMS,
};
pub use registry::{init_plot, initialize_plots, PlotKey, WindowRegistry};
pub use report::{EvalOutput, Reporter, TrainOutput, FIRST_REFINEMENT};
pub use session::Session;
