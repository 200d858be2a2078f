//! Drive the dashboard with a synthetic training run.
//!
//! Usage:
//!   cargo run --example synthetic_run -- --epochs 20
//!   cargo run --example synthetic_run -- --offline
//!
//! Start a Visdom server first (`python -m visdom.server`) unless `--offline`
//! is given.

use clap::Parser;
use ndarray::{Array, Array2, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use latent_plot::{
    init_plot, Dashboard, DashboardConfig, EvalOutput, ModelArchitecture, Reporter, RunConfig,
    Session, TrainOutput,
};

#[derive(Parser)]
#[command(name = "synthetic-run")]
#[command(about = "Plot a fake hierarchical latent-variable training run")]
struct Args {
    /// Visdom server address
    #[arg(long, default_value = "http://localhost")]
    server: String,

    /// Visdom server port
    #[arg(short, long, default_value_t = 8097)]
    port: u16,

    /// Dashboard environment
    #[arg(short, long, default_value = "synthetic")]
    env: String,

    /// Record requests in memory instead of contacting a server
    #[arg(long)]
    offline: bool,

    /// Number of epochs
    #[arg(long, default_value_t = 10)]
    epochs: usize,

    /// Inference iterations per forward pass
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Show image grids and posterior projections every N epochs
    #[arg(long, default_value_t = 5)]
    visual_every: usize,
}

/// Side length of the fake square grayscale images.
const IMAGE_SIDE: usize = 8;
const EVAL_BATCH: usize = 32;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let run = RunConfig::new(16, args.epochs, args.iterations).with_extra("learning_rate", 1e-3);
    let arch = ModelArchitecture::new(vec![32, 16]);

    if args.offline {
        let mut session = Session::offline(args.env.clone());
        drive(&mut session, &run, &arch, &args)?;
        tracing::info!(
            "Recorded {} dashboard requests",
            session.dashboard().calls().len()
        );
    } else {
        let config = DashboardConfig {
            server: args.server.clone(),
            port: args.port,
            ..DashboardConfig::default()
        }
        .with_env(args.env.clone());
        let mut session = Session::open(&config)?;
        drive(&mut session, &run, &arch, &args)?;
        session.save()?;
    }

    Ok(())
}

fn drive<D: Dashboard>(
    session: &mut Session<D>,
    run: &RunConfig,
    arch: &ModelArchitecture,
    args: &Args,
) -> anyhow::Result<()> {
    let registry = init_plot(session, run, arch)?;
    let mut rng = StdRng::seed_from_u64(0);

    for epoch in 1..=run.n_epochs {
        let progress = 1.0 / epoch as f32;
        let train = TrainOutput {
            elbo: -(100.0 + 400.0 * progress),
            cond_log_like: -(80.0 + 300.0 * progress),
            kl: (0..arch.n_levels())
                .map(|level| 10.0 + 20.0 * progress / (level + 1) as f32)
                .collect(),
        };

        let show_visuals = args.visual_every > 0 && epoch % args.visual_every == 0;
        let eval = fake_evaluation(&mut rng, run, arch, progress);

        let mut reporter = Reporter::new(session, &registry, run, arch);
        reporter.train(epoch, &train)?;
        let item_shape = [IMAGE_SIDE, IMAGE_SIDE, 1];
        reporter.evaluation(epoch, &eval, show_visuals.then_some(&item_shape[..]))?;

        tracing::info!("Epoch {}: train ELBO {:.2}", epoch, train.elbo);
    }

    Ok(())
}

/// Evaluation output whose metrics improve over epochs and iteration slots.
fn fake_evaluation(
    rng: &mut StdRng,
    run: &RunConfig,
    arch: &ModelArchitecture,
    progress: f32,
) -> EvalOutput {
    let slots = run.n_iterations + 1;
    let pixels = IMAGE_SIDE * IMAGE_SIDE;
    let mut metric = |base: f32| {
        Array2::from_shape_fn((EVAL_BATCH, slots), |(_, s)| {
            base * (1.0 + progress) * (1.0 - 0.05 * s as f32) + rng.gen_range(-1.0..1.0)
        })
    };

    let elbo = metric(-120.0);
    let cond_log_like = metric(-90.0);
    let kl = (0..arch.n_levels()).map(|_| metric(12.0)).collect();
    let labels: Vec<usize> = (0..EVAL_BATCH).map(|i| i % 4).collect();

    let posterior = arch
        .n_latent
        .iter()
        .map(|&dims| {
            Array::from_shape_fn(IxDyn(&[EVAL_BATCH, slots, 2, dims]), |idx| {
                labels[idx[0]] as f32 * 3.0 + rng.gen_range(-0.5..0.5)
            })
        })
        .collect();
    let prior = arch
        .n_latent
        .iter()
        .map(|&dims| ArrayD::zeros(IxDyn(&[EVAL_BATCH, slots, 2, dims])))
        .collect();

    EvalOutput {
        elbo,
        cond_log_like,
        kl,
        reconstructions: Array::from_shape_fn(IxDyn(&[EVAL_BATCH, slots, pixels]), |_| {
            rng.gen_range(0.0..1.0)
        }),
        posterior,
        prior,
        samples: Array::from_shape_fn(IxDyn(&[16, pixels]), |_| rng.gen_range(0.0..1.0)),
        labels,
    }
}
