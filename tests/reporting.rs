//! Integration tests for latent-plot reporting
//!
//! Tests cover:
//! 1. Window registry contents as a function of the run configuration
//! 2. Training report points
//! 3. Evaluation report points and improvement values
//! 4. Evaluation visuals
//! 5. Projection argument checks
//! 6. Wire format of recorded requests

use latent_plot::dashboard::DashboardCall;
use latent_plot::{
    init_plot, initialize_plots, project_pca, EvalOutput, ModelArchitecture, OfflineDashboard,
    PlotError, PlotKey, Reporter, RunConfig, ScatterOptions, Session, TrainOutput, WindowHandle,
    WindowRegistry,
};
use ndarray::{Array, Array2, ArrayD, IxDyn};

fn setup(
    n_iterations: usize,
    levels: usize,
) -> (Session<OfflineDashboard>, WindowRegistry, RunConfig, ModelArchitecture) {
    let mut session = Session::offline("test_env");
    let run = RunConfig::new(4, 20, n_iterations);
    let arch = ModelArchitecture::new(vec![8; levels]);
    let registry = initialize_plots(&mut session, &run, &arch).expect("registry");
    session.dashboard_mut().take_calls();
    (session, registry, run, arch)
}

/// `(x, y)` of every point appended to `name` in `win`.
fn points(
    session: &Session<OfflineDashboard>,
    win: &WindowHandle,
    name: &str,
) -> Vec<(f64, f64)> {
    session
        .dashboard()
        .appends_to(win)
        .filter(|update| update.name == name)
        .flat_map(|update| update.x().iter().copied().zip(update.y().iter().copied()))
        .collect()
}

fn eval_output(n: usize, slots: usize, levels: usize) -> EvalOutput {
    let metric = |scale: f32| {
        Array2::from_shape_fn((n, slots), |(_, s)| scale * (slots - s) as f32)
    };
    EvalOutput {
        elbo: metric(10.0),
        cond_log_like: metric(6.0),
        kl: (0..levels).map(|l| metric(l as f32 + 1.0)).collect(),
        labels: (0..n).map(|i| i % 3).collect(),
        reconstructions: Array::from_shape_fn(IxDyn(&[n, slots, 16]), |idx| {
            (idx[0] + idx[2]) as f32 / 32.0
        }),
        posterior: (0..levels)
            .map(|l| {
                Array::from_shape_fn(IxDyn(&[n, slots, 2, 3]), |idx| {
                    ((idx[0] * 7 + idx[3] * 3 + l) % 11) as f32 + (idx[0] % 3) as f32 * 4.0
                })
            })
            .collect(),
        prior: (0..levels)
            .map(|_| ArrayD::zeros(IxDyn(&[n, slots, 2, 3])))
            .collect(),
        samples: ArrayD::from_elem(IxDyn(&[5, 16]), 0.5),
    }
}

// ============================================================================
// Test 1: Window registry
// ============================================================================

#[test]
fn test_registry_keys_follow_iterations() {
    let (_, single, _, _) = setup(1, 2);
    let (_, multi, _, _) = setup(5, 2);

    assert_eq!(
        single.keys().collect::<Vec<_>>(),
        [PlotKey::Elbo, PlotKey::CondLogLike, PlotKey::Kl]
    );
    assert_eq!(
        multi.keys().collect::<Vec<_>>(),
        [
            PlotKey::Elbo,
            PlotKey::CondLogLike,
            PlotKey::Kl,
            PlotKey::ElboImprovement,
            PlotKey::ReconImprovement,
            PlotKey::KlImprovement,
        ]
    );
}

#[test]
fn test_registry_keys_are_deterministic() {
    let run = RunConfig::new(16, 3, 2);
    let arch = ModelArchitecture::new(vec![4, 4, 4]);

    let first = initialize_plots(&mut Session::offline("a"), &run, &arch).unwrap();
    let second = initialize_plots(&mut Session::offline("b"), &run, &arch).unwrap();
    assert_eq!(
        first.keys().collect::<Vec<_>>(),
        second.keys().collect::<Vec<_>>()
    );
}

#[test]
fn test_init_plot_adds_config_panels() {
    let mut session = Session::offline("test_env");
    let run = RunConfig::new(4, 20, 1).with_extra("learning_rate", 0.001);
    let arch = ModelArchitecture::new(vec![8]);

    let registry = init_plot(&mut session, &run, &arch).unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(session.dashboard().windows().count(), 5);
}

// ============================================================================
// Test 2: Training report
// ============================================================================

#[test]
fn test_train_pushes_negated_metrics() {
    let (mut session, registry, run, arch) = setup(1, 2);
    let output = TrainOutput {
        elbo: 1.0,
        cond_log_like: 2.0,
        kl: vec![0.5, 0.3],
    };

    Reporter::new(&mut session, &registry, &run, &arch)
        .train(5, &output)
        .unwrap();

    let elbo = registry.get(PlotKey::Elbo).unwrap();
    let cll = registry.get(PlotKey::CondLogLike).unwrap();
    let kl = registry.get(PlotKey::Kl).unwrap();
    assert_eq!(points(&session, elbo, "Train"), [(5.0, -1.0)]);
    assert_eq!(points(&session, cll, "Train"), [(5.0, -2.0)]);
    assert_eq!(points(&session, kl, "Train, Level 0"), [(5.0, 0.5)]);
    assert_eq!(points(&session, kl, "Train, Level 1"), [(5.0, 0.3f32 as f64)]);

    // Output is left for the caller
    assert_eq!(output.kl, vec![0.5, 0.3]);
}

#[test]
fn test_train_rejects_wrong_level_count() {
    let (mut session, registry, run, arch) = setup(1, 2);
    let output = TrainOutput {
        elbo: 1.0,
        cond_log_like: 1.0,
        kl: vec![0.1],
    };

    let result = Reporter::new(&mut session, &registry, &run, &arch).train(1, &output);
    assert!(matches!(result, Err(PlotError::ShapeMismatch { .. })));
    assert!(session.dashboard().calls().is_empty());
}

// ============================================================================
// Test 3: Evaluation report
// ============================================================================

#[test]
fn test_evaluation_uses_last_slot() {
    let (mut session, registry, run, arch) = setup(1, 1);
    let mut output = eval_output(4, 1, 1);
    output.elbo = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();

    Reporter::new(&mut session, &registry, &run, &arch)
        .evaluation(3, &output, None)
        .unwrap();

    let elbo = registry.get(PlotKey::Elbo).unwrap();
    assert_eq!(points(&session, elbo, "Validation"), [(3.0, -2.5)]);
    let kl = registry.get(PlotKey::Kl).unwrap();
    assert_eq!(points(&session, kl, "Validation, Level 0"), [(3.0, 1.0)]);
}

#[test]
fn test_evaluation_improvement() {
    let (mut session, registry, run, arch) = setup(2, 2);
    let mut output = eval_output(2, 3, 2);
    // slot 0 differs on purpose; improvement starts at the first refinement
    output.elbo = Array2::from_shape_vec((2, 3), vec![99.0, 10.0, 5.0, 99.0, 10.0, 5.0]).unwrap();

    Reporter::new(&mut session, &registry, &run, &arch)
        .evaluation(7, &output, None)
        .unwrap();

    let elbo_improvement = registry.get(PlotKey::ElboImprovement).unwrap();
    assert_eq!(points(&session, elbo_improvement, "ELBO"), [(7.0, 50.0)]);

    let elbo = registry.get(PlotKey::Elbo).unwrap();
    assert_eq!(points(&session, elbo, "Validation"), [(7.0, -5.0)]);

    let kl_improvement = registry.get(PlotKey::KlImprovement).unwrap();
    assert_eq!(points(&session, kl_improvement, "Level 0").len(), 1);
    assert_eq!(points(&session, kl_improvement, "Level 1").len(), 1);

    let recon = registry.get(PlotKey::ReconImprovement).unwrap();
    assert_eq!(points(&session, recon, "log P(x | z)"), [(7.0, 50.0)]);
}

#[test]
fn test_single_iteration_skips_improvement() {
    let (mut session, registry, run, arch) = setup(1, 2);
    let output = eval_output(3, 2, 2);

    Reporter::new(&mut session, &registry, &run, &arch)
        .evaluation(1, &output, None)
        .unwrap();

    // 2 headline metrics + 2 KL levels
    assert_eq!(session.dashboard().appends().count(), 4);
}

// ============================================================================
// Test 4: Evaluation visuals
// ============================================================================

#[test]
fn test_evaluation_visuals() {
    let (mut session, registry, run, arch) = setup(2, 2);
    let output = eval_output(12, 2, 2);

    Reporter::new(&mut session, &registry, &run, &arch)
        .evaluation(4, &output, Some(&[4, 4, 1]))
        .unwrap();

    let windows: Vec<_> = session.dashboard().windows().map(|(_, e)| e).collect();
    let titles: Vec<_> = windows.iter().filter_map(|e| e.title()).collect();
    assert_eq!(
        titles,
        [
            "Reconstructions, Epoch 4",
            "Samples, Epoch 4",
            "T-SNE Posterior Mean, Epoch 4, Level 0",
            "T-SNE Posterior Mean, Epoch 4, Level 1",
        ]
    );

    // Labels 0..3 become classes 1..=3
    let scatter = windows[2];
    let names: Vec<_> = scatter.traces().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["1", "2", "3"]);
    assert!(scatter.traces().all(|t| t.z.is_some()));
}

#[test]
fn test_visuals_reject_bad_item_shape() {
    let (mut session, registry, run, arch) = setup(2, 1);
    let output = eval_output(8, 2, 1);

    let result = Reporter::new(&mut session, &registry, &run, &arch).evaluation(
        1,
        &output,
        Some(&[5, 5, 1]),
    );
    assert!(matches!(result, Err(PlotError::ShapeMismatch { .. })));
}

#[test]
fn test_visuals_reject_missing_posterior_level() {
    let (mut session, registry, run, arch) = setup(2, 2);
    let mut output = eval_output(8, 2, 2);
    output.posterior.pop();

    let result = Reporter::new(&mut session, &registry, &run, &arch).evaluation(
        1,
        &output,
        Some(&[4, 4, 1]),
    );
    assert!(matches!(result, Err(PlotError::ShapeMismatch { .. })));
    assert!(session.dashboard().calls().is_empty());

    // Without visuals the posterior is not read
    Reporter::new(&mut session, &registry, &run, &arch)
        .evaluation(1, &output, None)
        .unwrap();
}

// ============================================================================
// Test 5: Projection argument checks
// ============================================================================

#[test]
fn test_projection_invalid_dims_sends_nothing() {
    let mut session = Session::offline("test_env");
    let data = ArrayD::<f32>::zeros(IxDyn(&[10, 4]));

    let result = project_pca(&mut session, data.view(), None, 5, &ScatterOptions::default());
    assert!(matches!(result, Err(PlotError::InvalidArgument(_))));
    assert!(session.dashboard().calls().is_empty());
}

// ============================================================================
// Test 6: Wire format
// ============================================================================

#[test]
fn test_initial_nan_serializes_as_null() {
    let mut session = Session::offline("test_env");
    let run = RunConfig::new(4, 20, 1);
    let arch = ModelArchitecture::new(vec![8]);
    initialize_plots(&mut session, &run, &arch).unwrap();

    match &session.dashboard().calls()[0] {
        DashboardCall::Create { event, .. } => {
            let json = serde_json::to_value(event).unwrap();
            assert_eq!(json["data"][0]["y"], serde_json::json!([null]));
            assert_eq!(json["data"][0]["x"], serde_json::json!([1.0]));
            assert_eq!(json["eid"], "test_env");
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[test]
fn test_update_body_is_single_trace_list() {
    let (mut session, registry, run, arch) = setup(1, 2);
    let output = TrainOutput {
        elbo: 1.0,
        cond_log_like: 2.0,
        kl: vec![0.5, 0.3],
    };
    Reporter::new(&mut session, &registry, &run, &arch)
        .train(5, &output)
        .unwrap();

    let appends: Vec<_> = session.dashboard().appends().collect();
    assert_eq!(appends.len(), 4);
    for update in appends {
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["append"], true);
        assert_eq!(json["eid"], "test_env");

        let data = json["data"].as_array().expect("data must be a list of traces");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], json["name"]);
        assert_eq!(data[0]["x"], serde_json::json!([5.0]));
        assert_eq!(data[0]["type"], "scatter");
        assert_eq!(data[0]["mode"], "lines");
    }
}
