use aggregation::clock::{Clock, StepClock};
use orchestrator::{Config, Metrics, OrchestratorError, Session, configs::TrainMode};

fn regression_config() -> Config {
    Config::from_json(
        r#"{
            "seed": 7,
            "num_epochs": 40,
            "num_batches": 4,
            "batch_size": 8,
            "aggregation_rule": { "rule": "coordinate_median" },
            "optimizer": { "kind": "gradient_descent", "lr": 0.05 },
            "model": { "layers": [{ "dim": [3, 1] }] },
            "loss": "mse",
            "data": { "source": "regression", "samples": 80, "features": 3, "noise": 0.05 },
            "test_fraction": 0.2
        }"#,
    )
    .unwrap()
}

fn step_clock() -> Box<dyn Clock> {
    Box::new(StepClock::new(0.001))
}

#[test]
fn regression_loss_goes_down() {
    let session = Session::new(regression_config()).unwrap().with_clock(step_clock);
    let runs = session.run().unwrap();
    assert_eq!(runs.len(), 1);

    let metrics = &runs[0];
    let first = metrics.train_loss[0];
    let last = *metrics.train_loss.last().unwrap();

    assert!(!metrics.diverged);
    assert!(last < 0.5 * first, "{first} -> {last}");
    assert_eq!(metrics.train_loss.len(), 40);
    assert_eq!(metrics.test_loss.len(), 40);
    assert_eq!(metrics.test_acc.len(), 40);
    // 64 training samples in batches of 8, aggregated 4 at a time.
    assert_eq!(metrics.num_grad_steps, 40 * 8);
    assert_eq!(metrics.num_opt_steps, 40 * 2);
    assert_eq!(metrics.num_param, 4);
}

#[test]
fn same_seed_gives_identical_json() {
    let mut config = regression_config();
    config.num_epochs = 5;
    config.compression_rule =
        serde_json::from_str(r#"{ "rule": "random_k", "ratio": 0.5 }"#).unwrap();

    let run = || {
        let session = Session::new(config.clone()).unwrap().with_clock(step_clock);
        Metrics::to_json(&session.run().unwrap()).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn repeats_use_consecutive_seeds() {
    let mut config = regression_config();
    config.num_epochs = 3;
    config.n_repeat = 2.try_into().unwrap();

    let session = Session::new(config.clone()).unwrap().with_clock(step_clock);
    let runs = session.run().unwrap();
    assert_eq!(runs.len(), 2);
    assert_ne!(runs[0].train_loss, runs[1].train_loss);

    // The second repetition is the run seeded with `seed + 1`.
    let second = session.run_once(config.seed + 1).unwrap();
    assert_eq!(second, runs[1]);
}

#[test]
fn vanilla_mode_steps_every_batch() {
    let mut config = regression_config();
    config.num_epochs = 2;
    config.train_mode = TrainMode::Vanilla;

    let runs = Session::new(config).unwrap().run().unwrap();
    assert_eq!(runs[0].num_opt_steps, 2 * 8);
    assert!(runs[0].jacobian_residual.is_empty());
}

#[test]
fn federated_mode_is_unimplemented() {
    let mut config = regression_config();
    config.train_mode = TrainMode::Federated;

    let session = Session::new(config).unwrap();
    assert!(matches!(
        session.run(),
        Err(OrchestratorError::Unimplemented(_))
    ));
}

#[test]
fn unknown_names_are_config_errors() {
    let json = serde_json::to_value(regression_config()).unwrap();

    let mut unknown_field = json.clone();
    unknown_field["momentum"] = serde_json::json!(0.9);
    assert!(matches!(
        Config::from_json(&unknown_field.to_string()),
        Err(OrchestratorError::InvalidConfig(_))
    ));

    let mut unknown_rule = json;
    unknown_rule["aggregation_rule"] = serde_json::json!({ "rule": "bulyan" });
    assert!(matches!(
        Config::from_json(&unknown_rule.to_string()),
        Err(OrchestratorError::InvalidConfig(_))
    ));

    assert!(matches!(
        Config::from_json("{ \"num_epochs\": "),
        Err(OrchestratorError::Json(_))
    ));
}

#[test]
fn krum_needs_a_large_enough_window() {
    let mut config = regression_config();
    config.aggregation_rule =
        serde_json::from_str(r#"{ "rule": "krum", "byzantine": 1 }"#).unwrap();

    assert!(matches!(
        Session::new(config.clone()),
        Err(OrchestratorError::InvalidConfig(_))
    ));

    config.num_batches = 5.try_into().unwrap();
    assert!(Session::new(config).is_ok());
}

#[test]
fn window_longer_than_an_epoch_is_rejected() {
    // 64 training samples in batches of 8 make 8 batches per epoch.
    let mut config = regression_config();
    config.num_batches = 16.try_into().unwrap();

    assert!(matches!(
        Session::new(config),
        Err(OrchestratorError::InvalidConfig(_))
    ));
}
