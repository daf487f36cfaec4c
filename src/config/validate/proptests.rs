//! Property-based tests for configuration validation

use super::validator::validate_config;
use crate::config::loader::RunConfig;
use crate::config::schema::*;
use crate::data::{DatasetSource, FolderSource};
use proptest::prelude::*;
use std::path::PathBuf;

fn arb_optimizer() -> impl Strategy<Value = String> {
    prop_oneof![Just("sgd"), Just("adam"), Just("adamw")].prop_map(String::from)
}

fn arb_valid_config() -> impl Strategy<Value = RunConfig> {
    (
        1usize..256,                        // batch_size
        1e-6f32..1.0,                       // lr
        1usize..100,                        // num_epochs
        0.01f32..=1.0,                      // train_ratio
        proptest::option::of(0.1f32..10.0), // clip_grad_norm
        arb_optimizer(),
    )
        .prop_map(|(batch_size, lr, num_epochs, train_ratio, clip_grad_norm, kind)| {
            let source = DatasetSource::Folder(FolderSource {
                root: PathBuf::from("data"),
                train: Some(PathBuf::from("train")),
                val: Some(PathBuf::from("val")),
                test: None,
            });
            RunConfig {
                run: RunSpec { batch_size, dataset: DatasetSpec { sources: vec![source] }, ..Default::default() },
                phases: vec![PhaseConfig {
                    training: TrainingParams { num_epochs, train_ratio, clip_grad_norm, ..Default::default() },
                    optimizer: OptimizerSpec { kind, lr, ..Default::default() },
                    ..Default::default()
                }],
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_config_passes(config in arb_valid_config()) {
        prop_assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn prop_zero_epochs_fails(config in arb_valid_config()) {
        let mut config = config;
        config.phases[0].training.num_epochs = 0;
        prop_assert!(validate_config(&config).is_err());
    }

    #[test]
    fn prop_non_positive_lr_fails(config in arb_valid_config(), lr in -1.0f32..=0.0) {
        let mut config = config;
        config.phases[0].optimizer.lr = lr;
        prop_assert!(validate_config(&config).is_err());
    }

    #[test]
    fn prop_inverted_weight_bounds_fail(config in arb_valid_config(), min in 1.0f64..10.0, gap in 0.01f64..1.0) {
        let mut config = config;
        config.phases[0].weighted_random_sampler.min_weight = min;
        config.phases[0].weighted_random_sampler.max_weight = min - gap;
        prop_assert!(validate_config(&config).is_err());
    }
}
