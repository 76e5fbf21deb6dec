//! Load-trace tests for the adaptive controller.

use lumen64_core::{LoadSample, QualityAxis, QualityConfig, QualityLevels, ShadowQuality};
use lumen64_quality::AdaptiveController;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[test]
fn test_overload_then_recovery_trace() {
    let mut controller = AdaptiveController::new(QualityConfig::default(), &[]);

    // 35 entities, 150 particles, 30ms against a 16.7ms target.
    for frame in 0..10 {
        let profile = controller.observe(LoadSample::new(35, 150, 30.0, 1.0), None);
        if frame == 0 {
            assert_eq!(profile.shadows, ShadowQuality::Baked);
        }
    }
    let profile = controller.profile();
    assert_eq!(profile.particle_keep_ratio, 0.25);
    assert_eq!(profile.shadows, ShadowQuality::Baked);

    // 10 entities, 20 particles, comfortably inside budget.
    for frame in 1..=60 {
        let profile = controller.observe(LoadSample::new(10, 20, 10.0, 1.0), None);
        if frame < 60 {
            assert_ne!(profile.levels, QualityLevels::BEST, "best restored early at frame {frame}");
        }
        if frame == 20 {
            assert_eq!(profile.shadows, ShadowQuality::Dynamic);
            assert_eq!(profile.particle_keep_ratio, 0.5);
        }
        if frame == 40 {
            assert_eq!(profile.particle_keep_ratio, 0.75);
        }
    }
    let profile = controller.profile();
    assert_eq!(profile.levels, QualityLevels::BEST);
    assert!(profile.is_lossless());
}

#[test]
fn test_random_trace_moves_at_most_one_level() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x4C55_4D45);
    let config = QualityConfig::default();
    let mut controller = AdaptiveController::new(config.clone(), &[]);
    let mut previous = controller.levels();

    for _ in 0..5_000 {
        let sample = LoadSample::new(
            rng.gen_range(0..60),
            rng.gen_range(0..250),
            rng.gen_range(4.0..40.0),
            rng.gen_range(0.0..8.0),
        );
        let profile = controller.observe(sample, None);
        let current = profile.levels;

        for axis in QualityAxis::ALL {
            let before = i16::from(previous.level(axis));
            let after = i16::from(current.level(axis));
            assert!((after - before).abs() <= 1, "{axis:?} jumped from {before} to {after}");

            let pressure = controller.pressure(axis, &sample);
            if after < before {
                assert!(pressure > config.drop_pressure);
            }
            if after > before {
                assert!(pressure < config.raise_pressure);
            }
        }

        assert!((0.0..=1.0).contains(&profile.particle_keep_ratio));
        assert!(profile.lod_bias >= 0.0);
        assert!(profile.cull_distance > 0.0);
        previous = current;
    }
}

#[test]
fn test_sustained_calm_never_raises_before_window() {
    let mut config = QualityConfig::default();
    config.raise_window = 7;
    let mut controller = AdaptiveController::new(config, &[]);
    controller.observe(LoadSample::new(0, 0, 100.0, 0.0), None);
    let dropped = controller.levels();

    for _ in 0..6 {
        controller.observe(LoadSample::new(0, 0, 1.0, 0.0), None);
        assert_eq!(controller.levels(), dropped);
    }
    controller.observe(LoadSample::new(0, 0, 1.0, 0.0), None);
    assert_eq!(controller.levels(), QualityLevels::BEST);
}
