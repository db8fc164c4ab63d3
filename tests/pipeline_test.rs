//! Integration tests for the batch estimation pipeline
//!
//! These validate the signal path end to end without a session:
//! conditioning, peak detection, interval statistics, stabilization, and
//! confidence grading over synthetic traces with known pulse rates.

use pulse_meter::analysis::{BatchEstimator, BpmStabilizer, Confidence, QualityGrader, SignalConditioner};
use pulse_meter::config::PulseConfig;
use pulse_meter::testing::{finger_trace, TraceSpec};

fn batch_estimator() -> BatchEstimator {
    let config = PulseConfig::default();
    BatchEstimator::new(config.conditioning, config.peaks)
}

/// Intensity values of a synthetic trace.
fn trace_values(spec: &TraceSpec) -> Vec<f32> {
    finger_trace(spec).iter().map(|s| s.value).collect()
}

#[test]
fn test_converges_on_sine_with_linear_drift() {
    // A 1.2 Hz sine with drift must converge to 72 BPM within +/- 2 after
    // stabilization.
    let config = PulseConfig::default();
    let spec = TraceSpec {
        bpm: 72.0,
        duration_s: 10.0,
        drift_per_s: 3.0,
        noise: 0.0,
        ..TraceSpec::default()
    };
    let values = trace_values(&spec);

    let estimator = batch_estimator();
    let mut stabilizer = BpmStabilizer::new(config.stabilizer);

    // Re-estimate on a growing buffer every second, as the session does.
    let mut stable = None;
    for chunk_end in (90..=values.len()).step_by(30) {
        let raw = estimator.estimate(&values[..chunk_end], spec.sample_rate);
        if let Some(bpm) = raw.bpm {
            let now_ms = (chunk_end as f32 / spec.sample_rate * 1000.0) as i64;
            if let Some(estimate) = stabilizer.update(bpm, now_ms) {
                stable = Some(estimate);
            }
        }
    }

    let estimate = stable.expect("stabilizer must converge on a clean signal");
    assert!(
        (estimate.value - 72).abs() <= 2,
        "converged to {} BPM, expected 72 +/- 2",
        estimate.value
    );
    assert!(estimate.reliable);
}

#[test]
fn test_end_to_end_72_bpm_scenario() {
    // 300 samples at 30 Hz of a clean 72 BPM waveform (period ~25 samples).
    let config = PulseConfig::default();
    let spec = TraceSpec {
        bpm: 72.0,
        duration_s: 10.0,
        noise: 0.2,
        ..TraceSpec::default()
    };
    let values = trace_values(&spec);
    assert_eq!(values.len(), 300);

    let estimate = batch_estimator().estimate(&values, spec.sample_rate);

    assert!(
        estimate.peak_count >= 10,
        "expected >= 10 peaks, found {}",
        estimate.peak_count
    );

    let mut intervals = estimate.intervals.clone();
    intervals.sort_unstable();
    let median = intervals[intervals.len() / 2];
    assert!(
        (23..=27).contains(&median),
        "median interval {} not near 25",
        median
    );

    let bpm = estimate.bpm.expect("clean scenario must produce a BPM");
    assert!((70..=74).contains(&bpm), "bpm {} outside [70, 74]", bpm);

    // Confidence over the conditioned tail and filtered intervals.
    let grader = QualityGrader::new(config.quality);
    let tail = &estimate.conditioned[estimate.conditioned.len() - 60..];
    let raw_mean = values[240..].iter().sum::<f32>() / 60.0;
    let confidence = grader.grade(tail, raw_mean, &estimate.intervals);
    assert!(
        matches!(confidence, Confidence::Good | Confidence::High),
        "clean scenario graded {:?}",
        confidence
    );
}

#[test]
fn test_conditioner_idempotent_on_flat_input() {
    let config = PulseConfig::default();
    let conditioner = SignalConditioner::new(config.conditioning);

    let flat = vec![142.0f32; 150];
    let once = conditioner.condition(&flat, 30.0);
    let twice = conditioner.condition(&once, 30.0);

    assert_eq!(once.len(), flat.len());
    for (a, b) in once.iter().zip(twice.iter()) {
        assert!(
            (a - b).abs() < 1e-3,
            "second pass diverged: {} vs {}",
            a,
            b
        );
    }
}

#[test]
fn test_outlier_reading_does_not_move_stable_value() {
    let config = PulseConfig::default();
    let mut stabilizer = BpmStabilizer::new(config.stabilizer);

    for (i, bpm) in [70, 71, 69, 70].iter().enumerate() {
        stabilizer.update(*bpm, i as i64 * 1000);
    }
    let settled = stabilizer.stable_bpm().expect("settled on 70");
    assert!((settled - 70).abs() <= 1);

    // A wild 130 one second later must change the value by no more than
    // the allowed-per-second cap (here: rejected entirely).
    stabilizer.update(130, 4000);
    let after = stabilizer.stable_bpm().unwrap();
    assert!(
        (after - settled).abs() <= 15,
        "outlier moved value from {} to {}",
        settled,
        after
    );
}

#[test]
fn test_slow_heart_rate_trace() {
    let spec = TraceSpec {
        bpm: 50.0,
        duration_s: 12.0,
        noise: 0.2,
        ..TraceSpec::default()
    };
    let values = trace_values(&spec);
    let estimate = batch_estimator().estimate(&values, spec.sample_rate);
    let bpm = estimate.bpm.expect("slow trace must still estimate");
    assert!((48..=52).contains(&bpm), "bpm {} outside [48, 52]", bpm);
}

#[test]
fn test_fast_heart_rate_trace() {
    let spec = TraceSpec {
        bpm: 150.0,
        duration_s: 10.0,
        noise: 0.2,
        ..TraceSpec::default()
    };
    let values = trace_values(&spec);
    let estimate = batch_estimator().estimate(&values, spec.sample_rate);
    let bpm = estimate.bpm.expect("fast trace must still estimate");
    assert!((146..=154).contains(&bpm), "bpm {} outside [146, 154]", bpm);
}
