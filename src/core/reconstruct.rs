//! Overlap-add reconstruction of windowed model predictions.
//!
//! Every full window of the filtered signal is processed independently and
//! its physical prediction is blended into two accumulators (weighted sum and
//! weight sum) using the edge taper. The final sample is the weighted mean of
//! all windows covering it, or 0 where no window reaches.

use crate::core::window::WindowScaler;
use crate::core::windowing::{Taper, WindowPlan};
use crate::diagnostics::SharedRunLog;
use crate::engine::InferenceEngine;
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of one reconstruction run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Blended output, same length as the input signal
    pub values: Vec<f32>,
    /// Sum of taper weights applied at each index
    pub weight_sums: Vec<f32>,
    /// Number of windows processed
    pub windows: usize,
}

impl Reconstruction {
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Indices reached by at least one window with non-zero weight.
    pub fn covered(&self) -> impl Iterator<Item = usize> + '_ {
        self.weight_sums
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > 0.0)
            .map(|(i, _)| i)
    }
}

/// Weighted-sum and weight-sum buffers owned by one run.
struct Accumulator {
    weighted: Vec<f32>,
    weights: Vec<f32>,
    windows: usize,
}

impl Accumulator {
    fn new(len: usize) -> Self {
        Self {
            weighted: vec![0.0; len],
            weights: vec![0.0; len],
            windows: 0,
        }
    }

    fn add(&mut self, start: usize, physical: &[f32], taper: &Taper) {
        let weighted = &mut self.weighted[start..start + physical.len()];
        let weights = &mut self.weights[start..start + physical.len()];

        for (i, &y) in physical.iter().enumerate() {
            let w = taper.weight(i);
            weighted[i] += y * w;
            weights[i] += w;
        }
        self.windows += 1;
    }

    fn finish(self) -> Reconstruction {
        let values = self
            .weighted
            .iter()
            .zip(&self.weights)
            .map(|(&sum, &w)| if w > 0.0 { sum / w } else { 0.0 })
            .collect();

        Reconstruction {
            values,
            weight_sums: self.weights,
            windows: self.windows,
        }
    }
}

/// Drives the sliding window over a filtered signal.
#[derive(Debug, Clone)]
pub struct Reconstructor {
    plan: WindowPlan,
    taper: Taper,
    scaler: WindowScaler,
    log: Option<SharedRunLog>,
}

impl Reconstructor {
    /// Create a reconstructor. The scaler and plan must agree on window size.
    pub fn new(scaler: WindowScaler, plan: WindowPlan, drop_ratio: f64) -> Result<Self> {
        if scaler.window_size() != plan.window_size {
            return Err(PipelineError::InvalidInput {
                context: "scaler window size",
                expected: plan.window_size,
                actual: scaler.window_size(),
                offset: None,
            });
        }
        let taper = Taper::new(plan.window_size, drop_ratio)?;

        Ok(Self {
            plan,
            taper,
            scaler,
            log: None,
        })
    }

    /// Record counters into `log` during runs.
    pub fn with_log(mut self, log: SharedRunLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn plan(&self) -> &WindowPlan {
        &self.plan
    }

    pub fn taper(&self) -> &Taper {
        &self.taper
    }

    pub fn scaler(&self) -> &WindowScaler {
        &self.scaler
    }

    /// Process every full window in increasing start order.
    ///
    /// A signal shorter than one window yields all zeros and no engine call.
    /// The first failing window aborts the run; its error carries the start
    /// offset.
    pub fn run<E>(&self, signal: &[f32], engine: &E) -> Result<Reconstruction>
    where
        E: InferenceEngine + ?Sized,
    {
        let mut acc = Accumulator::new(signal.len());
        self.log_start(signal.len(), 1);

        for start in self.plan.starts(signal.len()) {
            let physical = self.process_window(signal, start, engine)?;
            acc.add(start, &physical, &self.taper);
            self.record_window();
        }

        Ok(self.log_finish(acc.finish()))
    }

    /// Like [`run`](Self::run), but windows are inferred on `workers` threads.
    ///
    /// Windows are striped across workers and blended on the calling thread
    /// in increasing start order, so the result is identical to `run`. When
    /// several windows fail, the error of the lowest start is returned, as
    /// `run` would.
    pub fn run_parallel<E>(&self, signal: &[f32], engine: &E, workers: usize) -> Result<Reconstruction>
    where
        E: InferenceEngine + Sync + ?Sized,
    {
        let starts: Vec<usize> = self.plan.starts(signal.len()).collect();
        let workers = workers.clamp(1, starts.len().max(1));
        if workers == 1 {
            return self.run(signal, engine);
        }

        let mut acc = Accumulator::new(signal.len());
        self.log_start(signal.len(), workers);

        // Lowest failing start seen so far; windows past it are skipped.
        let first_failure = AtomicUsize::new(usize::MAX);
        let (tx, rx) = crossbeam_channel::bounded::<(usize, Result<Vec<f32>>)>(workers * 2);

        let outcome = std::thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let starts = &starts;
                let first_failure = &first_failure;
                scope.spawn(move || {
                    for &start in starts.iter().skip(worker).step_by(workers) {
                        if start > first_failure.load(Ordering::Relaxed) {
                            break;
                        }
                        let result = self.process_window(signal, start, engine);
                        if result.is_err() {
                            first_failure.fetch_min(start, Ordering::Relaxed);
                        }
                        if tx.send((start, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // Blend in start order; out-of-order arrivals wait here. After a
            // failure the channel is still drained so every window below it
            // gets its turn, which makes the reported offset match `run`.
            let mut pending: BTreeMap<usize, Vec<f32>> = BTreeMap::new();
            let mut next = 0;
            let mut failure: Option<(usize, PipelineError)> = None;
            for (start, result) in rx.iter() {
                match result {
                    Ok(physical) if failure.is_none() => {
                        pending.insert(start, physical);
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        if failure.as_ref().map_or(true, |(s, _)| start < *s) {
                            failure = Some((start, e));
                        }
                        pending.clear();
                        continue;
                    }
                }
                while let Some(physical) = starts.get(next).and_then(|s| pending.remove(s)) {
                    acc.add(starts[next], &physical, &self.taper);
                    self.record_window();
                    next += 1;
                }
            }

            match failure {
                Some((_, e)) => Err(e),
                None => Ok(()),
            }
        });
        outcome?;

        Ok(self.log_finish(acc.finish()))
    }

    fn process_window<E>(&self, signal: &[f32], start: usize, engine: &E) -> Result<Vec<f32>>
    where
        E: InferenceEngine + ?Sized,
    {
        let window = &signal[start..start + self.plan.window_size];
        if let Some(ref log) = self.log {
            log.record_inference_call();
        }
        self.scaler.process(window, engine).map_err(|e| {
            let e = e.at_offset(start);
            tracing::error!(offset = start, "window failed: {e}");
            e
        })
    }

    fn record_window(&self) {
        if let Some(ref log) = self.log {
            log.record_window();
        }
    }

    fn log_start(&self, len: usize, workers: usize) {
        let windows = self.plan.window_count(len);
        if windows == 0 {
            tracing::warn!(
                samples = len,
                window_size = self.plan.window_size,
                "signal shorter than one window; output is all zeros"
            );
            return;
        }
        tracing::info!(
            model = %self.scaler.model_id(),
            samples = len,
            windows,
            stride = self.plan.stride,
            drop_edge = self.taper.drop_edge(),
            workers,
            "reconstruction started"
        );
    }

    fn log_finish(&self, reconstruction: Reconstruction) -> Reconstruction {
        let uncovered = reconstruction.values.len()
            - self.plan.covered_len(reconstruction.values.len());
        tracing::info!(
            windows = reconstruction.windows,
            uncovered_tail = uncovered,
            "reconstruction finished"
        );
        reconstruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ModelConfig, ModelRegistry};
    use crate::diagnostics::create_shared_log;
    use crate::engine::{from_fn, IdentityEngine};
    use crate::error::InferenceError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Model whose identity round trip is exact: `v10_sig = 1`, range `[-1, 1]`.
    fn unit_model() -> Arc<ModelConfig> {
        Arc::new(ModelConfig::new("unit", 1.0, -1.0, 1.0).unwrap())
    }

    fn reconstructor(window: usize, stride: usize, drop_ratio: f64) -> Reconstructor {
        let scaler = WindowScaler::new("UNIT", unit_model(), window);
        Reconstructor::new(scaler, WindowPlan::new(window, stride).unwrap(), drop_ratio).unwrap()
    }

    /// Engine stub that replays the raw windows of `signal` in call order,
    /// so each window's physical output equals its raw input.
    fn replay(
        signal: Vec<f32>,
        window: usize,
        stride: usize,
    ) -> impl Fn(&[f32]) -> std::result::Result<Vec<f32>, InferenceError> {
        let calls = AtomicUsize::new(0);
        move |_: &[f32]| {
            let start = calls.fetch_add(1, Ordering::SeqCst) * stride;
            Ok(signal[start..start + window].to_vec())
        }
    }

    #[test]
    fn test_scenario_identity_no_taper() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let r = reconstructor(4, 2, 0.0);
        let engine = from_fn(replay(signal.clone(), 4, 2));

        let out = r.run(&signal, &engine).unwrap();
        assert_eq!(out.windows, 2);
        assert_eq!(out.weight_sums, vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0]);
        assert_eq!(out.values, signal);
    }

    #[test]
    fn test_short_signal_makes_no_calls() {
        let calls = AtomicUsize::new(0);
        let engine = from_fn(|w: &[f32]| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(w.to_vec())
        });

        let out = reconstructor(4, 2, 0.0).run(&[1.0, 2.0, 3.0], &engine).unwrap();
        assert_eq!(out.values, vec![0.0, 0.0, 0.0]);
        assert_eq!(out.windows, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_signal() {
        let out = reconstructor(4, 2, 0.0).run(&[], &IdentityEngine).unwrap();
        assert!(out.values.is_empty());
    }

    #[test]
    fn test_uncovered_tail_is_zero() {
        let r = reconstructor(4, 2, 0.0);
        let signal = [0.5; 7];
        let out = r.run(&signal, &IdentityEngine).unwrap();
        assert_eq!(out.values.len(), 7);
        assert_eq!(out.weight_sums[6], 0.0);
        assert_eq!(out.values[6], 0.0);
        assert_eq!(out.covered().count(), 6);
    }

    #[test]
    fn test_taper_weights_accumulate() {
        // window 10, drop edge 2: weights [0, .5, 1, 1, 1, 1, 1, 1, .5, 0]
        let r = reconstructor(10, 5, 0.2);
        let out = r.run(&[0.0; 15], &IdentityEngine).unwrap();

        let expected = [
            0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.5, 2.0, 1.5, 1.0, 1.0, 1.0, 1.0, 0.5, 0.0,
        ];
        assert_eq!(out.weight_sums, expected);
        // Index 0 and 14 get zero weight from every window.
        assert_eq!(out.values[0], 0.0);
        assert_eq!(out.values[14], 0.0);
    }

    #[test]
    fn test_constant_prediction_survives_blending() {
        let r = reconstructor(8, 2, 0.25);
        let half = from_fn(|w: &[f32]| Ok(vec![0.5; w.len()]));
        let out = r.run(&[0.0; 20], &half).unwrap();

        for i in out.covered().collect::<Vec<_>>() {
            assert!((out.values[i] - 0.5).abs() < 1e-6, "index {i}: {}", out.values[i]);
        }
    }

    #[test]
    fn test_error_carries_window_offset() {
        let calls = AtomicUsize::new(0);
        let engine = from_fn(|w: &[f32]| {
            if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                Err(InferenceError::engine("device lost"))
            } else {
                Ok(w.to_vec())
            }
        });

        let err = reconstructor(4, 2, 0.0).run(&[0.0; 12], &engine).unwrap_err();
        assert!(matches!(err, PipelineError::InferenceFailed { .. }));
        assert_eq!(err.offset(), Some(4));
    }

    #[test]
    fn test_short_model_output_carries_offset() {
        let engine = from_fn(|_: &[f32]| Ok(vec![0.0; 2]));
        let err = reconstructor(4, 2, 0.0).run(&[0.0; 6], &engine).unwrap_err();
        assert_eq!(err.offset(), Some(0));
        assert!(err.to_string().contains("expected at least 4"));
    }

    #[test]
    fn test_mismatched_window_sizes_rejected() {
        let scaler = WindowScaler::new("UNIT", unit_model(), 8);
        let plan = WindowPlan::new(4, 2).unwrap();
        assert!(Reconstructor::new(scaler, plan, 0.0).is_err());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let registry = ModelRegistry::builtin();
        let scaler = WindowScaler::new("DB", registry.get("DB").unwrap(), 64);
        let r = Reconstructor::new(scaler, WindowPlan::new(64, 8).unwrap(), 0.05).unwrap();

        let signal: Vec<f32> = (0..700).map(|i| ((i as f32) * 0.03).sin()).collect();
        let squash = from_fn(|w: &[f32]| Ok(w.iter().map(|v| v.tanh()).collect()));

        let sequential = r.run(&signal, &squash).unwrap();
        let parallel = r.run_parallel(&signal, &squash, 4).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_parallel_reports_failure() {
        let engine = from_fn(|w: &[f32]| {
            if w.iter().any(|v| v.abs() > 100.0) {
                Err(InferenceError::engine("saturated"))
            } else {
                Ok(w.to_vec())
            }
        });

        let mut signal = vec![0.0f32; 40];
        signal[37] = 1000.0;
        let err = reconstructor(8, 4, 0.0)
            .run_parallel(&signal, &engine, 3)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InferenceFailed { .. }));
        assert_eq!(err.offset(), Some(32));
    }

    #[test]
    fn test_parallel_reports_lowest_failing_offset() {
        // Windows 4 and 8 fail slowly, windows 28 and 32 fail at once, so
        // the later failures usually reach the channel first.
        let engine = from_fn(|w: &[f32]| {
            if w.iter().any(|v| v.abs() > 100.0) {
                std::thread::sleep(std::time::Duration::from_millis(30));
                Err(InferenceError::engine("saturated"))
            } else if w.iter().any(|v| v.abs() > 10.0) {
                Err(InferenceError::engine("clipped"))
            } else {
                Ok(w.to_vec())
            }
        });

        let mut signal = vec![0.0f32; 48];
        signal[11] = 1000.0;
        signal[35] = 50.0;
        let r = reconstructor(8, 4, 0.0);

        let sequential = r.run(&signal, &engine).unwrap_err();
        assert_eq!(sequential.offset(), Some(4));
        for workers in [2, 3, 5] {
            let parallel = r.run_parallel(&signal, &engine, workers).unwrap_err();
            assert_eq!(parallel.offset(), sequential.offset(), "{workers} workers");
            assert!(parallel.to_string().contains("saturated"));
        }
    }

    #[test]
    fn test_run_log_counts() {
        let log = create_shared_log();
        let r = reconstructor(4, 2, 0.0).with_log(Arc::clone(&log));
        r.run(&[0.0; 10], &IdentityEngine).unwrap();

        let stats = log.stats();
        assert_eq!(stats.windows_processed, 4);
        assert_eq!(stats.inference_calls, 4);
    }
}
