//! Per-window normalization around the model call.
//!
//! One window of filtered samples is mean-centred and scaled by the model's
//! `v10_sig`, passed through the inference engine, and the model output is
//! mapped from `[-1, 1]` back into physical units.

use crate::core::model::ModelConfig;
use crate::diagnostics::Summary;
use crate::engine::{self, InferenceEngine};
use crate::error::{InferenceError, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Level;

/// Number of samples per inference window.
pub const WINDOW_SIZE: usize = 2000;

/// A mean-centred, scaled window ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedWindow {
    /// Arithmetic mean of the raw window
    pub mean: f32,
    /// `(raw - mean) / v10_sig`
    pub values: Vec<f32>,
}

/// Value summaries of one processed window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDiagnostics {
    pub raw: Summary,
    pub normalized: Summary,
    pub model_output: Summary,
    pub physical: Summary,
}

impl WindowDiagnostics {
    pub fn compute(raw: &[f32], normalized: &[f32], model_output: &[f32], physical: &[f32]) -> Self {
        Self {
            raw: Summary::of(raw),
            normalized: Summary::of(normalized),
            model_output: Summary::of(model_output),
            physical: Summary::of(physical),
        }
    }
}

/// Normalizes, infers and denormalizes windows for one model.
#[derive(Debug, Clone)]
pub struct WindowScaler {
    model_id: String,
    model: Arc<ModelConfig>,
    window_size: usize,
}

impl WindowScaler {
    pub fn new(model_id: impl Into<String>, model: Arc<ModelConfig>, window_size: usize) -> Self {
        Self {
            model_id: model_id.into(),
            model,
            window_size,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Remove the window mean and divide by `v10_sig`.
    pub fn normalize(&self, raw: &[f32]) -> Result<NormalizedWindow> {
        self.check_window(raw)?;

        let mean = raw.iter().sum::<f32>() / self.window_size as f32;
        let sig = self.model.v10_sig;
        let values = raw.iter().map(|&r| (r - mean) / sig).collect();

        Ok(NormalizedWindow { mean, values })
    }

    /// Map model output into physical units: `(y + 1) / 2 * span + gf_min`.
    ///
    /// Output longer than one window is tail-aligned (the leading values are
    /// treated as warm-up and dropped). Values outside `[-1, 1]` are not
    /// clamped.
    pub fn denormalize(&self, model_output: &[f32]) -> Result<Vec<f32>> {
        let tail = self.tail(model_output)?;

        let gf_min = self.model.gf_min;
        let span = self.model.span();
        Ok(tail
            .iter()
            .map(|&y| (y + 1.0) * 0.5 * span + gf_min)
            .collect())
    }

    /// Run one raw window through normalize, the engine and denormalize.
    pub fn process<E>(&self, raw: &[f32], engine: &E) -> Result<Vec<f32>>
    where
        E: InferenceEngine + ?Sized,
    {
        let normalized = self.normalize(raw)?;
        let model_output = engine::invoke(engine, &self.model_id, &normalized.values, self.window_size)?;
        let physical = self.denormalize(&model_output)?;

        if tracing::enabled!(Level::DEBUG) {
            // Diagnostics cover the values actually used, after tail alignment.
            let used = &model_output[model_output.len() - self.window_size..];
            let diag = WindowDiagnostics::compute(raw, &normalized.values, used, &physical);
            tracing::debug!(
                model = %self.model_id,
                raw_mean = normalized.mean,
                v10_sig = self.model.v10_sig,
                output_len = model_output.len(),
                "window raw {} | norm {} | model {} | physical {}",
                diag.raw,
                diag.normalized,
                diag.model_output,
                diag.physical
            );
        }

        Ok(physical)
    }

    fn check_window(&self, raw: &[f32]) -> Result<()> {
        if raw.len() != self.window_size {
            return Err(PipelineError::InvalidInput {
                context: "window length",
                expected: self.window_size,
                actual: raw.len(),
                offset: None,
            });
        }
        Ok(())
    }

    fn tail<'a>(&self, model_output: &'a [f32]) -> Result<&'a [f32]> {
        let n = model_output.len();
        if n < self.window_size {
            return Err(PipelineError::InferenceFailed {
                model: self.model_id.clone(),
                offset: None,
                source: InferenceError::ShortOutput {
                    expected: self.window_size,
                    actual: n,
                },
            });
        }
        Ok(&model_output[n - self.window_size..])
    }
}
