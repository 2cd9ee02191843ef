//! Offline batch pipeline.
//!
//! Raw samples are filtered once over the whole sequence, then windowed,
//! inferred and blended back into one output sequence of the same length.

use crate::config::PipelineConfig;
use crate::core::filter::{FilterCoefficients, ZeroPhaseFilter};
use crate::core::model::{ModelRegistry, ModelSelector};
use crate::core::reconstruct::Reconstructor;
use crate::core::window::WindowScaler;
use crate::core::windowing::WindowPlan;
use crate::diagnostics::{SharedRunLog, Summary};
use crate::engine::InferenceEngine;
use crate::error::{PipelineError, Result};
use crate::ingest::CsvIngest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one offline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Input samples
    pub samples: usize,
    /// Windows blended into the output
    pub windows: usize,
    /// Source rows skipped as malformed
    pub skipped_rows: usize,
    /// Trailing samples no window reached (output is 0 there)
    pub uncovered_tail: usize,
    /// `None` for an empty output
    pub output_summary: Option<Summary>,
    pub output: Vec<f32>,
}

/// Filter + reconstruct for one model.
#[derive(Debug, Clone)]
pub struct OfflinePipeline {
    filter: ZeroPhaseFilter,
    reconstructor: Reconstructor,
    workers: usize,
    strict: bool,
    log: Option<SharedRunLog>,
}

impl OfflinePipeline {
    /// Build a pipeline from configuration, resolving the model in `registry`.
    pub fn from_config(config: &PipelineConfig, registry: &ModelRegistry) -> Result<Self> {
        let mut selector = ModelSelector::new(Arc::new(registry.clone()));
        selector.select(&config.model)?;
        Self::with_selector(config, &selector)
    }

    /// Build a pipeline for the model currently active in `selector`.
    ///
    /// `config.model` is ignored; the selector decides.
    pub fn with_selector(config: &PipelineConfig, selector: &ModelSelector) -> Result<Self> {
        let (model_id, model) = selector
            .active_id()
            .zip(selector.active())
            .ok_or_else(|| PipelineError::InvalidParameter("no model selected".to_string()))?;
        let plan = WindowPlan::new(config.window_size, config.stride)?;
        let scaler = WindowScaler::new(model_id, model, config.window_size);

        Ok(Self {
            filter: ZeroPhaseFilter::new(FilterCoefficients::butterworth_10hz(), config.boundary),
            reconstructor: Reconstructor::new(scaler, plan, config.drop_ratio)?,
            workers: config.workers.max(1),
            strict: false,
            log: None,
        })
    }

    /// Reject input shorter than one window instead of returning zeros.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_log(mut self, log: SharedRunLog) -> Self {
        self.reconstructor = self.reconstructor.with_log(log.clone());
        self.log = Some(log);
        self
    }

    pub fn filter(&self) -> &ZeroPhaseFilter {
        &self.filter
    }

    pub fn reconstructor(&self) -> &Reconstructor {
        &self.reconstructor
    }

    pub fn model_id(&self) -> &str {
        self.reconstructor.scaler().model_id()
    }

    /// Run on raw samples.
    pub fn run<E>(&self, raw: &[f32], engine: &E) -> Result<RunReport>
    where
        E: InferenceEngine + Sync + ?Sized,
    {
        self.run_counted(raw, 0, engine)
    }

    /// Run on samples read from a CSV source.
    pub fn run_ingest<E>(&self, ingest: &CsvIngest, engine: &E) -> Result<RunReport>
    where
        E: InferenceEngine + Sync + ?Sized,
    {
        if let Some(ref log) = self.log {
            log.record_skipped_rows(ingest.skipped.len() as u64);
        }
        self.run_counted(&ingest.samples, ingest.skipped.len(), engine)
    }

    fn run_counted<E>(&self, raw: &[f32], skipped_rows: usize, engine: &E) -> Result<RunReport>
    where
        E: InferenceEngine + Sync + ?Sized,
    {
        let started_at = Utc::now();
        let plan = self.reconstructor.plan();

        if self.strict && raw.len() < plan.window_size {
            return Err(PipelineError::InvalidInput {
                context: "signal length",
                expected: plan.window_size,
                actual: raw.len(),
                offset: None,
            });
        }
        if let Some(ref log) = self.log {
            log.record_samples(raw.len() as u64);
        }

        let filtered = self.filter.apply(raw);
        let reconstruction = if self.workers > 1 {
            self.reconstructor.run_parallel(&filtered, engine, self.workers)?
        } else {
            self.reconstructor.run(&filtered, engine)?
        };

        let output = reconstruction.into_values();
        let windows = plan.window_count(raw.len());
        let report = RunReport {
            run_id: Uuid::new_v4(),
            model: self.model_id().to_string(),
            started_at,
            finished_at: Utc::now(),
            samples: raw.len(),
            windows,
            skipped_rows,
            uncovered_tail: raw.len() - plan.covered_len(raw.len()),
            output_summary: (!output.is_empty()).then(|| Summary::of(&output)),
            output,
        };

        tracing::info!(
            run_id = %report.run_id,
            model = %report.model,
            samples = report.samples,
            windows = report.windows,
            skipped_rows,
            "run finished"
        );
        Ok(report)
    }
}
