//! Piezo Infer - windowed model inference over filtered piezo signals.
//!
//! A long piezo recording is low-pass filtered with a zero-phase
//! Butterworth filter, cut into overlapping windows, normalized per window,
//! passed through an external predictive model, mapped back into physical
//! units and stitched into one continuous sequence by tapered overlap-add.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          Piezo Infer                           │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌─────────────┐               │
//! │  │  Ingest  │──▶│ Zero-phase │──▶│  Windowing  │               │
//! │  │ csv/tcp  │   │   filter   │   │ 2000 / 200  │               │
//! │  └──────────┘   └────────────┘   └─────────────┘               │
//! │                                        │                       │
//! │                                        ▼                       │
//! │  ┌──────────┐   ┌────────────┐   ┌─────────────┐               │
//! │  │  Output  │◀──│ Overlap-add│◀──│ Normalize → │               │
//! │  │ sequence │   │  (taper)   │   │ engine → de │               │
//! │  └──────────┘   └────────────┘   └─────────────┘               │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use piezo_infer::{engine::IdentityEngine, ingest::ColumnReader, ModelRegistry, OfflinePipeline, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let registry = ModelRegistry::builtin();
//! let pipeline = OfflinePipeline::from_config(&config, &registry)?;
//!
//! let ingest = ColumnReader::new(config.piezo_column).read_path("recording.csv")?;
//! let report = pipeline.run_ingest(&ingest, &IdentityEngine)?;
//! println!("{} samples, {} windows", report.samples, report.windows);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod ingest;

// Re-export key types at crate root for convenience
pub use config::{ConfigError, EngineConfig, PipelineConfig, SAMPLE_RATE_HZ};
pub use core::{
    BoundaryMode, ModelConfig, ModelRegistry, ModelSelector, OfflinePipeline, Reconstructor,
    RunReport, WindowScaler, ZeroPhaseFilter, DROP_RATIO, STRIDE, WINDOW_SIZE,
};
pub use diagnostics::{RunLog, SharedRunLog, Summary};
pub use engine::{CancelFlag, CancellableEngine, IdentityEngine, InferenceEngine};
pub use error::{InferenceError, PipelineError};
pub use ingest::{ColumnReader, CsvIngest, IngestError, PIEZO_COLUMN};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
