//! Core signal path.
//!
//! - [`filter`]: zero-phase low-pass filter
//! - [`model`]: model configuration registry
//! - [`window`]: per-window normalize / infer / denormalize
//! - [`windowing`]: window starts and taper weights
//! - [`reconstruct`]: overlap-add blending
//! - [`pipeline`]: offline batch run

pub mod filter;
pub mod model;
pub mod pipeline;
pub mod reconstruct;
pub mod window;
pub mod windowing;

pub use filter::{butterworth_zero_phase, BoundaryMode, FilterCoefficients, ZeroPhaseFilter, BUTTER_A, BUTTER_B};
pub use model::{ModelConfig, ModelRegistry, ModelSelector, DEFAULT_MODEL};
pub use pipeline::{OfflinePipeline, RunReport};
pub use reconstruct::{Reconstruction, Reconstructor};
pub use window::{NormalizedWindow, WindowDiagnostics, WindowScaler, WINDOW_SIZE};
pub use windowing::{drop_edge, Taper, WindowPlan, DROP_RATIO, STRIDE};
