//! Inference engine boundary.
//!
//! The predictive model is an external collaborator. The pipeline only
//! relies on this shape contract:
//!
//! - input is exactly one window of normalized `f32` samples
//! - output has at least as many values as the input
//! - the same input always yields the same output (no state across calls)
//!
//! Engines are injected into the reconstructor, so tests can substitute a
//! deterministic stub for a real model.

pub mod cancel;
pub mod identity;

#[cfg(feature = "remote")]
pub mod remote;

pub use cancel::{CancelFlag, CancellableEngine};
pub use identity::IdentityEngine;

#[cfg(feature = "remote")]
pub use remote::{BlockingRemoteEngine, RemoteEngineClient, RemoteEngineConfig};

use crate::error::{InferenceError, PipelineError};
use std::sync::Arc;

/// Capability to run the predictive model on one window.
pub trait InferenceEngine {
    /// Run the model on `window`. Must not retain state between calls.
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Adapts a closure into an engine.
pub struct FnEngine<F>(F);

/// Wrap `f` as an [`InferenceEngine`].
pub fn from_fn<F>(f: F) -> FnEngine<F>
where
    F: Fn(&[f32]) -> Result<Vec<f32>, InferenceError>,
{
    FnEngine(f)
}

impl<F> InferenceEngine for FnEngine<F>
where
    F: Fn(&[f32]) -> Result<Vec<f32>, InferenceError>,
{
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        (self.0)(window)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        (**self).infer(window)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Arc<E> {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        (**self).infer(window)
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for &E {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        (**self).infer(window)
    }
}

/// Engine that can be shared across reconstruction workers.
pub type SharedEngine = Arc<dyn InferenceEngine + Send + Sync>;

/// Invoke `engine` on one normalized window.
///
/// The window length is checked before the call; engine failures are passed
/// through unchanged inside `InferenceFailed`.
pub fn invoke<E>(
    engine: &E,
    model: &str,
    window: &[f32],
    window_size: usize,
) -> Result<Vec<f32>, PipelineError>
where
    E: InferenceEngine + ?Sized,
{
    if window.len() != window_size {
        return Err(PipelineError::InvalidInput {
            context: "normalized window length",
            expected: window_size,
            actual: window.len(),
            offset: None,
        });
    }

    engine
        .infer(window)
        .map_err(|source| PipelineError::InferenceFailed {
            model: model.to_string(),
            offset: None,
            source,
        })
}
