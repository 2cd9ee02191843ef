//! Pass-through engine.

use super::InferenceEngine;
use crate::error::InferenceError;

/// Returns its input unchanged.
///
/// Useful for dry runs of the pipeline and as a test stub: with this engine
/// the physical output of a window is `(x + 1) / 2 * span + gf_min` applied
/// to the normalized input.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEngine;

impl InferenceEngine for IdentityEngine {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Ok(window.to_vec())
    }
}
