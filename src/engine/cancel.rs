//! Cancellation wrapper around an engine.
//!
//! The pipeline has no cancellation of its own; a long model call blocks the
//! whole run. Wrapping the engine lets a caller stop the run between windows.

use super::InferenceEngine;
use crate::error::InferenceError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag set when the run should stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set this flag on Ctrl+C.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            flag.cancel();
        })
    }
}

/// Refuses further calls once its flag is set.
pub struct CancellableEngine<E> {
    inner: E,
    flag: CancelFlag,
}

impl<E> CancellableEngine<E> {
    pub fn new(inner: E, flag: CancelFlag) -> Self {
        Self { inner, flag }
    }

    pub fn flag(&self) -> &CancelFlag {
        &self.flag
    }
}

impl<E: InferenceEngine> InferenceEngine for CancellableEngine<E> {
    fn infer(&self, window: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if self.flag.is_cancelled() {
            return Err(InferenceError::Cancelled);
        }
        self.inner.infer(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::IdentityEngine;

    #[test]
    fn test_passes_through_until_cancelled() {
        let flag = CancelFlag::new();
        let engine = CancellableEngine::new(IdentityEngine, flag.clone());

        assert_eq!(engine.infer(&[1.0]).unwrap(), vec![1.0]);

        flag.cancel();
        assert!(engine.flag().is_cancelled());
        assert!(matches!(engine.infer(&[1.0]), Err(InferenceError::Cancelled)));
    }
}
