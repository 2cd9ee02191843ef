//! Error taxonomy for the inference pipeline.

use thiserror::Error;

/// Boxed error produced by an external inference engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while driving the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested model identifier is not in the registry.
    #[error("unknown model '{model}'")]
    UnknownModel { model: String },

    /// A length or parameter did not match what the pipeline requires.
    #[error("invalid input ({context}): expected {expected}, got {actual}{}", fmt_offset(.offset))]
    InvalidInput {
        context: &'static str,
        expected: usize,
        actual: usize,
        offset: Option<usize>,
    },

    /// The external model call failed or returned an unusable result.
    #[error("inference failed for model {model}{}: {source}", fmt_offset(.offset))]
    InferenceFailed {
        model: String,
        offset: Option<usize>,
        #[source]
        source: InferenceError,
    },

    /// A pipeline parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl PipelineError {
    /// Attach the start offset of the window that produced this error.
    ///
    /// Errors without a window context are returned unchanged.
    pub fn at_offset(self, start: usize) -> Self {
        match self {
            PipelineError::InvalidInput {
                context,
                expected,
                actual,
                ..
            } => PipelineError::InvalidInput {
                context,
                expected,
                actual,
                offset: Some(start),
            },
            PipelineError::InferenceFailed { model, source, .. } => {
                PipelineError::InferenceFailed {
                    model,
                    offset: Some(start),
                    source,
                }
            }
            other => other,
        }
    }

    /// Window start offset, when the error came from a specific window.
    pub fn offset(&self) -> Option<usize> {
        match self {
            PipelineError::InvalidInput { offset, .. }
            | PipelineError::InferenceFailed { offset, .. } => *offset,
            _ => None,
        }
    }
}

fn fmt_offset(offset: &Option<usize>) -> String {
    offset
        .map(|o| format!(" at window offset {o}"))
        .unwrap_or_default()
}

/// Failures of the inference boundary.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The engine returned fewer values than one window.
    #[error("model returned {actual} values, expected at least {expected}")]
    ShortOutput { expected: usize, actual: usize },

    /// The engine itself reported an error.
    #[error("engine error: {0}")]
    Engine(#[source] BoxError),

    /// The call was refused because the run was cancelled.
    #[error("inference cancelled")]
    Cancelled,
}

impl InferenceError {
    /// Wrap any engine-side error.
    pub fn engine<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        InferenceError::Engine(err.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_offset_tags_window_errors() {
        let err = PipelineError::InvalidInput {
            context: "window length",
            expected: 2000,
            actual: 1999,
            offset: None,
        }
        .at_offset(400);

        assert_eq!(err.offset(), Some(400));
        let msg = err.to_string();
        assert!(msg.contains("expected 2000"));
        assert!(msg.contains("offset 400"));
    }

    #[test]
    fn test_at_offset_leaves_unknown_model_alone() {
        let err = PipelineError::UnknownModel {
            model: "WALK".to_string(),
        }
        .at_offset(10);
        assert_eq!(err.offset(), None);
        assert_eq!(err.to_string(), "unknown model 'WALK'");
    }

    #[test]
    fn test_inference_failed_keeps_source() {
        let err = PipelineError::InferenceFailed {
            model: "DB".to_string(),
            offset: Some(200),
            source: InferenceError::ShortOutput {
                expected: 2000,
                actual: 10,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("DB"));
        assert!(msg.contains("offset 200"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
