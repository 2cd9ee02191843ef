//! Window-start bookkeeping and edge taper weights.
//!
//! Windows of a fixed length are laid over the filtered signal every
//! `stride` samples. Only full windows are used, so the tail beyond the last
//! full window may be left uncovered.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Advance between consecutive window starts.
pub const STRIDE: usize = 200;

/// Fraction of each window edge that is tapered.
pub const DROP_RATIO: f64 = 0.05;

/// Window geometry for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    pub window_size: usize,
    pub stride: usize,
}

impl WindowPlan {
    /// Create a plan, requiring `0 < stride < window_size`.
    pub fn new(window_size: usize, stride: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(PipelineError::InvalidParameter(
                "window size must be positive".to_string(),
            ));
        }
        if stride == 0 || stride >= window_size {
            return Err(PipelineError::InvalidParameter(format!(
                "stride must satisfy 0 < stride < window size ({window_size}), got {stride}"
            )));
        }
        Ok(Self {
            window_size,
            stride,
        })
    }

    /// Samples shared by adjacent windows.
    pub fn overlap(&self) -> usize {
        self.window_size - self.stride
    }

    /// Number of full windows that fit in `len` samples.
    pub fn window_count(&self, len: usize) -> usize {
        if len < self.window_size {
            0
        } else {
            (len - self.window_size) / self.stride + 1
        }
    }

    /// Window start offsets, in increasing order.
    pub fn starts(&self, len: usize) -> impl Iterator<Item = usize> {
        let stride = self.stride;
        (0..self.window_count(len)).map(move |k| k * stride)
    }

    /// One past the last sample covered by any window.
    pub fn covered_len(&self, len: usize) -> usize {
        match self.window_count(len) {
            0 => 0,
            n => (n - 1) * self.stride + self.window_size,
        }
    }
}

impl Default for WindowPlan {
    fn default() -> Self {
        Self {
            window_size: crate::core::window::WINDOW_SIZE,
            stride: STRIDE,
        }
    }
}

/// Linear edge weights for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Taper {
    window_size: usize,
    forward: Vec<f32>,
    backward: Vec<f32>,
}

impl Taper {
    /// Build the ramp for `drop_ratio` of `window_size`.
    ///
    /// `drop_edge = floor(drop_ratio * window_size)`; the forward ramp is
    /// `i / drop_edge` and the backward ramp its mirror.
    pub fn new(window_size: usize, drop_ratio: f64) -> Result<Self> {
        if !(0.0..0.5).contains(&drop_ratio) {
            return Err(PipelineError::InvalidParameter(format!(
                "drop ratio must be in [0, 0.5), got {drop_ratio}"
            )));
        }

        let drop_edge = drop_edge(window_size, drop_ratio);
        let forward: Vec<f32> = (0..drop_edge)
            .map(|i| i as f32 / drop_edge as f32)
            .collect();
        let backward = forward.iter().rev().copied().collect();

        Ok(Self {
            window_size,
            forward,
            backward,
        })
    }

    /// Uniform weight of 1 everywhere.
    pub fn flat(window_size: usize) -> Self {
        Self {
            window_size,
            forward: Vec::new(),
            backward: Vec::new(),
        }
    }

    pub fn drop_edge(&self) -> usize {
        self.forward.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Weight of sample `i` within a window.
    pub fn weight(&self, i: usize) -> f32 {
        let edge = self.drop_edge();
        if edge == 0 {
            return 1.0;
        }
        if i < edge {
            self.forward[i]
        } else if i >= self.window_size - edge {
            self.backward[i - (self.window_size - edge)]
        } else {
            1.0
        }
    }

    /// All weights of one window.
    pub fn weights(&self) -> Vec<f32> {
        (0..self.window_size).map(|i| self.weight(i)).collect()
    }
}

/// `floor(drop_ratio * window_size)`, tolerant of representation error in
/// `drop_ratio` (e.g. `0.29 * 100` must give 29).
pub fn drop_edge(window_size: usize, drop_ratio: f64) -> usize {
    (drop_ratio * window_size as f64 + 1e-9).floor() as usize
}
