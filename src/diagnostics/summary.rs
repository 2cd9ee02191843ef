//! Min/max/mean summaries of sample buffers.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Descriptive statistics of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub count: usize,
}

impl Summary {
    /// Summarize `values`. An empty slice yields NaN statistics and a zero count.
    pub fn of(values: &[f32]) -> Self {
        let data: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();

        Self {
            min: Statistics::min(&data),
            max: Statistics::max(&data),
            mean: Statistics::mean(&data),
            std_dev: Statistics::population_std_dev(&data),
            count: data.len(),
        }
    }

    /// `max - min`.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "range=[{:.5}, {:.5}] mean={:.5} std={:.5} n={}",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_basic() {
        let summary = Summary::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
        assert!((summary.mean - 5.0).abs() < 1e-12);
        assert!((summary.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(summary.count, 8);
        assert_eq!(summary.range(), 7.0);
    }

    #[test]
    fn test_summary_empty() {
        let summary = Summary::of(&[]);
        assert_eq!(summary.count, 0);
        assert!(summary.mean.is_nan());
    }

    #[test]
    fn test_summary_display() {
        let text = Summary::of(&[-1.0, 1.0]).to_string();
        assert!(text.contains("range=[-1.00000, 1.00000]"));
        assert!(text.contains("n=2"));
    }
}
