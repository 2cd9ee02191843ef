//! Zero-phase second-order IIR low-pass filtering.
//!
//! The filter runs a causal biquad forward over the whole signal, reverses
//! the result, runs it again and reverses back. The two passes cancel the
//! phase lag of a single causal pass, so the entire signal must be in memory.

use serde::{Deserialize, Serialize};

/// Feed-forward coefficients of the 2nd-order Butterworth low-pass
/// (10 Hz cutoff at 1000 Hz sampling).
pub const BUTTER_B: [f32; 3] = [0.000_944_691_8, 0.001_889_383_6, 0.000_944_691_8];

/// Feedback coefficients matching [`BUTTER_B`]. `a[0]` is always 1.
pub const BUTTER_A: [f32; 3] = [1.0, -1.911_197_1, 0.914_975_83];

/// Coefficients of one second-order difference equation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 3],
}

impl FilterCoefficients {
    /// The fixed 10 Hz Butterworth design.
    pub const fn butterworth_10hz() -> Self {
        Self {
            b: BUTTER_B,
            a: BUTTER_A,
        }
    }

    /// Gain of the filter at 0 Hz, `sum(b) / sum(a)`.
    pub fn dc_gain(&self) -> f64 {
        let b: f64 = self.b.iter().map(|&v| f64::from(v)).sum();
        let a: f64 = self.a.iter().map(|&v| f64::from(v)).sum();
        b / a
    }

    /// Steady-state internal state of the transposed direct form for a unit step.
    fn step_state(&self) -> [f32; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let r0 = b1 - a1 * b0;
        let r1 = b2 - a2 * b0;
        let z0 = (r0 + r1) / (1.0 + a1 + a2);
        [z0, r1 - a2 * z0]
    }
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        Self::butterworth_10hz()
    }
}

/// How the ends of the signal are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Samples before the start of each pass are zero.
    #[default]
    Zero,
    /// Odd reflection padding with steady-state initial conditions.
    Reflect,
}

impl std::str::FromStr for BoundaryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" => Ok(BoundaryMode::Zero),
            "reflect" => Ok(BoundaryMode::Reflect),
            other => Err(format!("unknown boundary mode '{other}' (expected zero or reflect)")),
        }
    }
}

/// Forward-backward biquad filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroPhaseFilter {
    coefficients: FilterCoefficients,
    boundary: BoundaryMode,
}

impl ZeroPhaseFilter {
    pub fn new(coefficients: FilterCoefficients, boundary: BoundaryMode) -> Self {
        Self {
            coefficients,
            boundary,
        }
    }

    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coefficients
    }

    pub fn boundary(&self) -> BoundaryMode {
        self.boundary
    }

    /// Filter the whole signal. Output length always equals input length.
    pub fn apply(&self, x: &[f32]) -> Vec<f32> {
        match self.boundary {
            BoundaryMode::Zero => self.apply_zero(x),
            BoundaryMode::Reflect => self.apply_reflect(x),
        }
    }

    fn apply_zero(&self, x: &[f32]) -> Vec<f32> {
        let mut y = causal_pass(x, &self.coefficients);
        y.reverse();
        let mut y = causal_pass(&y, &self.coefficients);
        y.reverse();
        y
    }

    fn apply_reflect(&self, x: &[f32]) -> Vec<f32> {
        let pad = 3 * (self.coefficients.a.len() - 1);
        // Too short to reflect; the zero-state pass is the only sensible answer.
        if x.len() <= pad {
            return self.apply_zero(x);
        }

        let extended = reflect_pad(x, pad);
        let zi = self.coefficients.step_state();

        let mut y = seeded_pass(&extended, &self.coefficients, zi);
        y.reverse();
        let mut y = seeded_pass(&y, &self.coefficients, zi);
        y.reverse();

        y[pad..pad + x.len()].to_vec()
    }
}

/// One causal pass of the difference equation with zero initial conditions.
///
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
pub fn causal_pass(x: &[f32], coefficients: &FilterCoefficients) -> Vec<f32> {
    let [b0, b1, b2] = coefficients.b;
    let [_, a1, a2] = coefficients.a;

    let mut y = vec![0.0f32; x.len()];
    for n in 0..x.len() {
        let mut acc = b0 * x[n];
        if n >= 1 {
            acc += b1 * x[n - 1] - a1 * y[n - 1];
        }
        if n >= 2 {
            acc += b2 * x[n - 2] - a2 * y[n - 2];
        }
        y[n] = acc;
    }
    y
}

/// Transposed direct form II pass seeded with `zi * x[0]`.
fn seeded_pass(x: &[f32], coefficients: &FilterCoefficients, zi: [f32; 2]) -> Vec<f32> {
    let [b0, b1, b2] = coefficients.b;
    let [_, a1, a2] = coefficients.a;

    let x0 = x.first().copied().unwrap_or(0.0);
    let (mut z0, mut z1) = (zi[0] * x0, zi[1] * x0);

    x.iter()
        .map(|&xn| {
            let yn = b0 * xn + z0;
            z0 = b1 * xn - a1 * yn + z1;
            z1 = b2 * xn - a2 * yn;
            yn
        })
        .collect()
}

/// Extend `x` at both ends by `2*edge - x[mirror]` (odd reflection).
fn reflect_pad(x: &[f32], pad: usize) -> Vec<f32> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    out
}

/// Zero-phase filter `x` with the fixed Butterworth design and zero initial conditions.
pub fn butterworth_zero_phase(x: &[f32]) -> Vec<f32> {
    ZeroPhaseFilter::default().apply(x)
}
