//! Manipulated-variable input sources for the process model
//!
//! The FOPDT derivative needs the delayed excitation `u(t - dead_time)`.
//! Two sources provide it:
//!
//! - [`TickHistory`]: a borrowed slice of per-tick samples (zero-order
//!   hold), used by the closed-loop simulator where the manipulated
//!   variable is produced one tick at a time
//! - [`InterpSeries`]: recorded data interpolated linearly against
//!   elapsed time, used when fitting the model to logged samples

/// Delayed manipulated-variable excitation
pub trait ProcessInput {
    /// Excitation seen by the process at time `t` after the dead-time
    /// shift has been applied.
    fn delayed(&self, t: f64, dead_time: f64) -> f64;
}

/// Per-tick manipulated-variable history, owned by the caller
///
/// Zero-order hold with dead-time shift and edge clamping: a lookup at
/// or before the start of history reads zero, at or beyond the end
/// reads the last available sample.
#[derive(Debug, Clone, Copy)]
pub struct TickHistory<'a> {
    samples: &'a [f64],
}

impl<'a> TickHistory<'a> {
    pub fn new(samples: &'a [f64]) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl ProcessInput for TickHistory<'_> {
    fn delayed(&self, t: f64, dead_time: f64) -> f64 {
        let tick = (t - dead_time).floor() as i64;
        if tick <= 0 {
            0.0
        } else if tick as usize >= self.samples.len() {
            *self.samples.last().unwrap_or(&0.0)
        } else {
            self.samples[tick as usize]
        }
    }
}

/// Recorded input samples with linear interpolation against time
///
/// The first sample is taken as the input bias: the model sees the
/// excitation as the deviation from the recording's starting level.
/// Queries outside the recorded span clamp to the endpoint values.
///
/// # Panics
///
/// Panics if the series is empty or the lengths differ.
#[derive(Debug, Clone)]
pub struct InterpSeries {
    times: Vec<f64>,
    values: Vec<f64>,
    bias: f64,
}

impl InterpSeries {
    /// Create a series from `(time, value)` samples
    ///
    /// `times` must be monotonically increasing.
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        if times.len() != values.len() {
            panic!("Times and values must have the same length");
        }
        if times.is_empty() {
            panic!("Series cannot be empty");
        }

        let bias = values[0];
        Self {
            times,
            values,
            bias,
        }
    }

    /// Input level at the start of the recording
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Interpolated value at time `t`, clamped to the recorded span
    pub fn sample(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n == 1 || t <= self.times[0] {
            return self.values[0];
        }
        if t >= self.times[n - 1] {
            return self.values[n - 1];
        }

        // Find the first grid point at or past t
        let idx = self
            .times
            .iter()
            .position(|&p| p >= t)
            .unwrap_or(n - 1);
        let (i0, i1) = (idx - 1, idx);

        let span = self.times[i1] - self.times[i0];
        if span == 0.0 {
            return self.values[i1];
        }
        let frac = (t - self.times[i0]) / span;
        self.values[i0] + frac * (self.values[i1] - self.values[i0])
    }
}

impl ProcessInput for InterpSeries {
    fn delayed(&self, t: f64, dead_time: f64) -> f64 {
        self.sample(t - dead_time) - self.bias
    }
}
