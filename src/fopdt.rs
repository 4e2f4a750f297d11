//! First-order-plus-dead-time (FOPDT) process model

use crate::input::ProcessInput;
use crate::solvers::{integrate, SolverError};

/// FOPDT model parameters
///
/// `deviation` is the steady-state value the controlled variable
/// reverts to without excitation. `time_constant` is a divisor and must
/// be non-zero; violating that is a caller contract violation, not a
/// recoverable runtime error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub gain: f64,
    pub time_constant: f64,
    pub dead_time: f64,
    pub deviation: f64,
}

/// FOPDT process model
///
/// Predicts the controlled variable from the history of
/// manipulated-variable inputs:
///
/// ```text
/// dy/dt = (-(y - deviation) + gain * u_delayed(t)) / time_constant
/// ```
///
/// where `u_delayed` is the dead-time-shifted excitation supplied by a
/// [`ProcessInput`]. The model itself is stateless across calls; the
/// input history is owned by the caller and borrowed per prediction.
///
/// # Example
///
/// ```ignore
/// let model = FOPDT::new(params);
/// let history = TickHistory::new(&mv[..=i]);
/// let next = model.predict(cv, i as f64, (i + 1) as f64, &history)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FOPDT {
    params: ModelParams,
}

impl FOPDT {
    pub fn new(params: ModelParams) -> Self {
        debug_assert!(
            params.time_constant != 0.0,
            "time_constant is a divisor and must be non-zero"
        );
        Self { params }
    }

    /// Current model parameters
    pub fn params(&self) -> ModelParams {
        self.params
    }

    /// Replace the model parameters
    pub fn set_params(&mut self, params: ModelParams) {
        debug_assert!(params.time_constant != 0.0);
        self.params = params;
    }

    /// Continuous-time derivative of the controlled variable
    pub fn derivative(&self, cv: f64, t: f64, input: &impl ProcessInput) -> f64 {
        let u = input.delayed(t, self.params.dead_time);
        (-(cv - self.params.deviation) + self.params.gain * u) / self.params.time_constant
    }

    /// Predict the controlled variable at `t1` given its value at `t0`
    ///
    /// Integrates the model ODE over `[t0, t1]` with the adaptive
    /// solver.
    pub fn predict(
        &self,
        cv: f64,
        t0: f64,
        t1: f64,
        input: &impl ProcessInput,
    ) -> Result<f64, SolverError> {
        integrate(|y, t| self.derivative(y, t, input), cv, t0, t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TickHistory;
    use approx::assert_relative_eq;

    fn params() -> ModelParams {
        ModelParams {
            gain: -0.347,
            time_constant: 14.716,
            dead_time: 3.866,
            deviation: 5.2,
        }
    }

    #[test]
    fn test_no_excitation_holds_deviation() {
        let model = FOPDT::new(params());
        let mv = [0.0; 10];
        let history = TickHistory::new(&mv);

        let next = model.predict(5.2, 0.0, 1.0, &history).unwrap();
        assert_relative_eq!(next, 5.2, epsilon = 1e-9);
    }

    #[test]
    fn test_relaxation_toward_deviation() {
        // No input: first-order decay of (y - deviation)
        let p = params();
        let model = FOPDT::new(p);
        let mv = [0.0; 400];
        let history = TickHistory::new(&mv);

        let mut cv = 8.0;
        for i in 0..200 {
            cv = model.predict(cv, i as f64, (i + 1) as f64, &history).unwrap();
        }

        // 200 ticks is about 13.6 time constants
        assert_relative_eq!(cv, p.deviation, epsilon = 1e-3);
    }

    #[test]
    fn test_steady_state_gain() {
        // Constant u = 1 held indefinitely: y -> deviation + gain
        let p = params();
        let model = FOPDT::new(p);
        let mv = vec![1.0; 400];
        let history = TickHistory::new(&mv);

        let mut cv = p.deviation;
        for i in 0..200 {
            cv = model.predict(cv, i as f64, (i + 1) as f64, &history).unwrap();
        }

        assert_relative_eq!(cv, 5.2 - 0.347, epsilon = 1e-3);
    }

    #[test]
    fn test_exponential_approach_rate() {
        // Single prediction step against the analytic first-order
        // response, with dead time zero and constant input.
        let p = ModelParams {
            gain: 2.0,
            time_constant: 5.0,
            dead_time: 0.0,
            deviation: 1.0,
        };
        let model = FOPDT::new(p);
        let mv = vec![1.0; 50];
        let history = TickHistory::new(&mv);

        // Start one tick in so the lookup is past the zero edge
        let y0 = 1.0;
        let y = model.predict(y0, 1.0, 4.0, &history).unwrap();

        // y(t) = deviation + gain*u*(1 - exp(-dt/tau))
        let exact = 1.0 + 2.0 * (1.0 - (-3.0_f64 / 5.0).exp());
        assert_relative_eq!(y, exact, epsilon = 1e-5);
    }
}
