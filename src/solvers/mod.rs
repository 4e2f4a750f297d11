//! Numerical integration
//!
//! An explicit adaptive Runge-Kutta-Fehlberg 4(5) pair plus the driver
//! loop that steps it across an interval with automatic step-size
//! control. The process model is a smooth scalar ODE, so a single
//! embedded explicit pair covers it; stiff or implicit machinery is out
//! of scope here.

mod base;
mod rkf45;

pub use base::{ExplicitSolver, Solver, SolverError, SolverStepResult};
pub use rkf45::RKF45;

/// Smallest step fraction of the integration span before giving up
const DT_MIN_FRACTION: f64 = 1e-9;

/// Integrate a scalar ODE `dy/dt = f(y, t)` from `t0` to `t1`
///
/// Runs the adaptive buffer/step/revert cycle: a step whose error
/// estimate exceeds tolerance is reverted and retried with the rescaled
/// timestep. Returns the state at `t1`.
///
/// # Errors
///
/// [`SolverError::TimestepTooSmall`] when the error controller rejects
/// a step that is already at the minimum step size, which is how a
/// singular or wildly unstable right-hand side surfaces.
pub fn integrate<F>(f: F, y0: f64, t0: f64, t1: f64) -> Result<f64, SolverError>
where
    F: Fn(f64, f64) -> f64,
{
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(y0);
    }

    let dt_min = DT_MIN_FRACTION * span;
    let mut solver = RKF45::new(nalgebra::DVector::from_vec(vec![y0]));
    let mut t = t0;
    let mut dt = span;

    while t1 - t > dt_min {
        let h = dt.min(t1 - t);
        solver.buffer(h);

        let mut result = SolverStepResult::default();
        for _ in 0..solver.stages() {
            result = solver.step(
                |x, offset| nalgebra::DVector::from_vec(vec![f(x[0], t + offset)]),
                h,
            );
        }

        if result.success {
            t += h;
        } else {
            solver.revert()?;
            if h <= dt_min {
                return Err(SolverError::TimestepTooSmall { dt: h, dt_min });
            }
        }

        if let Some(scale) = result.scale {
            dt = (h * scale).max(dt_min);
        }
    }

    Ok(solver.state()[0])
}
