//! Runge-Kutta-Fehlberg 4(5) adaptive solver

use nalgebra::DVector;
use std::collections::VecDeque;

use super::{ExplicitSolver, Solver, SolverError, SolverStepResult};

/// Runge-Kutta-Fehlberg 4(5) pair adaptive solver
///
/// Six stages, 4th order propagation with 5th order error estimate.
/// The difference between the two embedded solutions provides a local
/// error estimate that drives automatic step-size control.
///
/// # Characteristics
/// - Order: 5 (propagating) / 4 (error estimate)
/// - Stages: 6
/// - Explicit, adaptive timestep
///
/// # References
/// - Fehlberg, E. (1969). "Low-order classical Runge-Kutta formulas
///   with stepsize control and their application to some heat transfer
///   problems". NASA Technical Report TR R-315.
#[derive(Debug, Clone)]
pub struct RKF45 {
    state: DVector<f64>,
    history: VecDeque<DVector<f64>>,
    slopes: Vec<DVector<f64>>,
    stage: usize,
    tol_abs: f64,
    tol_rel: f64,
    beta: f64,
}

impl RKF45 {
    /// Create a new RKF45 solver with the given initial state
    pub fn new(initial: DVector<f64>) -> Self {
        Self::with_tolerances(initial, 1e-8, 1e-6)
    }

    /// Create a new RKF45 solver with custom tolerances
    ///
    /// # Arguments
    /// * `initial` - Initial state vector
    /// * `tol_abs` - Absolute error tolerance
    /// * `tol_rel` - Relative error tolerance
    pub fn with_tolerances(initial: DVector<f64>, tol_abs: f64, tol_rel: f64) -> Self {
        let n = initial.len();
        Self {
            state: initial,
            history: VecDeque::with_capacity(2),
            slopes: vec![DVector::zeros(n); 6],
            stage: 0,
            tol_abs,
            tol_rel,
            beta: 0.9, // Safety factor
        }
    }

    /// Compute error norm and timestep scale factor
    fn error_controller(&self, dt: f64) -> (bool, f64, f64) {
        // Coefficients for local truncation error estimate
        // TR = [1/360, 0, -128/4275, -2197/75240, 1/50, 2/55]
        let tr = [
            1.0 / 360.0,
            0.0,
            -128.0 / 4275.0,
            -2197.0 / 75240.0,
            1.0 / 50.0,
            2.0 / 55.0,
        ];

        let mut error_slope = DVector::zeros(self.state.len());
        for (i, &coef) in tr.iter().enumerate() {
            error_slope += coef * &self.slopes[i];
        }

        // Scale by tolerances, avoiding division by zero
        let scale = self.state.map(|x| self.tol_abs + self.tol_rel * x.abs());
        let scaled_error = (dt * &error_slope).component_div(&scale).map(|e| e.abs());
        let error_norm = scaled_error.max().max(1e-16);
        let success = error_norm <= 1.0;

        // Step rescale from the embedded order, clipped to [0.1, 10]
        let order = 4.0;
        let mut timestep_scale = self.beta / error_norm.powf(1.0 / (order + 1.0));
        timestep_scale = timestep_scale.clamp(0.1, 10.0);

        (success, error_norm, timestep_scale)
    }
}

impl Solver for RKF45 {
    fn state(&self) -> &DVector<f64> {
        &self.state
    }

    fn buffer(&mut self, _dt: f64) {
        if self.history.len() >= 2 {
            self.history.pop_back();
        }
        self.history.push_front(self.state.clone());
        self.stage = 0;
    }

    fn revert(&mut self) -> Result<(), SolverError> {
        self.state = self.history.pop_front().ok_or(SolverError::EmptyHistory)?;
        self.stage = 0;
        Ok(())
    }

    fn order(&self) -> usize {
        5
    }

    fn stages(&self) -> usize {
        6
    }

    fn is_adaptive(&self) -> bool {
        true
    }
}

impl ExplicitSolver for RKF45 {
    fn step<F>(&mut self, mut f: F, dt: f64) -> SolverStepResult
    where
        F: FnMut(&DVector<f64>, f64) -> DVector<f64>,
    {
        let x0 = self
            .history
            .front()
            .expect("Must call buffer() before step()");

        // c (evaluation offsets) = [0, 1/4, 3/8, 12/13, 1, 1/2]
        let c = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];

        // Butcher tableau coefficients (a_ij)
        #[rustfmt::skip]
        let a: [&[f64]; 6] = [
            &[1.0/4.0],
            &[3.0/32.0, 9.0/32.0],
            &[1932.0/2197.0, -7200.0/2197.0, 7296.0/2197.0],
            &[439.0/216.0, -8.0, 3680.0/513.0, -845.0/4104.0],
            &[-8.0/27.0, 2.0, -3554.0/2565.0, 1859.0/4104.0, -11.0/40.0],
            &[25.0/216.0, 0.0, 1408.0/2565.0, 2197.0/4104.0, -1.0/5.0, 0.0],
        ];

        self.slopes[self.stage] = f(&self.state, c[self.stage] * dt);

        if self.stage < 5 {
            let mut slope_sum = DVector::zeros(x0.len());
            for (i, &coef) in a[self.stage].iter().enumerate() {
                slope_sum += coef * &self.slopes[i];
            }
            self.state = x0 + dt * slope_sum;
            self.stage += 1;

            SolverStepResult::default()
        } else {
            // Final stage: propagate with the 4th order combination,
            // then compute the error estimate and timestep scale
            let mut slope_sum = DVector::zeros(x0.len());
            for (i, &coef) in a[5].iter().enumerate() {
                slope_sum += coef * &self.slopes[i];
            }
            self.state = x0 + dt * slope_sum;

            let (success, error_norm, scale) = self.error_controller(dt);
            self.stage = 0;

            SolverStepResult {
                success,
                error_norm,
                scale: Some(scale),
            }
        }
    }
}
