//! Closed-loop simulator coupling the PID controller and FOPDT model

use crate::fopdt::{ModelParams, FOPDT};
use crate::input::TickHistory;
use crate::pid::{Gains, Limits, PID};
use crate::solvers::SolverError;

/// Simulated closed-loop trajectories over a discrete tick grid
///
/// All series have the same length. The last tick carries no forward
/// step, so setpoint, manipulated variable, and the term series
/// replicate the second-to-last tick there.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub setpoint: Vec<f64>,
    pub cv: Vec<f64>,
    pub mv: Vec<f64>,
    pub p_term: Vec<f64>,
    pub i_term: Vec<f64>,
    pub d_term: Vec<f64>,
}

impl Trajectory {
    fn zeros(n: usize) -> Self {
        Self {
            setpoint: vec![0.0; n],
            cv: vec![0.0; n],
            mv: vec![0.0; n],
            p_term: vec![0.0; n],
            i_term: vec![0.0; n],
            d_term: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.cv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cv.is_empty()
    }

    /// Residual sum of squares between the controlled variable and the
    /// setpoint, over all ticks
    pub fn tracking_rss(&self) -> f64 {
        self.cv
            .iter()
            .zip(self.setpoint.iter())
            .map(|(cv, sp)| (cv - sp) * (cv - sp))
            .sum()
    }
}

/// Step setpoint profile: `initial` until `step_tick`, then `target`
pub fn step_profile(n: usize, initial: f64, target: f64, step_tick: usize) -> Vec<f64> {
    (0..n)
        .map(|i| if i < step_tick { initial } else { target })
        .collect()
}

/// Closed-loop simulation of a PID-regulated FOPDT process
///
/// Per tick the controller output is appended to the manipulated-
/// variable history and the model advances the controlled variable one
/// tick using that history. All time is the integer tick index; runs
/// are deterministic and bit-for-bit reproducible.
#[derive(Debug, Clone, Copy)]
pub struct ClosedLoop {
    pub model: ModelParams,
    pub limits: Limits,
    pub initial_value: f64,
}

impl ClosedLoop {
    pub fn new(model: ModelParams, limits: Limits, initial_value: f64) -> Self {
        Self {
            model,
            limits,
            initial_value,
        }
    }

    /// Simulate the loop with the given gains over the setpoint profile
    ///
    /// The grid is `[0, setpoint.len())`; an empty profile yields an
    /// empty trajectory.
    pub fn run(&self, gains: Gains, setpoint: &[f64]) -> Result<Trajectory, SolverError> {
        let n = setpoint.len();
        let mut traj = Trajectory::zeros(n);
        if n == 0 {
            return Ok(traj);
        }

        let mut pid = PID::with_gains(self.limits, gains);
        let model = FOPDT::new(self.model);
        let mut history: Vec<f64> = Vec::with_capacity(n);

        traj.cv[0] = self.initial_value;
        for i in 0..n - 1 {
            traj.setpoint[i] = setpoint[i];
            traj.mv[i] = pid.evaluate(traj.setpoint[i], traj.cv[i]);
            history.push(traj.mv[i]);

            traj.cv[i + 1] = model.predict(
                traj.cv[i],
                i as f64,
                (i + 1) as f64,
                &TickHistory::new(&history),
            )?;

            let (p, i_val, d) = pid.terms();
            traj.p_term[i] = p;
            traj.i_term[i] = i_val;
            traj.d_term[i] = d;
        }

        // Endpoint has no look-ahead: replicate the second-to-last tick
        if n > 1 {
            traj.setpoint[n - 1] = traj.setpoint[n - 2];
            traj.mv[n - 1] = traj.mv[n - 2];
            traj.p_term[n - 1] = traj.p_term[n - 2];
            traj.i_term[n - 1] = traj.i_term[n - 2];
            traj.d_term[n - 1] = traj.d_term[n - 2];
        }

        Ok(traj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plant() -> ModelParams {
        ModelParams {
            gain: -0.347,
            time_constant: 14.716,
            dead_time: 3.866,
            deviation: 5.2,
        }
    }

    #[test]
    fn test_step_profile() {
        let sp = step_profile(5, 1.0, 2.0, 3);
        assert_eq!(sp, vec![1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_endpoint_replication() {
        let closed_loop = ClosedLoop::new(plant(), Limits::new(0.0, 5.0), 5.2);
        let sp = step_profile(50, 5.2, 4.3, 10);
        let traj = closed_loop
            .run(Gains::new(-12.259, -1.481, 0.0), &sp)
            .unwrap();

        let n = traj.len();
        assert_eq!(traj.setpoint[n - 1], traj.setpoint[n - 2]);
        assert_eq!(traj.mv[n - 1], traj.mv[n - 2]);
        assert_eq!(traj.p_term[n - 1], traj.p_term[n - 2]);
        assert_eq!(traj.i_term[n - 1], traj.i_term[n - 2]);
        assert_eq!(traj.d_term[n - 1], traj.d_term[n - 2]);
    }

    #[test]
    fn test_deterministic_repeat() {
        let closed_loop = ClosedLoop::new(plant(), Limits::new(0.0, 5.0), 5.2);
        let sp = step_profile(80, 5.2, 4.3, 10);
        let gains = Gains::new(-10.941, -1.351, 0.0);

        let a = closed_loop.run(gains, &sp).unwrap();
        let b = closed_loop.run(gains, &sp).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_holds_steady_before_step() {
        // Setpoint equals the process rest point: zero error passes the
        // previous output through and the plant never moves.
        let closed_loop = ClosedLoop::new(plant(), Limits::new(0.0, 5.0), 5.2);
        let sp = step_profile(10, 5.2, 4.3, 10);
        let traj = closed_loop
            .run(Gains::new(-12.259, -1.481, 0.0), &sp)
            .unwrap();

        for i in 0..traj.len() {
            assert_relative_eq!(traj.cv[i], 5.2, epsilon = 1e-9);
            assert_eq!(traj.mv[i], 0.0);
        }
    }

    #[test]
    fn test_mv_within_limits() {
        let limits = Limits::new(0.0, 5.0);
        let closed_loop = ClosedLoop::new(plant(), limits, 5.2);
        let sp = step_profile(100, 5.2, 4.3, 10);
        let traj = closed_loop
            .run(Gains::new(-12.259, -1.481, 0.0), &sp)
            .unwrap();

        for &mv in &traj.mv {
            assert!((limits.min..=limits.max).contains(&mv));
        }
    }

    #[test]
    fn test_empty_profile() {
        let closed_loop = ClosedLoop::new(plant(), Limits::new(0.0, 5.0), 5.2);
        let traj = closed_loop.run(Gains::default(), &[]).unwrap();
        assert!(traj.is_empty());
    }
}
