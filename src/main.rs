//! Offline controller tuning for the pressure loop
//!
//! Simulates the PID/FOPDT closed loop over a setpoint step and fits
//! (kp, ki) by minimizing the tracking residual, starting from the
//! hand-tuned gains.

use nalgebra::DVector;
use pressim::{
    identify, step_profile, tuning_objective, ClosedLoop, FitError, Limits, ModelParams,
};

// Plant parameters identified from the multi-step recording
const PLANT: ModelParams = ModelParams {
    gain: -0.347,
    time_constant: 14.716,
    dead_time: 3.866,
    deviation: 5.2,
};

const INITIAL_VALUE: f64 = 5.2;
const TARGET: f64 = 4.3;
const STEP_TICK: usize = 10;
const TICKS: usize = 200;

fn main() -> Result<(), FitError> {
    env_logger::init();

    let closed_loop = ClosedLoop::new(PLANT, Limits::new(0.0, 5.0), INITIAL_VALUE);
    let setpoint = step_profile(TICKS, INITIAL_VALUE, TARGET, STEP_TICK);
    let objective = tuning_objective(closed_loop, setpoint);

    let x0 = DVector::from_vec(vec![-12.259, -1.481]);
    let fit = identify(objective, x0)?;

    println!("Initial RSS:\t{:.5}", fit.initial_rss);
    println!("Final RSS:\t{:.5}", fit.final_rss);
    println!("Kp:\t{:.3}", fit.params[0]);
    println!("Ki:\t{:.3}", fit.params[1]);

    Ok(())
}
