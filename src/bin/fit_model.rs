//! Fit FOPDT parameters to a recorded step-change log
//!
//! Reads a CSV recording (`Time consuming`, `Valve opening`,
//! `Pressure` columns) and fits (gain, time constant, dead time) by
//! minimizing the residual sum of squares between the simulated and
//! measured pressure.

use nalgebra::DVector;
use pressim::{identify, model_fit_objective, FitError, ProcessData};

fn main() -> Result<(), FitError> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/multi_step_change.csv".to_string());
    let data = ProcessData::from_csv(&path)?;
    println!("Loaded {} samples from {}", data.len(), path);

    let objective = model_fit_objective(&data);
    let x0 = DVector::from_vec(vec![-1.0, 10.0, 1.0]);
    let fit = identify(objective, x0)?;

    println!("Initial RSS:\t{:.5}", fit.initial_rss);
    println!("Final RSS:\t{:.5}", fit.final_rss);
    println!("Gain:\t{:.3}", fit.params[0]);
    println!("Tau:\t{:.3}", fit.params[1]);
    println!("Dead time:\t{:.3}", fit.params[2]);

    Ok(())
}
