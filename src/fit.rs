//! Parameter identification by residual-sum-of-squares minimization
//!
//! Two identification flavors share the same search engine:
//!
//! - Model fitting: FOPDT parameters `(gain, time_constant, dead_time)`
//!   against a recorded `(time, input, output)` log, with the input
//!   series linearly interpolated for the ODE integration
//! - Controller tuning: `(kp, ki)` against a setpoint trajectory via
//!   the closed-loop simulator, `kd` held at zero

use nalgebra::DVector;
use std::path::Path;
use thiserror::Error;

use crate::fopdt::{ModelParams, FOPDT};
use crate::input::InterpSeries;
use crate::optim::Bfgs;
use crate::pid::Gains;
use crate::sim::ClosedLoop;
use crate::solvers::SolverError;

/// Time constants at or below this are rejected before they reach the
/// model, so the optimizer's line search cannot drive the ODE singular.
const MIN_TIME_CONSTANT: f64 = 1e-3;

/// Identification errors
#[derive(Error, Debug)]
pub enum FitError {
    #[error("Solver failed during objective evaluation: {0}")]
    Solver(#[from] SolverError),

    #[error("Failed to read recorded data: {0}")]
    Csv(#[from] csv::Error),

    #[error("Recorded data is missing column '{0}'")]
    MissingColumn(String),

    #[error("Malformed numeric field: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("Recorded data is empty")]
    EmptyRecording,
}

/// Recorded process samples for model fitting
///
/// Ordered `(elapsed_time, manipulated_input, measured_output)`
/// samples, uniformly or non-uniformly spaced. Times are re-based so
/// the first sample sits at zero.
#[derive(Debug, Clone)]
pub struct ProcessData {
    pub time: Vec<f64>,
    pub input: Vec<f64>,
    pub output: Vec<f64>,
}

impl ProcessData {
    /// Build from parallel sample vectors
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    pub fn new(mut time: Vec<f64>, input: Vec<f64>, output: Vec<f64>) -> Self {
        if time.len() != input.len() || time.len() != output.len() {
            panic!("Time, input, and output must have the same length");
        }
        if let Some(&t0) = time.first() {
            for t in &mut time {
                *t -= t0;
            }
        }
        Self {
            time,
            input,
            output,
        }
    }

    /// Read a recording from a CSV log
    ///
    /// Expects the columns `Time consuming`, `Valve opening`, and
    /// `Pressure` (the real-time loop's log format).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, FitError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| FitError::MissingColumn(name.to_string()))
        };
        let t_col = column("Time consuming")?;
        let u_col = column("Valve opening")?;
        let y_col = column("Pressure")?;

        let mut time = Vec::new();
        let mut input = Vec::new();
        let mut output = Vec::new();
        for record in reader.records() {
            let record = record?;
            time.push(record.get(t_col).unwrap_or("").trim().parse::<f64>()?);
            input.push(record.get(u_col).unwrap_or("").trim().parse::<f64>()?);
            output.push(record.get(y_col).unwrap_or("").trim().parse::<f64>()?);
        }
        if time.is_empty() {
            return Err(FitError::EmptyRecording);
        }

        Ok(Self::new(time, input, output))
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Forward-simulate the FOPDT model over a recording's time grid
///
/// The recorded input is linearly interpolated (with its first sample
/// as bias) and the model is integrated tick interval by tick interval;
/// `deviation` is pinned to the first recorded output. A recording with
/// no samples yields [`FitError::EmptyRecording`].
pub fn simulate_model(data: &ProcessData, x: &DVector<f64>) -> Result<Vec<f64>, FitError> {
    if data.is_empty() {
        return Err(FitError::EmptyRecording);
    }
    let series = InterpSeries::new(data.time.clone(), data.input.clone());
    simulate_model_with(data, &series, x)
}

fn simulate_model_with(
    data: &ProcessData,
    series: &InterpSeries,
    x: &DVector<f64>,
) -> Result<Vec<f64>, FitError> {
    let model = FOPDT::new(ModelParams {
        gain: x[0],
        time_constant: x[1],
        dead_time: x[2],
        deviation: data.output[0],
    });

    let ns = data.len();
    let mut y = vec![0.0; ns];
    y[0] = data.output[0];
    for i in 0..ns.saturating_sub(1) {
        y[i + 1] = model.predict(y[i], data.time[i], data.time[i + 1], series)?;
    }
    Ok(y)
}

/// RSS objective for fitting `(gain, time_constant, dead_time)` to a
/// recording
///
/// Degenerate samples (non-finite parameters or a time constant at or
/// below [`MIN_TIME_CONSTANT`]) are rejected with an infinite residual
/// before they reach the model.
pub fn model_fit_objective(
    data: &ProcessData,
) -> impl Fn(&DVector<f64>) -> Result<f64, FitError> + '_ {
    // An empty recording surfaces as an error on evaluation, not as a
    // panic when the objective is built
    let series = (!data.is_empty())
        .then(|| InterpSeries::new(data.time.clone(), data.input.clone()));

    move |x: &DVector<f64>| {
        let series = series.as_ref().ok_or(FitError::EmptyRecording)?;
        if x.iter().any(|v| !v.is_finite()) || x[1] <= MIN_TIME_CONSTANT {
            return Ok(f64::INFINITY);
        }

        let y = simulate_model_with(data, series, x)?;
        Ok(y.iter()
            .zip(data.output.iter())
            .map(|(sim, meas)| (sim - meas) * (sim - meas))
            .sum())
    }
}

/// RSS objective for tuning `(kp, ki)` against a setpoint trajectory
///
/// Runs the closed-loop simulator with the candidate gains (`kd` fixed
/// at zero) and accumulates the squared tracking error.
pub fn tuning_objective(
    closed_loop: ClosedLoop,
    setpoint: Vec<f64>,
) -> impl Fn(&DVector<f64>) -> Result<f64, FitError> {
    move |x: &DVector<f64>| {
        if x.iter().any(|v| !v.is_finite()) {
            return Ok(f64::INFINITY);
        }

        let traj = closed_loop.run(Gains::new(x[0], x[1], 0.0), &setpoint)?;
        Ok(traj.tracking_rss())
    }
}

/// Result of an identification run
///
/// Carries the fitted vector plus the objective value at the initial
/// guess and at the solution, so fit-quality regressions stay visible.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub params: DVector<f64>,
    pub initial_rss: f64,
    pub final_rss: f64,
}

/// Minimize an RSS objective from an initial guess
///
/// Objective failures (solver divergence on a sampled parameter vector)
/// abort the run; the caller constrains the search domain if it needs
/// robustness beyond the built-in degenerate-sample rejection.
pub fn identify<F>(objective: F, initial_guess: DVector<f64>) -> Result<FitResult, FitError>
where
    F: Fn(&DVector<f64>) -> Result<f64, FitError>,
{
    let initial_rss = objective(&initial_guess)?;
    log::info!("Initial RSS: {:.5}", initial_rss);

    let minimum = Bfgs::default().minimize(&objective, initial_guess)?;
    log::info!(
        "Final RSS: {:.5} after {} iterations",
        minimum.value,
        minimum.iterations
    );

    Ok(FitResult {
        params: minimum.x,
        initial_rss,
        final_rss: minimum.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic_data(x: &DVector<f64>) -> ProcessData {
        // Multi-step excitation, 1 s grid
        let n = 120;
        let time: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let input: Vec<f64> = (0..n)
            .map(|i| match i {
                0..=9 => 0.0,
                10..=59 => 1.0,
                _ => 0.4,
            })
            .collect();

        let mut data = ProcessData::new(time, input, vec![5.2; n]);
        data.output = simulate_model(&data, x).unwrap();
        data
    }

    #[test]
    fn test_model_objective_zero_at_truth() {
        let truth = DVector::from_vec(vec![-0.35, 12.0, 3.0]);
        let data = synthetic_data(&truth);
        let objective = model_fit_objective(&data);

        let rss = objective(&truth).unwrap();
        assert_relative_eq!(rss, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_model_objective_rejects_degenerate_tau() {
        let truth = DVector::from_vec(vec![-0.35, 12.0, 3.0]);
        let data = synthetic_data(&truth);
        let objective = model_fit_objective(&data);

        let rss = objective(&DVector::from_vec(vec![-0.35, 0.0, 3.0])).unwrap();
        assert!(rss.is_infinite());
        let rss = objective(&DVector::from_vec(vec![-0.35, -5.0, 3.0])).unwrap();
        assert!(rss.is_infinite());
        let rss = objective(&DVector::from_vec(vec![f64::NAN, 12.0, 3.0])).unwrap();
        assert!(rss.is_infinite());
    }

    #[test]
    fn test_model_objective_positive_off_truth() {
        let truth = DVector::from_vec(vec![-0.35, 12.0, 3.0]);
        let data = synthetic_data(&truth);
        let objective = model_fit_objective(&data);

        let rss = objective(&DVector::from_vec(vec![-1.0, 10.0, 1.0])).unwrap();
        assert!(rss > 0.1);
    }

    #[test]
    fn test_empty_recording_is_an_error_not_a_panic() {
        let empty = ProcessData::new(Vec::new(), Vec::new(), Vec::new());
        let x = DVector::from_vec(vec![-0.35, 12.0, 3.0]);

        assert!(matches!(
            simulate_model(&empty, &x),
            Err(FitError::EmptyRecording)
        ));

        let objective = model_fit_objective(&empty);
        assert!(matches!(objective(&x), Err(FitError::EmptyRecording)));
    }

    #[test]
    fn test_process_data_rebases_time() {
        let data = ProcessData::new(
            vec![100.0, 101.0, 102.5],
            vec![0.0, 1.0, 1.0],
            vec![5.0, 5.0, 4.9],
        );
        assert_eq!(data.time, vec![0.0, 1.0, 2.5]);
    }

    #[test]
    fn test_from_csv_roundtrip() {
        let dir = std::env::temp_dir().join("pressim_fit_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("recording.csv");
        std::fs::write(
            &path,
            "Time consuming,Valve opening,Pressure,Model Predict\n\
             10.00,0.0,5.2,5.2\n\
             11.00,2.0,5.2,5.2\n\
             12.00,2.0,5.1,5.1\n",
        )
        .unwrap();

        let data = ProcessData::from_csv(&path).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(data.input, vec![0.0, 2.0, 2.0]);
        assert_eq!(data.output, vec![5.2, 5.2, 5.1]);
    }

    #[test]
    fn test_from_csv_missing_column() {
        let dir = std::env::temp_dir().join("pressim_fit_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.csv");
        std::fs::write(&path, "Time consuming,Pressure\n0.0,5.2\n").unwrap();

        match ProcessData::from_csv(&path) {
            Err(FitError::MissingColumn(name)) => assert_eq!(name, "Valve opening"),
            other => panic!("expected MissingColumn, got {:?}", other.map(|d| d.len())),
        }
    }
}
