//! pressim - Closed-loop pressure control core
//!
//! Feedback control and system identification for a first-order-plus-
//! dead-time (FOPDT) pressure process:
//!
//! - A PID controller with output limiting, conditional anti-windup
//!   integration, and derivative-on-measurement
//! - An FOPDT process model integrated with an adaptive Runge-Kutta
//!   solver, with dead-time lookup against a caller-owned input history
//! - A closed-loop simulator that couples the two over a discrete tick
//!   grid
//! - A residual-sum-of-squares identifier that fits model parameters to
//!   recorded data or controller gains to a target setpoint trajectory
//!
//! Hardware I/O (sensor/actuator drivers, unit conversion, the
//! real-time loop) lives outside this crate; the core exchanges scalar
//! measurement and actuation values only.
//!
//! # Example
//!
//! ```rust,ignore
//! use pressim::prelude::*;
//!
//! let plant = ModelParams {
//!     gain: -0.347,
//!     time_constant: 14.716,
//!     dead_time: 3.866,
//!     deviation: 5.2,
//! };
//! let closed_loop = ClosedLoop::new(plant, Limits::new(0.0, 5.0), 5.2);
//! let setpoint = step_profile(200, 5.2, 4.3, 10);
//! let traj = closed_loop.run(Gains::new(-12.259, -1.481, 0.0), &setpoint)?;
//! ```

pub mod fit;
pub mod fopdt;
pub mod input;
pub mod optim;
pub mod pid;
pub mod sim;
pub mod solvers;

pub use fit::{
    identify, model_fit_objective, simulate_model, tuning_objective, FitError, FitResult,
    ProcessData,
};
pub use fopdt::{ModelParams, FOPDT};
pub use input::{InterpSeries, ProcessInput, TickHistory};
pub use pid::{Gains, Limits, PID};
pub use sim::{step_profile, ClosedLoop, Trajectory};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fit::{
        identify, model_fit_objective, simulate_model, tuning_objective, FitError, FitResult,
        ProcessData,
    };
    pub use crate::fopdt::{ModelParams, FOPDT};
    pub use crate::input::{InterpSeries, ProcessInput, TickHistory};
    pub use crate::optim::{Bfgs, Minimum};
    pub use crate::pid::{Gains, Limits, PID};
    pub use crate::sim::{step_profile, ClosedLoop, Trajectory};
    pub use crate::solvers::*;
}
