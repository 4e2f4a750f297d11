//! Local nonlinear minimization
//!
//! A quasi-Newton (BFGS) minimizer over a scalar objective of a real
//! vector, with central-difference numerical gradients. This is the
//! pluggable search engine behind parameter identification; it carries
//! no knowledge of the process model.

mod bfgs;

pub use bfgs::{gradient, Bfgs, Minimum};
