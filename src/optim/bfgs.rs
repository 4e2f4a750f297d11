//! BFGS quasi-Newton minimizer with numerical gradients

use nalgebra::{DMatrix, DVector};

/// Relative perturbation for central differences
const DIFF_REL: f64 = 1e-6;
/// Perturbation floor for components near zero
const DIFF_MIN: f64 = 1e-7;

/// Compute the gradient of a scalar objective by central differences
///
/// Perturbation per component is `max(DIFF_REL * |x_i|, DIFF_MIN)`.
/// Objective failures propagate to the caller.
pub fn gradient<F, E>(f: &F, x: &DVector<f64>) -> Result<DVector<f64>, E>
where
    F: Fn(&DVector<f64>) -> Result<f64, E>,
{
    let n = x.len();
    let mut grad = DVector::zeros(n);

    for i in 0..n {
        let h = (DIFF_REL * x[i].abs()).max(DIFF_MIN);
        let mut x_plus = x.clone();
        let mut x_minus = x.clone();
        x_plus[i] += h;
        x_minus[i] -= h;

        let f_plus = f(&x_plus)?;
        let f_minus = f(&x_minus)?;
        grad[i] = (f_plus - f_minus) / (2.0 * h);
    }

    Ok(grad)
}

/// Converged (or stalled) result of a minimization
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Parameter vector at the stopping point
    pub x: DVector<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Iterations taken
    pub iterations: usize,
}

/// BFGS quasi-Newton minimizer
///
/// Maintains an inverse-Hessian approximation updated from gradient
/// differences and takes Armijo-backtracked line steps along the
/// quasi-Newton direction. Gradients are numerical (central
/// differences), so the objective only needs to be evaluable, not
/// differentiable in closed form.
///
/// Stops when the gradient max-norm falls below `grad_tol`, when a line
/// search cannot find any decrease, or after `max_iters` iterations.
///
/// # Example
///
/// ```ignore
/// let bfgs = Bfgs::default();
/// let min = bfgs.minimize(|x| Ok::<_, FitError>(objective(x)), x0)?;
/// ```
#[derive(Debug, Clone)]
pub struct Bfgs {
    pub max_iters: usize,
    pub grad_tol: f64,
}

impl Default for Bfgs {
    fn default() -> Self {
        Self {
            max_iters: 300,
            grad_tol: 1e-6,
        }
    }
}

impl Bfgs {
    pub fn new(max_iters: usize, grad_tol: f64) -> Self {
        Self {
            max_iters,
            grad_tol,
        }
    }

    /// Minimize `f` starting from `x0`
    ///
    /// Objective failures (solver divergence inside `f`) abort the
    /// whole run; there is no internal retry.
    pub fn minimize<F, E>(&self, f: F, x0: DVector<f64>) -> Result<Minimum, E>
    where
        F: Fn(&DVector<f64>) -> Result<f64, E>,
    {
        let n = x0.len();
        let mut x = x0;
        let mut fx = f(&x)?;

        // Nothing to descend from an infinite starting value
        if !fx.is_finite() {
            return Ok(Minimum {
                x,
                value: fx,
                iterations: 0,
            });
        }

        let mut grad = gradient(&f, &x)?;
        let mut h_inv = DMatrix::<f64>::identity(n, n);
        let mut iterations = 0;

        for _ in 0..self.max_iters {
            if grad.amax() < self.grad_tol {
                break;
            }
            iterations += 1;

            // Quasi-Newton direction; fall back to steepest descent if
            // the approximation has lost positive definiteness
            let mut direction = -(&h_inv * &grad);
            let mut slope = grad.dot(&direction);
            if slope >= 0.0 {
                h_inv = DMatrix::identity(n, n);
                direction = -grad.clone();
                slope = -grad.dot(&grad);
            }

            // Armijo backtracking line search
            let c1 = 1e-4;
            let mut alpha = 1.0;
            let (x_new, f_new) = loop {
                let candidate = &x + alpha * &direction;
                let value = f(&candidate)?;
                if value <= fx + c1 * alpha * slope {
                    break (candidate, value);
                }
                alpha *= 0.5;
                if alpha < 1e-12 {
                    break (candidate, value);
                }
            };

            // NaN-safe: anything but a strict decrease stalls the search
            if !(f_new < fx) {
                break;
            }

            let grad_new = gradient(&f, &x_new)?;
            let s = &x_new - &x;
            let y = &grad_new - &grad;
            let sy = s.dot(&y);

            // Curvature guard keeps the inverse Hessian positive definite
            if sy > 1e-10 * s.norm() * y.norm() {
                let rho = 1.0 / sy;
                let identity = DMatrix::<f64>::identity(n, n);
                let left = &identity - rho * &s * y.transpose();
                let right = &identity - rho * &y * s.transpose();
                h_inv = &left * &h_inv * &right + rho * &s * s.transpose();
            }

            x = x_new;
            fx = f_new;
            grad = grad_new;
        }

        Ok(Minimum {
            x,
            value: fx,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::convert::Infallible;

    fn ok(value: f64) -> Result<f64, Infallible> {
        Ok(value)
    }

    #[test]
    fn test_gradient_quadratic() {
        let f = |x: &DVector<f64>| ok(x[0] * x[0] + 3.0 * x[1]);
        let g = gradient(&f, &DVector::from_vec(vec![2.0, 1.0])).unwrap();

        assert_relative_eq!(g[0], 4.0, epsilon = 1e-5);
        assert_relative_eq!(g[1], 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_minimize_quadratic_bowl() {
        // f(x) = (x0 - 3)^2 + 2*(x1 + 1)^2, minimum at (3, -1)
        let f = |x: &DVector<f64>| {
            ok((x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2))
        };

        let min = Bfgs::default()
            .minimize(f, DVector::from_vec(vec![0.0, 0.0]))
            .unwrap();

        assert_relative_eq!(min.x[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(min.x[1], -1.0, epsilon = 1e-4);
        assert!(min.value < 1e-8);
    }

    #[test]
    fn test_minimize_rosenbrock() {
        let f = |x: &DVector<f64>| {
            ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        };

        let bfgs = Bfgs::new(500, 1e-7);
        let min = bfgs
            .minimize(f, DVector::from_vec(vec![-1.2, 1.0]))
            .unwrap();

        assert!(min.value < 1e-6);
        assert_relative_eq!(min.x[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(min.x[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_minimize_monotone_decrease() {
        let f = |x: &DVector<f64>| ok(x[0].powi(4) + x[0] * x[0]);
        let x0 = DVector::from_vec(vec![2.5]);
        let initial = f(&x0).unwrap();

        let min = Bfgs::default().minimize(f, x0).unwrap();
        assert!(min.value <= initial);
        assert_relative_eq!(min.x[0], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_minimize_infinite_start_returns_immediately() {
        let f = |_x: &DVector<f64>| ok(f64::INFINITY);
        let min = Bfgs::default()
            .minimize(f, DVector::from_vec(vec![1.0]))
            .unwrap();

        assert_eq!(min.iterations, 0);
        assert!(min.value.is_infinite());
    }
}
