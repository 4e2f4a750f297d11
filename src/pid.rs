//! PID controller with output limiting and conditional anti-windup

/// Proportional, integral, and derivative gains
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Output limits for the manipulated variable
///
/// `confine` sorts the bounds before clamping, so limits supplied in
/// reverse order are normalized rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

impl Limits {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into the limit range
    pub fn confine(&self, value: f64) -> f64 {
        let (lower, upper) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        value.clamp(lower, upper)
    }
}

/// PID controller for a single control loop
///
/// Consumes a setpoint and a measured value per call and produces a
/// bounded manipulated-variable command. Integral and derivative state
/// is carried across calls; each physical channel needs its own
/// instance.
///
/// # Control Law
///
/// The raw output is `p + i + d + limits.min`: the lower limit acts as
/// a bias so that zero error holds the output at the bottom of the
/// actuation range rather than at zero. The result is clamped to the
/// limit range.
///
/// # Anti-Windup Strategy
///
/// The increment `ki * error` is accumulated only while the previous
/// output sits strictly inside the limits. With `kp == 0` there is no
/// proportional action to pull the output off a limit, so an increment
/// pointing back inside the range is additionally accepted at the exact
/// limit values.
///
/// # Example
///
/// ```ignore
/// let mut pid = PID::new(Limits::new(0.0, 5.0));
/// pid.set_gains(Gains::new(-12.259, -1.481, 0.0));
/// let mv = pid.evaluate(4.3, pressure);
/// ```
#[derive(Debug, Clone)]
pub struct PID {
    gains: Gains,
    limits: Limits,

    // Last computed term contributions
    p_term: f64,
    i_term: f64,
    d_term: f64,

    // Previous derivative proxy (-measured) and previous output
    prev_error: f64,
    prev_output: f64,

    // True once the derivative proxy has been primed
    derivative_initialized: bool,
}

impl PID {
    /// Create a controller with zeroed gains and state
    pub fn new(limits: Limits) -> Self {
        Self {
            gains: Gains::default(),
            limits,
            p_term: 0.0,
            i_term: 0.0,
            d_term: 0.0,
            prev_error: 0.0,
            prev_output: 0.0,
            derivative_initialized: false,
        }
    }

    /// Create a controller with gains already set
    pub fn with_gains(limits: Limits, gains: Gains) -> Self {
        let mut pid = Self::new(limits);
        pid.gains = gains;
        pid
    }

    /// Current gains
    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Set the controller gains
    pub fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
    }

    /// Output limits
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Last computed (p, i, d) term contributions
    pub fn terms(&self) -> (f64, f64, f64) {
        (self.p_term, self.i_term, self.d_term)
    }

    /// Compute the manipulated-variable command for one tick
    ///
    /// Zero error returns the previous output unchanged without
    /// touching any state, so an exactly-held setpoint does not chatter
    /// around the limit bias.
    pub fn evaluate(&mut self, setpoint: f64, measured: f64) -> f64 {
        let error = setpoint - measured;
        if error == 0.0 {
            return self.prev_output;
        }

        self.p_term = self.gains.kp * error;

        let increment = self.gains.ki * error;
        if self.limits.min < self.prev_output && self.prev_output < self.limits.max {
            self.i_term += increment;
        }
        if self.gains.kp == 0.0 {
            // Saturation recovery without proportional action: accept
            // an increment that points back inside the range.
            if (self.prev_output == self.limits.min && increment > 0.0)
                || (self.prev_output == self.limits.max && increment < 0.0)
            {
                self.i_term += increment;
            }
        }

        // Derivative on measurement, not on error, so setpoint steps do
        // not spike the output.
        let error_d = -measured;
        if self.derivative_initialized {
            self.d_term = self.gains.kd * (error_d - self.prev_error);
        } else {
            self.d_term = 0.0;
            self.derivative_initialized = true;
        }
        self.prev_error = error_d;

        let output = self
            .limits
            .confine(self.p_term + self.i_term + self.d_term + self.limits.min);
        self.prev_output = output;
        output
    }

    /// Reset the controller internals
    ///
    /// Term state is zeroed (the integral through the output clamp) and
    /// the derivative proxy is un-primed; gains and limits are kept.
    pub fn reset(&mut self) {
        self.p_term = 0.0;
        self.i_term = self.limits.confine(0.0);
        self.d_term = 0.0;
        self.prev_error = 0.0;
        self.prev_output = 0.0;
        self.derivative_initialized = false;
    }
}
