// PI (Proportional-Integral) compensator with clamp-based anti-windup

use crate::config::{ConfigError, PiConfig};

/// Discrete PI compensator
///
/// Owns its integral accumulator. When limits are configured the integral is
/// clamped before the output is formed, then the output is clamped to the
/// same bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiCompensator {
    /// Proportional gain
    kp: f32,
    /// Integral gain
    ki: f32,
    /// Integration step [s]
    dt: f32,
    /// Integral accumulator
    integral: f32,
    /// Optional (min, max) bounds for integral and output
    limit: Option<(f32, f32)>,
    /// Last calculated output
    last_output: f32,
}

impl PiCompensator {
    /// Create a new PI compensator
    ///
    /// Fails when `dt` is not strictly positive or the limits are inverted.
    pub fn new(config: &PiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            kp: config.kp,
            ki: config.ki,
            dt: config.dt,
            integral: 0.0,
            limit: config.limit,
            last_output: 0.0,
        })
    }

    /// Run one compensation step
    ///
    /// # Arguments
    /// * `error` - Setpoint minus measurement
    ///
    /// # Returns
    /// Compensator output (clamped when limits are configured)
    pub fn compensate(&mut self, error: f32) -> f32 {
        self.integral += self.ki * error * self.dt;

        let output = match self.limit {
            Some((min, max)) => {
                // Integral first, then the output: changing this order changes
                // the transient after saturation
                self.integral = self.integral.clamp(min, max);
                (self.kp * error + self.integral).clamp(min, max)
            }
            None => self.kp * error + self.integral,
        };

        self.last_output = output;
        output
    }

    /// Reset the integral term to zero (gains and limits persist)
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_output = 0.0;
    }

    /// Set the proportional and integral gains
    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.kp = kp;
        self.ki = ki;
    }

    /// Replace the limits
    pub fn set_limits(&mut self, limit: Option<(f32, f32)>) -> Result<(), ConfigError> {
        PiConfig {
            kp: self.kp,
            ki: self.ki,
            dt: self.dt,
            limit,
        }
        .validate()?;
        self.limit = limit;
        Ok(())
    }

    /// Get the last output
    pub fn output(&self) -> f32 {
        self.last_output
    }

    /// Get the current integral term
    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn kp(&self) -> f32 {
        self.kp
    }

    pub fn ki(&self) -> f32 {
        self.ki
    }

    /// Check if the last output sat on a limit
    pub fn is_saturated(&self) -> bool {
        match self.limit {
            Some((min, max)) => self.last_output <= min || self.last_output >= max,
            None => false,
        }
    }
}
