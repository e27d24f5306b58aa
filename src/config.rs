//! Configuration module
//!
//! Typed configuration records supplied once at control-loop setup.
//! Every record has a `Default` built from [`params`] and a `validate()`
//! step; constructors that consume a record call it and refuse to build
//! on error.

pub mod params;

use crate::control::transforms::{ParkType, TrigMode};

pub use params::*;

/// Rejected configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// PI time step unset, zero or negative
    NonPositiveTimeStep,
    /// Limit pair with `min > max` or a non-finite bound
    InvalidLimits,
    /// Filter window of zero samples
    EmptyFilterWindow,
    /// Filter window larger than the backing buffer
    FilterWindowTooLarge,
    /// Lock band inverted, negative, or an empty evaluation window
    InvalidLockThresholds,
    /// Sample rate unset, zero or negative
    NonPositiveSampleRate,
    /// Open-loop frequencies or acceleration out of range
    InvalidOpenLoopParams,
    /// DC-link thresholds inverted or filter coefficient outside (0, 1]
    InvalidDcLinkThresholds,
    /// Nominal grid frequency negative or not finite
    InvalidNominalFrequency,
}

/// PI compensator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiConfig {
    pub kp: f32,
    pub ki: f32,
    /// Integration step [s]
    pub dt: f32,
    /// Optional `(min, max)` clamp applied to the integral and the output
    pub limit: Option<(f32, f32)>,
}

impl PiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(ConfigError::NonPositiveTimeStep);
        }
        if let Some((min, max)) = self.limit {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(ConfigError::InvalidLimits);
            }
        }
        Ok(())
    }
}

/// Lock evaluation thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockThresholds {
    /// Peak |q| allowed over a window [V]
    pub q_lock_max: f32,
    /// Lower bound for d over a window [V]
    pub d_lock_min: f32,
    /// Upper bound for d over a window [V]
    pub d_lock_max: f32,
    /// Window length [samples]
    pub cycle_count: u32,
}

impl Default for LockThresholds {
    fn default() -> Self {
        Self {
            q_lock_max: pll::DEFAULT_Q_LOCK_MAX,
            d_lock_min: pll::DEFAULT_D_LOCK_MIN,
            d_lock_max: pll::DEFAULT_D_LOCK_MAX,
            cycle_count: pll::DEFAULT_CYCLE_COUNT,
        }
    }
}

impl LockThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_count == 0
            || !(self.q_lock_max > 0.0)
            || self.d_lock_min < 0.0
            || !(self.d_lock_min < self.d_lock_max)
        {
            return Err(ConfigError::InvalidLockThresholds);
        }
        Ok(())
    }
}

/// PLL parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PllConfig {
    pub pi: PiConfig,
    pub thresholds: LockThresholds,
    /// Moving-average window for d and q [samples]
    pub filter_window: usize,
    /// Park convention used to project the grid voltage
    pub park: ParkType,
    /// Precomputed trig (production) or per-call sin/cos
    pub trig_mode: TrigMode,
    /// Frequency the tracked angle free-runs at before any correction [Hz]
    pub nominal_frequency: f32,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            pi: PiConfig {
                kp: pll::DEFAULT_KP,
                ki: pll::DEFAULT_KI,
                dt: DEFAULT_SAMPLE_PERIOD,
                limit: Some((-pll::DEFAULT_SHIFT_LIMIT, pll::DEFAULT_SHIFT_LIMIT)),
            },
            thresholds: LockThresholds::default(),
            filter_window: pll::DEFAULT_FILTER_WINDOW,
            park: ParkType::Sine,
            trig_mode: TrigMode::Precomputed,
            nominal_frequency: DEFAULT_GRID_FREQUENCY,
        }
    }
}

impl PllConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pi.validate()?;
        self.thresholds.validate()?;
        if self.filter_window == 0 {
            return Err(ConfigError::EmptyFilterWindow);
        }
        if !(self.nominal_frequency >= 0.0) || !self.nominal_frequency.is_finite() {
            return Err(ConfigError::InvalidNominalFrequency);
        }
        Ok(())
    }
}

/// Grid-tie converter parameters (both basic and current-controlled modes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTieConfig {
    pub pll: PllConfig,
    /// Active current loop
    pub d_axis: PiConfig,
    /// Reactive current loop (target 0)
    pub q_axis: PiConfig,
    /// Active current reference [A]
    pub i_ref: f32,
    /// Add the measured grid DQ voltage to the current loop output
    pub voltage_feedforward: bool,
}

impl Default for GridTieConfig {
    fn default() -> Self {
        let current_pi = PiConfig {
            kp: current::DEFAULT_KP,
            ki: current::DEFAULT_KI,
            dt: DEFAULT_SAMPLE_PERIOD,
            limit: Some((
                -current::DEFAULT_VOLTAGE_LIMIT,
                current::DEFAULT_VOLTAGE_LIMIT,
            )),
        };
        Self {
            pll: PllConfig::default(),
            d_axis: current_pi,
            q_axis: current_pi,
            i_ref: current::DEFAULT_I_REF,
            voltage_feedforward: true,
        }
    }
}

impl GridTieConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pll.validate()?;
        self.d_axis.validate()?;
        self.q_axis.validate()
    }
}

/// Open-loop V/f parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenLoopConfig {
    /// Frequency at which `nominal_modulation_index` is reached [Hz]
    pub nominal_freq: f32,
    pub nominal_modulation_index: f32,
    /// Requested output frequency [Hz]
    pub req_freq: f32,
    /// Multiplicative frequency step per cycle (> 1)
    pub acceleration: f32,
    /// Frequency at start and after reset [Hz]
    pub start_freq: f32,
    /// PWM (control cycle) frequency [Hz]
    pub pwm_freq: f32,
}

impl Default for OpenLoopConfig {
    fn default() -> Self {
        Self {
            nominal_freq: open_loop::DEFAULT_NOMINAL_FREQ,
            nominal_modulation_index: open_loop::DEFAULT_NOMINAL_MODULATION_INDEX,
            req_freq: open_loop::DEFAULT_REQ_FREQ,
            acceleration: open_loop::DEFAULT_ACCELERATION,
            start_freq: open_loop::DEFAULT_START_FREQ,
            pwm_freq: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl OpenLoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pwm_freq > 0.0) {
            return Err(ConfigError::NonPositiveSampleRate);
        }
        if !(self.nominal_freq > 0.0)
            || !(self.start_freq > 0.0)
            || self.req_freq < 0.0
            || !(self.acceleration > 1.0)
            || !(0.0..=1.0).contains(&self.nominal_modulation_index)
        {
            return Err(ConfigError::InvalidOpenLoopParams);
        }
        Ok(())
    }
}

/// DC-link supervision parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcLinkConfig {
    /// First-order low-pass coefficient in (0, 1]
    pub filter_alpha: f32,
    /// Over-voltage trip [V]
    pub overvoltage: f32,
    /// Under-voltage trip [V]
    pub undervoltage: f32,
}

impl Default for DcLinkConfig {
    fn default() -> Self {
        Self {
            filter_alpha: dc_link::DEFAULT_FILTER_ALPHA,
            overvoltage: dc_link::DEFAULT_OVERVOLTAGE,
            undervoltage: dc_link::DEFAULT_UNDERVOLTAGE,
        }
    }
}

impl DcLinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.filter_alpha > 0.0 && self.filter_alpha <= 1.0)
            || !(self.undervoltage < self.overvoltage)
        {
            return Err(ConfigError::InvalidDcLinkThresholds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(GridTieConfig::default().validate(), Ok(()));
        assert_eq!(OpenLoopConfig::default().validate(), Ok(()));
        assert_eq!(DcLinkConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_pi_time_step_must_be_positive() {
        let mut pi = PllConfig::default().pi;
        pi.dt = 0.0;
        assert_eq!(pi.validate(), Err(ConfigError::NonPositiveTimeStep));
        pi.dt = -1.0e-5;
        assert_eq!(pi.validate(), Err(ConfigError::NonPositiveTimeStep));
        pi.dt = f32::NAN;
        assert_eq!(pi.validate(), Err(ConfigError::NonPositiveTimeStep));
    }

    #[test]
    fn test_inverted_limits_rejected() {
        let mut pi = PllConfig::default().pi;
        pi.limit = Some((1.0, -1.0));
        assert_eq!(pi.validate(), Err(ConfigError::InvalidLimits));
    }

    #[test]
    fn test_lock_band_checked() {
        let mut cfg = PllConfig::default();
        cfg.thresholds.d_lock_min = 700.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidLockThresholds));

        let mut cfg = PllConfig::default();
        cfg.thresholds.cycle_count = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidLockThresholds));

        let mut cfg = PllConfig::default();
        cfg.filter_window = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyFilterWindow));
    }

    #[test]
    fn test_open_loop_acceleration_must_exceed_one() {
        let cfg = OpenLoopConfig {
            acceleration: 1.0,
            ..OpenLoopConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidOpenLoopParams));
    }
}
