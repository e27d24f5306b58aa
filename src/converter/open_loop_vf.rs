// Open-loop V/f drive
//
// Frequency ramps multiplicatively toward the request, modulation index is
// proportional to frequency and the output angle free-runs at 2π·f/f_pwm per
// cycle. No PLL and no feedback.

use core::f32::consts::TAU;

use super::{ControlMode, ControlSnapshot, Converter, Duties, GridRelay, Measurements};
use crate::config::{ConfigError, OpenLoopConfig};
use crate::control::svpwm::calculate_spwm;
use crate::control::transforms::{normalize_angle, Dq0};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenLoopVf {
    config: OpenLoopConfig,
    /// Present output frequency [Hz]
    freq: f32,
    /// Target of the ramp [Hz]
    req_freq: f32,
    /// Output angle of phase A [rad]
    theta: f32,
    modulation_index: f32,
    duties: Duties,
}

impl OpenLoopVf {
    pub fn new(config: &OpenLoopConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: *config,
            freq: config.start_freq,
            req_freq: config.req_freq,
            theta: 0.0,
            modulation_index: 0.0,
            duties: Duties::NEUTRAL,
        })
    }

    /// Change the ramp target [Hz]
    pub fn set_requested_frequency(&mut self, freq: f32) -> Result<(), ConfigError> {
        if !(freq >= 0.0) || !freq.is_finite() {
            return Err(ConfigError::InvalidOpenLoopParams);
        }
        if freq != self.req_freq {
            debug!("V/f target {} Hz -> {} Hz", self.req_freq, freq);
        }
        self.req_freq = freq;
        Ok(())
    }

    pub fn requested_frequency(&self) -> f32 {
        self.req_freq
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }

    pub fn theta(&self) -> f32 {
        self.theta
    }

    pub fn modulation_index(&self) -> f32 {
        self.modulation_index
    }

    /// True once the ramp has arrived at the requested frequency
    pub fn at_target(&self) -> bool {
        self.freq == self.req_freq
    }

    /// Advance the frequency ramp by one cycle, never passing the target
    fn ramp(&mut self) {
        let acceleration = self.config.acceleration;
        if self.freq < self.req_freq {
            self.freq = (self.freq * acceleration).min(self.req_freq);
        } else if self.freq > self.req_freq {
            self.freq = (self.freq / acceleration).max(self.req_freq);
        }
    }
}

impl Converter for OpenLoopVf {
    fn mode(&self) -> ControlMode {
        ControlMode::OpenLoopVf
    }

    fn step(&mut self, _measurements: &Measurements, _relay: &mut dyn GridRelay) -> Duties {
        self.ramp();

        let config = &self.config;
        self.modulation_index = (config.nominal_modulation_index * self.freq / config.nominal_freq)
            .clamp(0.0, 1.0);
        self.duties = calculate_spwm(self.theta, self.modulation_index);

        self.theta = normalize_angle(self.theta + TAU * self.freq / config.pwm_freq);
        self.duties
    }

    fn reset(&mut self, _relay: &mut dyn GridRelay) {
        self.freq = self.config.start_freq;
        self.theta = 0.0;
        self.modulation_index = 0.0;
        self.duties = Duties::NEUTRAL;
    }

    fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            mode: self.mode(),
            pll_status: None,
            theta: self.theta,
            frequency: self.freq,
            grid_dq: Dq0::default(),
            current_dq: Dq0::default(),
            modulation_index: self.modulation_index,
            duties: self.duties,
            relay_closed: false,
        }
    }
}
