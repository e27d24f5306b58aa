//! DC-link voltage supervision
//!
//! Low-pass filters the measured DC-link voltage and flags over- and
//! under-voltage against the configured thresholds.

use crate::config::{ConfigError, DcLinkConfig};

/// Filtered DC-link voltage and fault flags
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DcLinkState {
    /// Filtered voltage [V]
    pub voltage: f32,
    pub overvoltage: bool,
    pub undervoltage: bool,
}

impl DcLinkState {
    pub const fn new() -> Self {
        Self {
            voltage: 0.0,
            overvoltage: false,
            undervoltage: false,
        }
    }

    /// Voltage inside the operating band
    pub fn is_voltage_ok(&self) -> bool {
        !self.overvoltage && !self.undervoltage
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcLinkMonitor {
    config: DcLinkConfig,
    state: DcLinkState,
}

impl DcLinkMonitor {
    pub fn new(config: &DcLinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: *config,
            state: DcLinkState::new(),
        })
    }

    /// Seed the filter with a first reading
    ///
    /// Starting from 0 V would report under-voltage until the filter has
    /// caught up with the real link voltage.
    pub fn initialize(&mut self, vdc: f32) -> DcLinkState {
        self.state.voltage = vdc;
        self.classify();
        self.state
    }

    /// Filter one reading and re-evaluate the fault flags
    ///
    /// filtered = α·raw + (1 - α)·filtered_prev
    pub fn update(&mut self, vdc: f32) -> DcLinkState {
        let alpha = self.config.filter_alpha;
        self.state.voltage = alpha * vdc + (1.0 - alpha) * self.state.voltage;

        let previous = self.state;
        self.classify();

        if self.state.overvoltage && !previous.overvoltage {
            error!(
                "DC-link overvoltage: {}V (threshold: {}V)",
                self.state.voltage, self.config.overvoltage
            );
        }
        if self.state.undervoltage && !previous.undervoltage {
            error!(
                "DC-link undervoltage: {}V (threshold: {}V)",
                self.state.voltage, self.config.undervoltage
            );
        }
        if self.state.is_voltage_ok() && !previous.is_voltage_ok() {
            info!("DC-link voltage back in range: {}V", self.state.voltage);
        }

        self.state
    }

    fn classify(&mut self) {
        self.state.overvoltage = self.state.voltage > self.config.overvoltage;
        self.state.undervoltage = self.state.voltage < self.config.undervoltage;
    }

    pub fn state(&self) -> DcLinkState {
        self.state
    }

    /// Filtered voltage [V]
    pub fn voltage(&self) -> f32 {
        self.state.voltage
    }

    pub fn set_thresholds(&mut self, overvoltage: f32, undervoltage: f32) -> Result<(), ConfigError> {
        let config = DcLinkConfig {
            overvoltage,
            undervoltage,
            ..self.config
        };
        config.validate()?;
        self.config = config;
        info!(
            "DC-link thresholds updated: OV={}V, UV={}V",
            overvoltage, undervoltage
        );
        Ok(())
    }

    /// Clear the filter state
    pub fn reset(&mut self) {
        self.state = DcLinkState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_V_DC_LINK;

    const EPSILON: f32 = 0.001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn monitor() -> DcLinkMonitor {
        DcLinkMonitor::new(&DcLinkConfig::default()).unwrap()
    }

    #[test]
    fn test_first_order_filter() {
        let mut monitor = monitor();
        monitor.initialize(DEFAULT_V_DC_LINK);
        let state = monitor.update(600.0);
        // 0.1 * 600 + 0.9 * 700
        assert!(approx_eq(state.voltage, 690.0));
        assert!(state.is_voltage_ok());
    }

    #[test]
    fn test_cold_start_reports_undervoltage() {
        let mut monitor = monitor();
        let state = monitor.update(DEFAULT_V_DC_LINK);
        assert!(approx_eq(state.voltage, 70.0));
        assert!(state.undervoltage);
    }

    #[test]
    fn test_initialize_avoids_spurious_undervoltage() {
        let mut monitor = monitor();
        let state = monitor.initialize(DEFAULT_V_DC_LINK);
        assert!(state.is_voltage_ok());
        assert!(monitor.update(DEFAULT_V_DC_LINK).is_voltage_ok());
    }

    #[test]
    fn test_overvoltage_trip_and_recovery() {
        let mut monitor = monitor();
        monitor.initialize(DEFAULT_V_DC_LINK);
        let mut tripped = false;
        for _ in 0..100 {
            tripped |= monitor.update(900.0).overvoltage;
        }
        assert!(tripped);
        assert!((monitor.voltage() - 900.0).abs() < 0.1);

        for _ in 0..100 {
            monitor.update(DEFAULT_V_DC_LINK);
        }
        assert!(monitor.state().is_voltage_ok());
    }

    #[test]
    fn test_undervoltage_trip() {
        let mut monitor = monitor();
        monitor.initialize(DEFAULT_V_DC_LINK);
        for _ in 0..100 {
            monitor.update(300.0);
        }
        let state = monitor.state();
        assert!(state.undervoltage);
        assert!(!state.overvoltage);
    }

    #[test]
    fn test_threshold_update_validates() {
        let mut monitor = monitor();
        assert_eq!(
            monitor.set_thresholds(400.0, 500.0),
            Err(ConfigError::InvalidDcLinkThresholds)
        );
        assert_eq!(monitor.set_thresholds(750.0, 500.0), Ok(()));
        assert!(monitor.initialize(760.0).overvoltage);
    }

    #[test]
    fn test_reset() {
        let mut monitor = monitor();
        monitor.initialize(DEFAULT_V_DC_LINK);
        monitor.reset();
        assert_eq!(monitor.state(), DcLinkState::new());
    }
}
