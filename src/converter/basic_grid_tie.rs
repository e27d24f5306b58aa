// Basic grid-tie: PLL-gated voltage feedforward through SVPWM

use super::{ControlMode, ControlSnapshot, Converter, Duties, GridRelay, Measurements, RelayGate};
use crate::config::{ConfigError, PllConfig};
use crate::control::pll::{PllLock, PllStatus};
use crate::control::svpwm::calculate_svpwm;
use crate::control::transforms::{Coordinates, Dq0, Source, SQRT3};

/// Grid-synchronised inverter reproducing the measured grid voltage
///
/// While the PLL is not locked the legs sit at neutral duty. Once locked, the
/// filtered grid voltage is rotated to the tracked angle and modulated.
#[derive(Debug, Clone)]
pub struct BasicGridTie {
    pll: PllLock,
    /// Grid voltage, refreshed by the PLL
    voltage: Coordinates,
    /// Voltage command
    command: Coordinates,
    relay: RelayGate,
    duties: Duties,
    vdc: f32,
}

impl BasicGridTie {
    pub fn new(config: &PllConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pll: PllLock::new(config)?,
            voltage: Coordinates::default(),
            command: Coordinates::default(),
            relay: RelayGate::default(),
            duties: Duties::NEUTRAL,
            vdc: 0.0,
        })
    }

    pub fn pll(&self) -> &PllLock {
        &self.pll
    }

    /// Last voltage command (all three frames)
    pub fn command(&self) -> &Coordinates {
        &self.command
    }
}

impl Converter for BasicGridTie {
    fn mode(&self) -> ControlMode {
        ControlMode::BasicGridTie
    }

    fn step(&mut self, measurements: &Measurements, relay: &mut dyn GridRelay) -> Duties {
        self.vdc = measurements.vdc;
        self.voltage.abc = measurements.voltage;
        let status = self.pll.lock_grid(&mut self.voltage);
        self.relay.follow(&self.pll, relay);

        if status != PllStatus::Locked {
            self.command = Coordinates::default();
            self.duties = Duties::NEUTRAL;
            return self.duties;
        }

        let grid = self.pll.filtered_dq();
        self.command.dq0 = Dq0 {
            d: grid.d,
            q: grid.q,
            zero: 0.0,
        };
        self.command.refresh_with(
            Source::Dq0,
            self.pll.trig(),
            self.pll.park(),
            self.pll.trig_mode(),
        );
        self.duties = calculate_svpwm(&self.command.alpha_beta0, measurements.vdc);
        self.duties
    }

    fn reset(&mut self, relay: &mut dyn GridRelay) {
        self.pll.reset();
        self.relay.open(relay);
        self.voltage = Coordinates::default();
        self.command = Coordinates::default();
        self.duties = Duties::NEUTRAL;
    }

    fn snapshot(&self) -> ControlSnapshot {
        let command = self.command.dq0;
        let magnitude = libm::sqrtf(command.d * command.d + command.q * command.q);
        ControlSnapshot {
            mode: self.mode(),
            pll_status: Some(self.pll.status()),
            theta: self.pll.theta(),
            frequency: self.pll.frequency(),
            grid_dq: self.pll.filtered_dq(),
            current_dq: Dq0::default(),
            modulation_index: modulation_index(magnitude, self.vdc),
            duties: self.duties,
            relay_closed: self.relay.is_closed(),
        }
    }
}

/// Phase amplitude relative to the linear SVPWM limit Vdc/√3
pub(crate) fn modulation_index(magnitude: f32, vdc: f32) -> f32 {
    if vdc > 0.0 {
        magnitude * SQRT3 / vdc
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn converter() -> BasicGridTie {
        BasicGridTie::new(&PllConfig::default()).unwrap()
    }

    #[test]
    fn test_neutral_until_locked() {
        let mut conv = converter();
        let mut relay = MockRelay::default();

        let mut k = 0;
        while !conv.pll().is_locked() {
            let duties = conv.step(&grid_sample(k, PEAK), &mut relay);
            if !conv.pll().is_locked() {
                assert_eq!(duties, Duties::NEUTRAL);
                assert!(!relay.closed);
            }
            k += 1;
            assert!(k < 5000, "PLL did not lock");
        }
        assert!(relay.closed);
        assert_eq!(relay.toggles, 1);
    }

    #[test]
    fn test_locked_output_follows_grid() {
        let mut conv = converter();
        let mut relay = MockRelay::default();
        for k in 0..6000 {
            conv.step(&grid_sample(k, PEAK), &mut relay);
        }
        assert!(conv.pll().is_locked());

        // Phase-A command tracks the next grid sample
        for k in 6000..6400 {
            let duties = conv.step(&grid_sample(k, PEAK), &mut relay);
            let expected = grid_voltage(k + 1, PEAK);
            assert!(
                (conv.command().abc.a - expected.a).abs() < 5.0,
                "sample {}: {} vs {}",
                k,
                conv.command().abc.a,
                expected.a
            );
            // Line voltage reproduced by the legs
            let vab = V_DC * (duties.a - duties.b);
            assert!((vab - (expected.a - expected.b)).abs() < 10.0);
        }
        assert_eq!(relay.toggles, 1);
    }

    #[test]
    fn test_dropout_opens_relay_and_parks_outputs() {
        let mut conv = converter();
        let mut relay = MockRelay::default();
        for k in 0..6000 {
            conv.step(&grid_sample(k, PEAK), &mut relay);
        }
        assert!(relay.closed);

        let mut duties = Duties::default();
        for k in 6000..6100 {
            duties = conv.step(&grid_sample(k, 0.0), &mut relay);
        }
        assert_eq!(conv.pll().status(), PllStatus::Invalid);
        assert!(!relay.closed);
        assert_eq!(relay.toggles, 2);
        assert_eq!(duties, Duties::NEUTRAL);
    }

    #[test]
    fn test_reset_and_snapshot() {
        let mut conv = converter();
        let mut relay = MockRelay::default();
        for k in 0..6000 {
            conv.step(&grid_sample(k, PEAK), &mut relay);
        }

        let snapshot = conv.snapshot();
        assert_eq!(snapshot.mode, ControlMode::BasicGridTie);
        assert_eq!(snapshot.pll_status, Some(PllStatus::Locked));
        assert!(snapshot.relay_closed);
        assert!((snapshot.frequency - 50.0).abs() < 0.1);
        assert!((snapshot.grid_dq.d - PEAK).abs() < 1.0);
        // 325 V against a 404 V linear limit
        assert!((snapshot.modulation_index - PEAK * SQRT3 / V_DC).abs() < 0.01);

        conv.reset(&mut relay);
        assert!(!relay.closed);
        assert_eq!(relay.toggles, 2);
        let snapshot = conv.snapshot();
        assert_eq!(snapshot.pll_status, Some(PllStatus::Invalid));
        assert_eq!(snapshot.duties, Duties::NEUTRAL);
        assert!(!snapshot.relay_closed);
    }
}
