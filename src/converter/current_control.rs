// Grid-tie current control
//
// The PLL supplies the frame. Measured currents are projected at the angle the
// grid sample was taken at; the d loop tracks `i_ref` (active current), the q
// loop holds zero (unity power factor). The dq voltage command is limited to
// the linear SVPWM range and rotated to the tracked angle for the next period.

use super::basic_grid_tie::modulation_index;
use super::{ControlMode, ControlSnapshot, Converter, Duties, GridRelay, Measurements, RelayGate};
use crate::config::{ConfigError, GridTieConfig};
use crate::control::pi_compensator::PiCompensator;
use crate::control::pll::{PllLock, PllStatus};
use crate::control::svpwm::calculate_svpwm;
use crate::control::transforms::{limit_voltage, Coordinates, Dq0, Source, SQRT3};

#[derive(Debug, Clone)]
pub struct GridTieCurrentControl {
    pll: PllLock,
    d_axis: PiCompensator,
    q_axis: PiCompensator,
    voltage: Coordinates,
    current: Coordinates,
    command: Coordinates,
    relay: RelayGate,
    /// Active current reference [A]
    i_ref: f32,
    voltage_feedforward: bool,
    duties: Duties,
    vdc: f32,
}

impl GridTieCurrentControl {
    pub fn new(config: &GridTieConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pll: PllLock::new(&config.pll)?,
            d_axis: PiCompensator::new(&config.d_axis)?,
            q_axis: PiCompensator::new(&config.q_axis)?,
            voltage: Coordinates::default(),
            current: Coordinates::default(),
            command: Coordinates::default(),
            relay: RelayGate::default(),
            i_ref: config.i_ref,
            voltage_feedforward: config.voltage_feedforward,
            duties: Duties::NEUTRAL,
            vdc: 0.0,
        })
    }

    /// Set the active current reference [A]
    pub fn set_current_reference(&mut self, i_ref: f32) {
        self.i_ref = i_ref;
    }

    pub fn current_reference(&self) -> f32 {
        self.i_ref
    }

    /// Update both current loop gains
    pub fn set_current_gains(&mut self, kp: f32, ki: f32) {
        self.d_axis.set_gains(kp, ki);
        self.q_axis.set_gains(kp, ki);
    }

    pub fn pll(&self) -> &PllLock {
        &self.pll
    }

    pub fn d_axis(&self) -> &PiCompensator {
        &self.d_axis
    }

    pub fn q_axis(&self) -> &PiCompensator {
        &self.q_axis
    }

    /// Measured current in the tracked frame
    pub fn current_dq(&self) -> Dq0 {
        self.current.dq0
    }

    /// Last voltage command (all three frames)
    pub fn command(&self) -> &Coordinates {
        &self.command
    }

    fn park_outputs(&mut self) -> Duties {
        self.d_axis.reset();
        self.q_axis.reset();
        self.command = Coordinates::default();
        self.duties = Duties::NEUTRAL;
        self.duties
    }
}

impl Converter for GridTieCurrentControl {
    fn mode(&self) -> ControlMode {
        ControlMode::CurrentControl
    }

    fn step(&mut self, measurements: &Measurements, relay: &mut dyn GridRelay) -> Duties {
        self.vdc = measurements.vdc;
        self.voltage.abc = measurements.voltage;
        let status = self.pll.lock_grid(&mut self.voltage);
        self.relay.follow(&self.pll, relay);

        let park = self.pll.park();
        let trig_mode = self.pll.trig_mode();

        self.current.abc = measurements.current;
        self.current
            .refresh_with(Source::Abc, self.pll.sample_trig(), park, trig_mode);

        if status != PllStatus::Locked {
            return self.park_outputs();
        }

        let i = self.current.dq0;
        let mut v_d = self.d_axis.compensate(self.i_ref - i.d);
        let mut v_q = self.q_axis.compensate(-i.q);

        if self.voltage_feedforward {
            let grid = self.pll.filtered_dq();
            v_d += grid.d;
            v_q += grid.q;
        }

        let (v_d, v_q) = limit_voltage(v_d, v_q, measurements.vdc.max(0.0) / SQRT3);
        self.command.dq0 = Dq0 {
            d: v_d,
            q: v_q,
            zero: 0.0,
        };
        self.command
            .refresh_with(Source::Dq0, self.pll.trig(), park, trig_mode);

        self.duties = calculate_svpwm(&self.command.alpha_beta0, measurements.vdc);
        self.duties
    }

    fn reset(&mut self, relay: &mut dyn GridRelay) {
        self.pll.reset();
        self.relay.open(relay);
        self.voltage = Coordinates::default();
        self.current = Coordinates::default();
        self.park_outputs();
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
            current_dq: self.current.dq0,
            modulation_index: modulation_index(magnitude, self.vdc),
            duties: self.duties,
            relay_closed: self.relay.is_closed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::DEFAULT_SAMPLE_PERIOD;
    use crate::control::transforms::ThreePhase;

    /// Series R-L filter between the inverter legs and the grid
    struct GridFilter {
        current: ThreePhase,
        inductance: f32,
        resistance: f32,
    }

    impl GridFilter {
        fn new() -> Self {
            Self {
                current: ThreePhase::default(),
                inductance: 5e-3,
                resistance: 0.1,
            }
        }

        /// Integrate one period; the current is zero while disconnected
        fn advance(&mut self, duties: &Duties, grid: &ThreePhase, connected: bool) {
            if !connected {
                self.current = ThreePhase::default();
                return;
            }
            let mean = (duties.a + duties.b + duties.c) / 3.0;
            let k = DEFAULT_SAMPLE_PERIOD / self.inductance;
            let r = self.resistance;
            let i = &mut self.current;
            i.a += k * (V_DC * (duties.a - mean) - grid.a - r * i.a);
            i.b += k * (V_DC * (duties.b - mean) - grid.b - r * i.b);
            i.c += k * (V_DC * (duties.c - mean) - grid.c - r * i.c);
        }
    }

    fn run(conv: &mut GridTieCurrentControl, relay: &mut MockRelay, samples: u32) {
        let mut filter = GridFilter::new();
        for k in 0..samples {
            let grid = grid_voltage(k, PEAK);
            let measurements = Measurements {
                voltage: grid,
                current: filter.current,
                vdc: V_DC,
            };
            let duties = conv.step(&measurements, relay);
            filter.advance(&duties, &grid, relay.closed);
        }
    }

    fn config(i_ref: f32, voltage_feedforward: bool) -> GridTieConfig {
        GridTieConfig {
            i_ref,
            voltage_feedforward,
            ..GridTieConfig::default()
        }
    }

    #[test]
    fn test_regulates_active_current() {
        let mut conv = GridTieCurrentControl::new(&config(10.0, true)).unwrap();
        let mut relay = MockRelay::default();
        run(&mut conv, &mut relay, 8000);

        assert!(conv.pll().is_locked());
        assert_eq!(relay.toggles, 1);
        let i = conv.current_dq();
        assert!((i.d - 10.0).abs() < 0.2, "i_d = {}", i.d);
        assert!(i.q.abs() < 0.2, "i_q = {}", i.q);
    }

    #[test]
    fn test_regulates_without_feedforward() {
        // The integrators have to build up the grid voltage themselves
        let mut conv = GridTieCurrentControl::new(&config(10.0, false)).unwrap();
        let mut relay = MockRelay::default();
        run(&mut conv, &mut relay, 8000);

        let i = conv.current_dq();
        assert!((i.d - 10.0).abs() < 0.2, "i_d = {}", i.d);
        assert!(i.q.abs() < 0.2, "i_q = {}", i.q);
        assert!((conv.d_axis().integral() - PEAK).abs() < 10.0);
    }

    #[test]
    fn test_absorbs_current() {
        let mut conv = GridTieCurrentControl::new(&config(-5.0, true)).unwrap();
        let mut relay = MockRelay::default();
        run(&mut conv, &mut relay, 8000);

        let i = conv.current_dq();
        assert!((i.d + 5.0).abs() < 0.2, "i_d = {}", i.d);
        assert!(i.q.abs() < 0.2, "i_q = {}", i.q);
    }

    #[test]
    fn test_integrators_held_at_zero_while_unlocked() {
        let mut conv = GridTieCurrentControl::new(&config(10.0, true)).unwrap();
        let mut relay = MockRelay::default();
        for k in 0..400 {
            let measurements = Measurements {
                voltage: grid_voltage(k, PEAK),
                // Stray current reading must not wind up the loops
                current: ThreePhase::new(3.0, -1.5, -1.5),
                vdc: V_DC,
            };
            let duties = conv.step(&measurements, &mut relay);
            assert_eq!(duties, Duties::NEUTRAL);
        }
        assert_eq!(conv.d_axis().integral(), 0.0);
        assert_eq!(conv.q_axis().integral(), 0.0);
        assert!(!relay.closed);
    }

    #[test]
    fn test_command_limited_to_linear_range() {
        let mut conv = GridTieCurrentControl::new(&config(10.0, true)).unwrap();
        let mut relay = MockRelay::default();
        let mut filter = GridFilter::new();
        for k in 0..3000 {
            let grid = grid_voltage(k, PEAK);
            let measurements = Measurements {
                voltage: grid,
                current: filter.current,
                vdc: V_DC,
            };
            let duties = conv.step(&measurements, &mut relay);
            filter.advance(&duties, &grid, relay.closed);
        }
        assert!(conv.pll().is_locked());

        // DC link sagging below the grid peak forces the limit
        let low_vdc = 400.0;
        let measurements = Measurements {
            voltage: grid_voltage(3000, PEAK),
            current: filter.current,
            vdc: low_vdc,
        };
        let duties = conv.step(&measurements, &mut relay);
        let command = conv.command().dq0;
        let magnitude = libm::sqrtf(command.d * command.d + command.q * command.q);
        assert!(magnitude <= low_vdc / SQRT3 + 0.01);
        assert!(duties.as_array().iter().all(|d| (0.0..=1.0).contains(d)));
    }

    #[test]
    fn test_reset_clears_loops_and_opens_relay() {
        let mut conv = GridTieCurrentControl::new(&config(10.0, true)).unwrap();
        let mut relay = MockRelay::default();
        run(&mut conv, &mut relay, 4000);
        assert!(relay.closed);

        conv.reset(&mut relay);
        assert!(!relay.closed);
        assert_eq!(conv.d_axis().integral(), 0.0);
        assert_eq!(conv.q_axis().integral(), 0.0);
        let snapshot = conv.snapshot();
        assert_eq!(snapshot.mode, ControlMode::CurrentControl);
        assert_eq!(snapshot.pll_status, Some(PllStatus::Invalid));
        assert_eq!(snapshot.duties, Duties::NEUTRAL);
        assert_eq!(conv.current_reference(), 10.0);
    }

    #[test]
    fn test_run_cycle_writes_bridge() {
        let mut conv = GridTieCurrentControl::new(&config(0.0, true)).unwrap();
        let mut relay = MockRelay::default();
        let mut bridge = MockBridge::default();
        let duties = conv.run_cycle(&grid_sample(0, PEAK), &mut bridge, &mut relay);
        assert_eq!(bridge.writes, 1);
        assert_eq!(bridge.last, Some(duties));
    }
}
