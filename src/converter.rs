// Converter orchestration
// One call per PWM period: measurements in, three leg duties out

pub mod basic_grid_tie;
pub mod current_control;
pub mod open_loop_vf;

use crate::control::pll::{PllLock, PllStatus};
use crate::control::transforms::{Dq0, ThreePhase};

pub use crate::control::svpwm::Duties;
pub use basic_grid_tie::BasicGridTie;
pub use current_control::GridTieCurrentControl;
pub use open_loop_vf::OpenLoopVf;

/// Calibrated per-cycle inputs from the ADC front-end
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurements {
    /// Grid phase voltages [V]
    pub voltage: ThreePhase,
    /// Injected phase currents [A]
    pub current: ThreePhase,
    /// DC-link voltage [V]
    pub vdc: f32,
}

/// Inverter bridge that accepts one duty per leg
pub trait PwmLegs {
    fn set_duties(&mut self, duties: &Duties);
}

/// Digital output driving the grid connection relay
pub trait GridRelay {
    /// `true` closes the relay (connects to the grid)
    fn set_grid_relay(&mut self, closed: bool);
}

/// Converter operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// Grid-synchronised voltage feedforward
    BasicGridTie,
    /// Grid-synchronised dq current regulation
    CurrentControl,
    /// Free-running V/f ramp, no grid synchronisation
    OpenLoopVf,
}

/// Copy of the converter state for telemetry and other tasks
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlSnapshot {
    pub mode: ControlMode,
    /// `None` in open-loop mode
    pub pll_status: Option<PllStatus>,
    /// Output angle [rad]
    pub theta: f32,
    /// Output or tracked grid frequency [Hz]
    pub frequency: f32,
    /// Filtered grid voltage in the tracked frame [V]
    pub grid_dq: Dq0,
    /// Measured current in the tracked frame [A]
    pub current_dq: Dq0,
    pub modulation_index: f32,
    pub duties: Duties,
    pub relay_closed: bool,
}

/// Common per-cycle interface of the orchestrators
pub trait Converter {
    fn mode(&self) -> ControlMode;

    /// Run one control pass and return the leg duties
    fn step(&mut self, measurements: &Measurements, relay: &mut dyn GridRelay) -> Duties;

    /// Back to the start-up state; the relay is opened if it was closed
    fn reset(&mut self, relay: &mut dyn GridRelay);

    fn snapshot(&self) -> ControlSnapshot;

    /// `step()` and hand the duties to the bridge
    fn run_cycle(
        &mut self,
        measurements: &Measurements,
        pwm: &mut dyn PwmLegs,
        relay: &mut dyn GridRelay,
    ) -> Duties {
        let duties = self.step(measurements, relay);
        pwm.set_duties(&duties);
        duties
    }
}

/// Relay state that only changes when the PLL enters or leaves `Locked`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct RelayGate {
    closed: bool,
}

impl RelayGate {
    pub(crate) fn follow(&mut self, pll: &PllLock, relay: &mut dyn GridRelay) {
        if !pll.status_changed() {
            return;
        }
        let locked = pll.is_locked();
        if locked != self.closed {
            info!("Grid relay {}", if locked { "closed" } else { "opened" });
            relay.set_grid_relay(locked);
            self.closed = locked;
        }
    }

    pub(crate) fn open(&mut self, relay: &mut dyn GridRelay) {
        if self.closed {
            info!("Grid relay opened");
            relay.set_grid_relay(false);
            self.closed = false;
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{DEFAULT_SAMPLE_RATE, DEFAULT_V_DC_LINK};
    use crate::control::transforms::PHASE_SHIFT;
    use core::f32::consts::TAU;
    use libm::sinf;

    pub const PEAK: f32 = 325.0;
    pub const V_DC: f32 = DEFAULT_V_DC_LINK;

    /// Relay mock recording every command
    #[derive(Debug, Default)]
    pub struct MockRelay {
        pub closed: bool,
        pub toggles: u32,
    }

    impl GridRelay for MockRelay {
        fn set_grid_relay(&mut self, closed: bool) {
            self.closed = closed;
            self.toggles += 1;
        }
    }

    #[derive(Debug, Default)]
    pub struct MockBridge {
        pub last: Option<Duties>,
        pub writes: u32,
    }

    impl PwmLegs for MockBridge {
        fn set_duties(&mut self, duties: &Duties) {
            self.last = Some(*duties);
            self.writes += 1;
        }
    }

    /// Balanced 50 Hz grid voltage at sample `k`
    pub fn grid_voltage(k: u32, peak: f32) -> ThreePhase {
        let angle = TAU * 50.0 * k as f32 / DEFAULT_SAMPLE_RATE;
        ThreePhase::new(
            peak * sinf(angle),
            peak * sinf(angle - PHASE_SHIFT),
            peak * sinf(angle + PHASE_SHIFT),
        )
    }

    pub fn grid_sample(k: u32, peak: f32) -> Measurements {
        Measurements {
            voltage: grid_voltage(k, peak),
            current: ThreePhase::default(),
            vdc: V_DC,
        }
    }
}
