// Grid phase-locked loop with lock supervision
//
// Per cycle: project the grid voltage into dq0 at the tracked angle, smooth
// d and q, drive the PI compensator with -q and advance the tracked angle by
// the nominal grid step minus its output. Lock status is evaluated over
// rolling windows of `cycle_count` samples.

use core::f32::consts::TAU;

use libm::fabsf;

use super::filters::MovingAverage;
use super::pi_compensator::PiCompensator;
use super::transforms::{normalize_angle, Coordinates, Dq0, ParkType, Source, TrigMode, Trigno};
use crate::config::{ConfigError, LockThresholds, PllConfig};

/// Backing buffer size for the d/q filters [samples]
pub const PLL_FILTER_CAPACITY: usize = 64;

/// Phase A counts as crossing zero when |Va| < filtered d / this divisor
const ZERO_CROSSING_DIVISOR: f32 = 40.0;

/// Mid-window loss-of-lock trips at this multiple of `q_lock_max`
const LOSS_OF_LOCK_Q_FACTOR: f32 = 2.0;

/// PLL lock status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllStatus {
    /// Not synchronised (initial state)
    Invalid,
    /// Window criteria met, waiting for a phase-A zero crossing
    Pending,
    /// Synchronised
    Locked,
}

/// Extremes of the filtered d/q over the current evaluation window
#[derive(Debug, Clone, Copy)]
struct LockWindow {
    count: u32,
    peak_q: f32,
    d_min: f32,
    d_max: f32,
}

impl LockWindow {
    const fn new() -> Self {
        Self {
            count: 0,
            peak_q: 0.0,
            d_min: f32::MAX,
            d_max: f32::MIN,
        }
    }

    fn accumulate(&mut self, d: f32, q: f32) {
        self.count += 1;
        self.peak_q = self.peak_q.max(fabsf(q));
        self.d_min = self.d_min.min(d);
        self.d_max = self.d_max.max(d);
    }

    fn within(&self, thresholds: &LockThresholds) -> bool {
        self.peak_q < thresholds.q_lock_max
            && self.d_min >= thresholds.d_lock_min
            && self.d_max <= thresholds.d_lock_max
    }
}

/// Grid synchronisation state machine
///
/// Owns the tracked angle; the voltage coordinates it projects are owned by
/// the caller and passed in every cycle.
#[derive(Debug, Clone)]
pub struct PllLock {
    compensator: PiCompensator,
    d_filter: MovingAverage<PLL_FILTER_CAPACITY>,
    q_filter: MovingAverage<PLL_FILTER_CAPACITY>,
    status: PllStatus,
    prev_status: PllStatus,
    thresholds: LockThresholds,
    window: LockWindow,
    park: ParkType,
    trig_mode: TrigMode,
    /// Angle the latest measurements were projected at
    sample_trig: Trigno,
    /// Tracked angle for the next cycle
    trig: Trigno,
    filtered: Dq0,
    dt: f32,
    nominal_frequency: f32,
    /// Angle advance per sample at the nominal frequency [rad]
    nominal_step: f32,
}

impl PllLock {
    pub fn new(config: &PllConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            compensator: PiCompensator::new(&config.pi)?,
            d_filter: MovingAverage::new(config.filter_window)?,
            q_filter: MovingAverage::new(config.filter_window)?,
            status: PllStatus::Invalid,
            prev_status: PllStatus::Invalid,
            thresholds: config.thresholds,
            window: LockWindow::new(),
            park: config.park,
            trig_mode: config.trig_mode,
            sample_trig: Trigno::new(0.0),
            trig: Trigno::new(0.0),
            filtered: Dq0::default(),
            dt: config.pi.dt,
            nominal_frequency: config.nominal_frequency,
            nominal_step: TAU * config.nominal_frequency * config.pi.dt,
        })
    }

    /// Run one PLL cycle
    ///
    /// `coords.abc` must hold this cycle's grid voltage; αβ0 and dq0 are
    /// refreshed in place at the tracked angle.
    pub fn lock_grid(&mut self, coords: &mut Coordinates) -> PllStatus {
        self.sample_trig = self.trig;
        coords.refresh_with(Source::Abc, &self.sample_trig, self.park, self.trig_mode);

        let q = self.q_filter.compute(coords.dq0.q);
        let d = self.d_filter.compute(coords.dq0.d);
        self.filtered = Dq0 {
            d,
            q,
            zero: coords.dq0.zero,
        };

        let theta_shift = self.compensator.compensate(-q);
        self.trig = Trigno::new(normalize_angle(
            self.trig.angle + self.nominal_step - theta_shift,
        ));

        self.evaluate_lock(coords.abc.a, d, q);
        self.status
    }

    fn evaluate_lock(&mut self, va: f32, d: f32, q: f32) {
        self.prev_status = self.status;
        let thresholds = self.thresholds;
        self.window.accumulate(d, q);

        if self.status == PllStatus::Locked
            && (fabsf(q) > LOSS_OF_LOCK_Q_FACTOR * thresholds.q_lock_max
                || d < thresholds.d_lock_min
                || d > thresholds.d_lock_max)
        {
            warn!("PLL lock lost: d={}, q={}", d, q);
            self.status = PllStatus::Invalid;
            self.window = LockWindow::new();
            return;
        }

        if self.window.count >= thresholds.cycle_count {
            if self.window.within(&thresholds) {
                if self.status == PllStatus::Invalid {
                    self.status = PllStatus::Pending;
                }
            } else {
                self.status = PllStatus::Invalid;
            }
            self.window = LockWindow::new();
        }

        if self.status == PllStatus::Pending && fabsf(va) < d / ZERO_CROSSING_DIVISOR {
            self.status = PllStatus::Locked;
        }

        if self.status != self.prev_status {
            info!("PLL status {:?} -> {:?}", self.prev_status, self.status);
        }
    }

    /// Back to the start-up state: angle 0, filters and integral cleared
    pub fn reset(&mut self) {
        self.compensator.reset();
        self.d_filter.reset();
        self.q_filter.reset();
        self.status = PllStatus::Invalid;
        self.prev_status = PllStatus::Invalid;
        self.window = LockWindow::new();
        self.sample_trig = Trigno::new(0.0);
        self.trig = Trigno::new(0.0);
        self.filtered = Dq0::default();
    }

    pub fn status(&self) -> PllStatus {
        self.status
    }

    /// Status before the most recent `lock_grid()`
    pub fn previous_status(&self) -> PllStatus {
        self.prev_status
    }

    /// True when the most recent `lock_grid()` changed the status
    pub fn status_changed(&self) -> bool {
        self.status != self.prev_status
    }

    pub fn is_locked(&self) -> bool {
        self.status == PllStatus::Locked
    }

    /// Tracked angle for the next cycle [rad]
    pub fn theta(&self) -> f32 {
        self.trig.angle
    }

    /// Trig values of the tracked angle for the next cycle
    pub fn trig(&self) -> &Trigno {
        &self.trig
    }

    /// Trig values the latest measurements were projected with
    pub fn sample_trig(&self) -> &Trigno {
        &self.sample_trig
    }

    pub fn park(&self) -> ParkType {
        self.park
    }

    pub fn trig_mode(&self) -> TrigMode {
        self.trig_mode
    }

    /// Filtered grid voltage in the tracked frame
    pub fn filtered_dq(&self) -> Dq0 {
        self.filtered
    }

    /// Estimated grid frequency [Hz] from the per-sample angle step
    pub fn frequency(&self) -> f32 {
        self.nominal_frequency - self.compensator.output() / (TAU * self.dt)
    }

    pub fn nominal_frequency(&self) -> f32 {
        self.nominal_frequency
    }

    pub fn compensator(&self) -> &PiCompensator {
        &self.compensator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SAMPLE_RATE;
    use crate::control::transforms::{ThreePhase, PHASE_SHIFT};
    use libm::{cosf, sinf};

    const PEAK: f32 = 325.0;

    #[derive(Clone, Copy)]
    enum Wave {
        Sine,
        Cosine,
    }

    fn grid(wave: Wave, freq: f32, k: u32) -> ThreePhase {
        let angle = TAU * freq * k as f32 / DEFAULT_SAMPLE_RATE;
        let f: fn(f32) -> f32 = match wave {
            Wave::Sine => sinf,
            Wave::Cosine => cosf,
        };
        ThreePhase::new(
            PEAK * f(angle),
            PEAK * f(angle - PHASE_SHIFT),
            PEAK * f(angle + PHASE_SHIFT),
        )
    }

    /// Feed samples until `done` accepts the status; returns the sample index
    fn run_until(
        pll: &mut PllLock,
        coords: &mut Coordinates,
        wave: Wave,
        freq: f32,
        samples: core::ops::Range<u32>,
        done: impl Fn(PllStatus) -> bool,
    ) -> Option<u32> {
        for k in samples {
            coords.abc = grid(wave, freq, k);
            if done(pll.lock_grid(coords)) {
                return Some(k);
            }
        }
        None
    }

    fn config() -> PllConfig {
        PllConfig::default()
    }

    #[test]
    fn test_starts_invalid() {
        let pll = PllLock::new(&config()).unwrap();
        assert_eq!(pll.status(), PllStatus::Invalid);
        assert!(!pll.status_changed());
        assert_eq!(pll.theta(), 0.0);
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut cfg = config();
        cfg.pi.dt = 0.0;
        assert_eq!(
            PllLock::new(&cfg).err(),
            Some(ConfigError::NonPositiveTimeStep)
        );

        let mut cfg = config();
        cfg.filter_window = PLL_FILTER_CAPACITY + 1;
        assert_eq!(
            PllLock::new(&cfg).err(),
            Some(ConfigError::FilterWindowTooLarge)
        );

        let mut cfg = config();
        cfg.nominal_frequency = f32::NAN;
        assert_eq!(
            PllLock::new(&cfg).err(),
            Some(ConfigError::InvalidNominalFrequency)
        );
    }

    #[test]
    fn test_locks_to_clean_grid_and_drops_on_outage() {
        let cfg = config();
        let window = cfg.thresholds.cycle_count;
        let mut pll = PllLock::new(&cfg).unwrap();
        let mut coords = Coordinates::default();

        let armed = run_until(&mut pll, &mut coords, Wave::Sine, 50.0, 0..4 * window, |s| {
            s != PllStatus::Invalid
        })
        .expect("PLL never left INVALID");
        // The first window already passes: leaves INVALID on its last sample
        assert!(armed < window, "left INVALID at sample {}", armed);
        assert_eq!(armed + 1, window);

        // Locked at the next phase-A zero crossing (every 10 ms at 50 Hz);
        // may coincide with the boundary sample itself
        let locked = if pll.is_locked() {
            armed
        } else {
            assert_eq!(pll.status(), PllStatus::Pending);
            run_until(&mut pll, &mut coords, Wave::Sine, 50.0, armed + 1..armed + 251, |s| {
                s == PllStatus::Locked
            })
            .expect("PLL never locked")
        };
        assert!(fabsf(coords.abc.a) < pll.filtered_dq().d / ZERO_CROSSING_DIVISOR);
        assert_ne!(pll.previous_status(), PllStatus::Locked);
        assert!(pll.status_changed());

        // Steady state: amplitude in d, frequency estimate at 50 Hz
        for k in locked + 1..locked + 2 * window {
            coords.abc = grid(Wave::Sine, 50.0, k);
            assert_eq!(pll.lock_grid(&mut coords), PllStatus::Locked);
        }
        let dq = pll.filtered_dq();
        assert!(fabsf(dq.d - PEAK) < 1.0, "d = {}", dq.d);
        assert!(fabsf(dq.q) < 1.0, "q = {}", dq.q);
        assert!(fabsf(pll.frequency() - 50.0) < 0.1, "f = {}", pll.frequency());

        // Outage: all phases to zero
        let mut dropped = None;
        for n in 0..window {
            coords.abc = ThreePhase::default();
            if pll.lock_grid(&mut coords) == PllStatus::Invalid {
                dropped = Some(n);
                break;
            }
        }
        let dropped = dropped.expect("loss of lock not detected");
        assert!(dropped < cfg.filter_window as u32);
    }

    #[test]
    fn test_tracked_angle_follows_grid() {
        let mut pll = PllLock::new(&config()).unwrap();
        let mut coords = Coordinates::default();
        let total = 4000;
        for k in 0..total {
            coords.abc = grid(Wave::Sine, 50.0, k);
            pll.lock_grid(&mut coords);
        }
        assert!(pll.is_locked());
        // The next sample's grid angle
        let grid_angle = normalize_angle(TAU * 50.0 * total as f32 / DEFAULT_SAMPLE_RATE);
        let mut error = pll.theta() - grid_angle;
        if error > core::f32::consts::PI {
            error -= TAU;
        } else if error < -core::f32::consts::PI {
            error += TAU;
        }
        assert!(fabsf(error) < 0.02, "angle error {}", error);
    }

    #[test]
    fn test_runtime_trig_mode_locks() {
        let mut cfg = config();
        cfg.trig_mode = TrigMode::Runtime;
        let mut pll = PllLock::new(&cfg).unwrap();
        let mut coords = Coordinates::default();
        let locked = run_until(&mut pll, &mut coords, Wave::Sine, 50.0, 0..3000, |s| {
            s == PllStatus::Locked
        });
        assert!(locked.is_some());
    }

    #[test]
    fn test_cosine_convention_locks_to_cosine_grid() {
        let mut cfg = config();
        cfg.park = ParkType::Cosine;
        let mut pll = PllLock::new(&cfg).unwrap();
        let mut coords = Coordinates::default();
        let locked = run_until(&mut pll, &mut coords, Wave::Cosine, 50.0, 0..3000, |s| {
            s == PllStatus::Locked
        });
        assert!(locked.is_some());
        assert!(fabsf(pll.filtered_dq().d - PEAK) < 2.0);
    }

    #[test]
    fn test_tracks_off_nominal_frequency() {
        let mut pll = PllLock::new(&config()).unwrap();
        let mut coords = Coordinates::default();
        for k in 0..6000 {
            coords.abc = grid(Wave::Sine, 49.5, k);
            pll.lock_grid(&mut coords);
        }
        assert!(pll.is_locked());
        assert!(fabsf(pll.frequency() - 49.5) < 0.1, "f = {}", pll.frequency());
    }

    #[test]
    fn test_locks_without_nominal_feedforward() {
        // Pure PI acquisition: the integral has to wind up the whole grid
        // step, so the first window is lost
        let mut cfg = config();
        cfg.nominal_frequency = 0.0;
        let mut pll = PllLock::new(&cfg).unwrap();
        let mut coords = Coordinates::default();
        let window = cfg.thresholds.cycle_count;
        let armed = run_until(&mut pll, &mut coords, Wave::Sine, 50.0, 0..4 * window, |s| {
            s != PllStatus::Invalid
        })
        .expect("PLL never left INVALID");
        assert!(armed >= window);
        for k in armed + 1..6000 {
            coords.abc = grid(Wave::Sine, 50.0, k);
            pll.lock_grid(&mut coords);
        }
        assert!(pll.is_locked());
        assert!(fabsf(pll.frequency() - 50.0) < 0.1, "f = {}", pll.frequency());
    }

    #[test]
    fn test_weak_grid_never_locks() {
        let mut pll = PllLock::new(&config()).unwrap();
        let mut coords = Coordinates::default();
        for k in 0..5000 {
            let sample = grid(Wave::Sine, 50.0, k);
            // 50 V peak: d settles below d_lock_min
            coords.abc = ThreePhase::new(sample.a / 6.5, sample.b / 6.5, sample.c / 6.5);
            assert_ne!(pll.lock_grid(&mut coords), PllStatus::Locked);
        }
        assert_eq!(pll.status(), PllStatus::Invalid);
    }

    #[test]
    fn test_reset_returns_to_start() {
        let mut pll = PllLock::new(&config()).unwrap();
        let mut coords = Coordinates::default();
        for k in 0..3000 {
            coords.abc = grid(Wave::Sine, 50.0, k);
            pll.lock_grid(&mut coords);
        }
        assert!(pll.is_locked());
        pll.reset();
        assert_eq!(pll.status(), PllStatus::Invalid);
        assert_eq!(pll.theta(), 0.0);
        assert_eq!(pll.compensator().integral(), 0.0);
        assert_eq!(pll.filtered_dq(), Dq0::default());
    }
}
