//! Default control parameters
//!
//! Values are tuned for a 20 kHz control cycle on a 230 V / 50 Hz grid
//! (325 V phase peak) with a 700 V DC link.

/// Control cycle rate [Hz] (one orchestrator pass per PWM period)
pub const DEFAULT_SAMPLE_RATE: f32 = 20_000.0;

/// Control cycle period [s]
pub const DEFAULT_SAMPLE_PERIOD: f32 = 1.0 / DEFAULT_SAMPLE_RATE;

/// Nominal grid frequency [Hz]
///
/// The PLL advances its angle at this rate and only corrects the residual.
pub const DEFAULT_GRID_FREQUENCY: f32 = 50.0;

/// Nominal DC-link voltage [V]
pub const DEFAULT_V_DC_LINK: f32 = 700.0;

/// PLL loop filter
///
/// The compensator output is the angle correction applied per sample [rad]
/// on top of the nominal advance, so the limits bound the trackable offset
/// from the nominal frequency to ±0.05 * fs / 2π (about 160 Hz).
pub mod pll {
    pub const DEFAULT_KP: f32 = 8.0e-5;
    pub const DEFAULT_KI: f32 = 2.0e-2;
    pub const DEFAULT_SHIFT_LIMIT: f32 = 0.05;

    /// Moving-average window applied to d and q before the loop [samples]
    pub const DEFAULT_FILTER_WINDOW: usize = 20;

    /// Lock is declined while |q| peaks above this value within a window [V]
    pub const DEFAULT_Q_LOCK_MAX: f32 = 10.0;
    /// Accepted band for the d component (grid amplitude) [V]
    pub const DEFAULT_D_LOCK_MIN: f32 = 100.0;
    pub const DEFAULT_D_LOCK_MAX: f32 = 600.0;
    /// Lock evaluation window [samples]
    pub const DEFAULT_CYCLE_COUNT: u32 = 500;
}

/// Current loop (grid-tie current control)
pub mod current {
    /// Output unit is volts of DQ voltage command per amp of error
    pub const DEFAULT_KP: f32 = 2.0;
    pub const DEFAULT_KI: f32 = 400.0;
    /// Voltage command limit [V]
    pub const DEFAULT_VOLTAGE_LIMIT: f32 = 400.0;
    /// Active current reference (d axis) [A]
    pub const DEFAULT_I_REF: f32 = 0.0;
}

/// Open-loop V/f drive
pub mod open_loop {
    pub const DEFAULT_NOMINAL_FREQ: f32 = 50.0;
    pub const DEFAULT_NOMINAL_MODULATION_INDEX: f32 = 0.7;
    pub const DEFAULT_REQ_FREQ: f32 = 50.0;
    /// Multiplicative frequency step per cycle
    pub const DEFAULT_ACCELERATION: f32 = 1.00001;
    pub const DEFAULT_START_FREQ: f32 = 1.0;
}

/// DC-link supervision
pub mod dc_link {
    pub const DEFAULT_FILTER_ALPHA: f32 = 0.1;
    pub const DEFAULT_OVERVOLTAGE: f32 = 800.0;
    pub const DEFAULT_UNDERVOLTAGE: f32 = 450.0;
}
