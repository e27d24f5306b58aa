// Grid-synchronised control primitives
// Frame transforms, PI compensation, filtering, PLL and PWM modulation

pub mod filters;
pub mod pi_compensator;
pub mod pll;
pub mod svpwm;
pub mod transforms;

// Re-export main types for easier access
pub use filters::MovingAverage;
pub use pi_compensator::PiCompensator;
pub use pll::{PllLock, PllStatus};
pub use svpwm::{calculate_spwm, calculate_svpwm, Duties};
pub use transforms::{
    limit_voltage, normalize_angle, AlphaBeta0, Coordinates, Dq0, ParkType, Source, ThreePhase,
    TrigMode, Trigno, PHASE_SHIFT,
};
