// Coordinate transformations between the three-phase (abc), stationary (αβ0)
// and rotating (dq0) frames. Clarke/Park in amplitude-invariant form.

use core::f32::consts::TAU;

use libm::{cosf, fmodf, sinf, sqrtf};

pub(crate) const SQRT3: f32 = 1.732_050_8; // sqrt(3)
pub(crate) const SQRT3_DIV_2: f32 = 0.866_025_4; // sqrt(3) / 2
const FRAC_1_SQRT3: f32 = 0.577_350_26; // 1 / sqrt(3)
const TWO_THIRDS: f32 = 2.0 / 3.0;

/// Phase offset between adjacent phases [rad]
pub const PHASE_SHIFT: f32 = TAU / 3.0;

/// Instantaneous three-phase quantities (voltage or current)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreePhase {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl ThreePhase {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }
}

/// Stationary frame; `zero` is the common-mode component
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlphaBeta0 {
    pub alpha: f32,
    pub beta: f32,
    pub zero: f32,
}

/// Rotating frame aligned to the tracked angle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dq0 {
    pub d: f32,
    pub q: f32,
    pub zero: f32,
}

/// Park transform convention
///
/// The d/q signs differ between the two, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParkType {
    /// d axis aligned with the phase-A axis at θ = 0
    Cosine,
    /// d axis 90° behind the phase-A axis
    Sine,
}

/// Where the rotating-frame math gets its sin/cos from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrigMode {
    /// Use the [`Trigno`] refreshed once per cycle
    Precomputed,
    /// Evaluate sin/cos on every call (reference path)
    Runtime,
}

/// Which frame of a [`Coordinates`] bundle holds the fresh values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// abc was measured; derive αβ0 and dq0
    Abc,
    /// dq0 was commanded; derive αβ0 and abc
    Dq0,
}

/// Precomputed trigonometric values for one angle
///
/// Must be refreshed every cycle before it is handed to the Park functions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trigno {
    pub angle: f32,
    pub sin: f32,
    pub cos: f32,
    /// sin(θ - 2π/3)
    pub sin_minus: f32,
    /// cos(θ - 2π/3)
    pub cos_minus: f32,
    /// sin(θ + 2π/3)
    pub sin_plus: f32,
    /// cos(θ + 2π/3)
    pub cos_plus: f32,
}

impl Default for Trigno {
    fn default() -> Self {
        Self::exact(0.0)
    }
}

impl Trigno {
    /// Fast path: idsp::cossin() for the base angle, shifted values from
    /// the angle-sum identities
    ///
    /// The angle is wrapped to [0, 2π) first.
    pub fn new(angle: f32) -> Self {
        let angle = normalize_angle(angle);

        // [0, 2π) maps onto the full u32 phase circle; the i32 cast wraps
        // the upper half to negative phases as idsp expects
        const SCALE: f32 = 4_294_967_296.0 / TAU; // 2^32 / 2π
        let phase = (angle * SCALE) as i64 as i32;
        let (cos_i32, sin_i32) = idsp::cossin(phase);

        // cossin() full scale is 2^31 - 0.85 * 2^15, not 2^31
        const AMPLITUDE: f32 = 2_147_483_648.0 - 0.85 * 32_768.0;
        let cos = cos_i32 as f32 / AMPLITUDE;
        let sin = sin_i32 as f32 / AMPLITUDE;

        // LUT error is up to ~1e-5 per quadrature; sin² + cos² must stay 1
        let norm = sqrtf(sin * sin + cos * cos);

        Self::from_sin_cos(angle, sin / norm, cos / norm)
    }

    /// Reference path using libm for the base angle
    pub fn exact(angle: f32) -> Self {
        let angle = normalize_angle(angle);
        Self::from_sin_cos(angle, sinf(angle), cosf(angle))
    }

    fn from_sin_cos(angle: f32, sin: f32, cos: f32) -> Self {
        Self {
            angle,
            sin,
            cos,
            sin_minus: -0.5 * sin - SQRT3_DIV_2 * cos,
            cos_minus: -0.5 * cos + SQRT3_DIV_2 * sin,
            sin_plus: -0.5 * sin + SQRT3_DIV_2 * cos,
            cos_plus: -0.5 * cos - SQRT3_DIV_2 * sin,
        }
    }
}

/// Normalize angle to range [0, 2π)
///
/// # Arguments
/// * `angle` - Angle in radians
///
/// # Returns
/// Normalized angle in range [0, 2π)
pub fn normalize_angle(angle: f32) -> f32 {
    let mut wrapped = fmodf(angle, TAU);
    if wrapped < 0.0 {
        wrapped += TAU;
    }
    // -ε + 2π rounds up to exactly 2π in f32
    if wrapped >= TAU {
        wrapped = 0.0;
    }
    wrapped
}

/// Clarke transformation (abc → αβ0)
pub fn abc_to_alpha_beta0(abc: &ThreePhase) -> AlphaBeta0 {
    AlphaBeta0 {
        alpha: (2.0 * abc.a - abc.b - abc.c) / 3.0,
        beta: (abc.b - abc.c) * FRAC_1_SQRT3,
        zero: (abc.a + abc.b + abc.c) / 3.0,
    }
}

/// Inverse Clarke transformation (αβ0 → abc)
pub fn alpha_beta0_to_abc(ab0: &AlphaBeta0) -> ThreePhase {
    ThreePhase {
        a: ab0.alpha + ab0.zero,
        b: (SQRT3 * ab0.beta - ab0.alpha) / 2.0 + ab0.zero,
        c: (-SQRT3 * ab0.beta - ab0.alpha) / 2.0 + ab0.zero,
    }
}

/// Park transformation (αβ0 → dq0)
pub fn alpha_beta0_to_dq0(ab0: &AlphaBeta0, trig: &Trigno, park: ParkType) -> Dq0 {
    park_sin_cos(ab0, trig.sin, trig.cos, park)
}

/// Inverse Park transformation (dq0 → αβ0)
pub fn dq0_to_alpha_beta0(dq0: &Dq0, trig: &Trigno, park: ParkType) -> AlphaBeta0 {
    inverse_park_sin_cos(dq0, trig.sin, trig.cos, park)
}

/// Park transformation evaluating sin/cos for `angle` on every call
pub fn alpha_beta0_to_dq0_at(ab0: &AlphaBeta0, angle: f32, park: ParkType) -> Dq0 {
    park_sin_cos(ab0, sinf(angle), cosf(angle), park)
}

/// Inverse Park transformation evaluating sin/cos for `angle` on every call
pub fn dq0_to_alpha_beta0_at(dq0: &Dq0, angle: f32, park: ParkType) -> AlphaBeta0 {
    inverse_park_sin_cos(dq0, sinf(angle), cosf(angle), park)
}

#[inline]
fn park_sin_cos(ab0: &AlphaBeta0, sin: f32, cos: f32, park: ParkType) -> Dq0 {
    match park {
        ParkType::Cosine => Dq0 {
            d: ab0.alpha * cos + ab0.beta * sin,
            q: -ab0.alpha * sin + ab0.beta * cos,
            zero: ab0.zero,
        },
        ParkType::Sine => Dq0 {
            d: ab0.alpha * sin - ab0.beta * cos,
            q: ab0.alpha * cos + ab0.beta * sin,
            zero: ab0.zero,
        },
    }
}

#[inline]
fn inverse_park_sin_cos(dq0: &Dq0, sin: f32, cos: f32, park: ParkType) -> AlphaBeta0 {
    match park {
        ParkType::Cosine => AlphaBeta0 {
            alpha: dq0.d * cos - dq0.q * sin,
            beta: dq0.d * sin + dq0.q * cos,
            zero: dq0.zero,
        },
        ParkType::Sine => AlphaBeta0 {
            alpha: dq0.d * sin + dq0.q * cos,
            beta: -dq0.d * cos + dq0.q * sin,
            zero: dq0.zero,
        },
    }
}

/// abc → dq0 in one step using the precomputed shifted trig values
pub fn abc_to_dq0(abc: &ThreePhase, trig: &Trigno, park: ParkType) -> Dq0 {
    let zero = (abc.a + abc.b + abc.c) / 3.0;
    let s = abc.a * trig.sin + abc.b * trig.sin_minus + abc.c * trig.sin_plus;
    let c = abc.a * trig.cos + abc.b * trig.cos_minus + abc.c * trig.cos_plus;

    match park {
        ParkType::Cosine => Dq0 {
            d: TWO_THIRDS * c,
            q: -TWO_THIRDS * s,
            zero,
        },
        ParkType::Sine => Dq0 {
            d: TWO_THIRDS * s,
            q: TWO_THIRDS * c,
            zero,
        },
    }
}

/// dq0 → abc in one step using the precomputed shifted trig values
pub fn dq0_to_abc(dq0: &Dq0, trig: &Trigno, park: ParkType) -> ThreePhase {
    match park {
        ParkType::Cosine => ThreePhase {
            a: dq0.d * trig.cos - dq0.q * trig.sin + dq0.zero,
            b: dq0.d * trig.cos_minus - dq0.q * trig.sin_minus + dq0.zero,
            c: dq0.d * trig.cos_plus - dq0.q * trig.sin_plus + dq0.zero,
        },
        ParkType::Sine => ThreePhase {
            a: dq0.d * trig.sin + dq0.q * trig.cos + dq0.zero,
            b: dq0.d * trig.sin_minus + dq0.q * trig.cos_minus + dq0.zero,
            c: dq0.d * trig.sin_plus + dq0.q * trig.cos_plus + dq0.zero,
        },
    }
}

/// abc → dq0 via Clarke then Park, recomputing sin/cos (slow path)
pub fn abc_to_dq0_at(abc: &ThreePhase, angle: f32, park: ParkType) -> Dq0 {
    alpha_beta0_to_dq0_at(&abc_to_alpha_beta0(abc), angle, park)
}

/// dq0 → abc via inverse Park then inverse Clarke, recomputing sin/cos (slow path)
pub fn dq0_to_abc_at(dq0: &Dq0, angle: f32, park: ParkType) -> ThreePhase {
    alpha_beta0_to_abc(&dq0_to_alpha_beta0_at(dq0, angle, park))
}

/// Limit a dq vector to a maximum magnitude
///
/// Applies circular limiting so the magnitude doesn't exceed `max_magnitude`;
/// the direction is preserved.
///
/// # Returns
/// Tuple of (d_limited, q_limited)
pub fn limit_voltage(d: f32, q: f32, max_magnitude: f32) -> (f32, f32) {
    let magnitude = sqrtf(d * d + q * q);

    if magnitude > max_magnitude {
        let scale = max_magnitude / magnitude;
        (d * scale, q * scale)
    } else {
        (d, q)
    }
}

/// The three frame views of one physical quantity
///
/// Owned by the control loop; the PLL and current loop refresh it in place
/// once per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Coordinates {
    pub abc: ThreePhase,
    pub alpha_beta0: AlphaBeta0,
    pub dq0: Dq0,
}

impl Coordinates {
    /// Recompute the other two frames from `source` with precomputed trig
    pub fn refresh(&mut self, source: Source, trig: &Trigno, park: ParkType) {
        match source {
            Source::Abc => {
                self.alpha_beta0 = abc_to_alpha_beta0(&self.abc);
                self.dq0 = alpha_beta0_to_dq0(&self.alpha_beta0, trig, park);
            }
            Source::Dq0 => {
                self.alpha_beta0 = dq0_to_alpha_beta0(&self.dq0, trig, park);
                self.abc = alpha_beta0_to_abc(&self.alpha_beta0);
            }
        }
    }

    /// Recompute the other two frames from `source`, evaluating sin/cos for `angle`
    pub fn refresh_at(&mut self, source: Source, angle: f32, park: ParkType) {
        match source {
            Source::Abc => {
                self.alpha_beta0 = abc_to_alpha_beta0(&self.abc);
                self.dq0 = alpha_beta0_to_dq0_at(&self.alpha_beta0, angle, park);
            }
            Source::Dq0 => {
                self.alpha_beta0 = dq0_to_alpha_beta0_at(&self.dq0, angle, park);
                self.abc = alpha_beta0_to_abc(&self.alpha_beta0);
            }
        }
    }

    /// Refresh according to `mode`
    pub fn refresh_with(&mut self, source: Source, trig: &Trigno, park: ParkType, mode: TrigMode) {
        match mode {
            TrigMode::Precomputed => self.refresh(source, trig, park),
            TrigMode::Runtime => self.refresh_at(source, trig.angle, park),
        }
    }
}
