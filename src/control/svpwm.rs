// Space Vector PWM (SVPWM) and sinusoidal PWM (SPWM) duty generation
//
// SVPWM normalises the αβ command by Vdc/√3, projects it onto three axes
// 120° apart and uses their sign pattern to pick the sector, avoiding atan2.
// Active-vector times T1/T2 follow per sector and the null time
// T0 = 1 - T1 - T2 is split evenly between both ends of the period
// (centre-aligned modulation).

use libm::sinf;

use super::transforms::{normalize_angle, AlphaBeta0, PHASE_SHIFT, SQRT3, SQRT3_DIV_2};

/// Duty used whenever the output has to be neutral (zero average voltage)
pub const NEUTRAL_DUTY: f32 = 0.5;

/// Normalised duty cycles for the three inverter legs, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Duties {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Duties {
    pub const NEUTRAL: Duties = Duties {
        a: NEUTRAL_DUTY,
        b: NEUTRAL_DUTY,
        c: NEUTRAL_DUTY,
    };

    pub fn as_array(&self) -> [f32; 3] {
        [self.a, self.b, self.c]
    }

    /// Scale to timer compare values for a counter period of `max_duty`
    pub fn to_compare(&self, max_duty: u16) -> [u16; 3] {
        let max = max_duty as f32;
        self.as_array()
            .map(|duty| libm::roundf(duty.clamp(0.0, 1.0) * max) as u16)
    }
}

impl Default for Duties {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// SVPWM sector (1-6, counter-clockwise from the α axis in 60° steps)
///
/// Decoded from the sign pattern of the three projections; patterns 0 and 7
/// cannot come from a valid vector and decode to `None`.
fn decode_sector(x: f32, y: f32, z: f32) -> Option<u8> {
    // Projections onto the b/c-like axes are the negated y/z
    let code = (x > 0.0) as u8 | (((-z) > 0.0) as u8) << 1 | (((-y) > 0.0) as u8) << 2;
    match code {
        3 => Some(1),
        1 => Some(2),
        5 => Some(3),
        4 => Some(4),
        6 => Some(5),
        2 => Some(6),
        _ => None,
    }
}

/// Calculate Space Vector PWM duty cycles
///
/// # Arguments
/// * `v_ab` - Stationary-frame voltage command (volts, zero component ignored)
/// * `v_dc` - DC-link voltage (volts)
///
/// # Returns
/// Duties in [0, 1]. Vectors beyond the linear range are scaled back onto the
/// hexagon; a degenerate sector or a non-positive DC link yields neutral duties.
pub fn calculate_svpwm(v_ab: &AlphaBeta0, v_dc: f32) -> Duties {
    if !(v_dc > 0.0) {
        return Duties::NEUTRAL;
    }

    // |v| = Vdc/√3 (largest undistorted amplitude) maps to 1.0
    let scale = SQRT3 / v_dc;
    let alpha = v_ab.alpha * scale;
    let beta = v_ab.beta * scale;

    // x = m·sinθ, y = m·sin(θ + 60°), z = m·sin(θ - 60°)
    let x = beta;
    let y = SQRT3_DIV_2 * alpha + 0.5 * beta;
    let z = -SQRT3_DIV_2 * alpha + 0.5 * beta;

    let Some(sector) = decode_sector(x, y, z) else {
        return Duties::NEUTRAL;
    };

    // (T1, T2) for the leading and trailing active vector of the sector
    let (t1, t2) = match sector {
        1 => (-z, x),
        2 => (y, z),
        3 => (x, -y),
        4 => (z, -x),
        5 => (-y, -z),
        _ => (-x, y),
    };

    // Over-modulation: keep the direction, drop the null vector
    let active = t1 + t2;
    let (t1, t2) = if active > 1.0 {
        (t1 / active, t2 / active)
    } else {
        (t1, t2)
    };
    let half_t0 = (1.0 - t1 - t2) / 2.0;

    let (a, b, c) = match sector {
        1 => (t1 + t2 + half_t0, t2 + half_t0, half_t0),
        2 => (t1 + half_t0, t1 + t2 + half_t0, half_t0),
        3 => (half_t0, t1 + t2 + half_t0, t2 + half_t0),
        4 => (half_t0, t1 + half_t0, t1 + t2 + half_t0),
        5 => (t2 + half_t0, half_t0, t1 + t2 + half_t0),
        _ => (t1 + t2 + half_t0, half_t0, t1 + half_t0),
    };

    Duties {
        a: a.clamp(0.0, 1.0),
        b: b.clamp(0.0, 1.0),
        c: c.clamp(0.0, 1.0),
    }
}

/// Calculate sinusoidal PWM duty cycles
///
/// duty = 0.5 + 0.5·m·sin(phase) for phases θ, θ - 2π/3 and θ + 2π/3. Each
/// phase angle is wrapped after the offset is applied.
///
/// # Arguments
/// * `theta` - Electrical angle of phase A (radians)
/// * `modulation_index` - Peak phase amplitude as a fraction of Vdc/2
pub fn calculate_spwm(theta: f32, modulation_index: f32) -> Duties {
    let half_m = 0.5 * modulation_index;
    let duty = |angle: f32| (NEUTRAL_DUTY + half_m * sinf(normalize_angle(angle))).clamp(0.0, 1.0);

    Duties {
        a: duty(theta),
        b: duty(theta - PHASE_SHIFT),
        c: duty(theta + PHASE_SHIFT),
    }
}
