//! Range checks for positions.
//!
//! The mapper in `spherical` never validates; callers that accept user input
//! run it through these helpers first.

use core::f64::consts::{FRAC_PI_2, PI, TAU};

use super::{Position, Spherical, TexturePoint, TextureSize};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Component {
    TextureX,
    TextureY,
    Yaw,
    Pitch,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::TextureX => "textureX",
            Component::TextureY => "textureY",
            Component::Yaw => "yaw",
            Component::Pitch => "pitch",
        };
        f.write_str(name)
    }
}

/// A position component outside its legal range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PositionError {
    pub component: Component,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid position: {}={} outside [{}, {}]",
            self.component, self.value, self.min, self.max
        )
    }
}

impl std::error::Error for PositionError {}

fn check(
    component: Component,
    value: f64,
    min: f64,
    max: f64,
    max_inclusive: bool,
) -> Result<(), PositionError> {
    let upper_ok = if max_inclusive { value <= max } else { value < max };
    // NaN fails both comparisons.
    if value.is_finite() && value >= min && upper_ok {
        Ok(())
    } else {
        Err(PositionError {
            component,
            value,
            min,
            max,
        })
    }
}

/// `x ∈ [0, width)`, `y ∈ [0, height)`.
pub fn validate_texture(point: TexturePoint, size: TextureSize) -> Result<(), PositionError> {
    check(Component::TextureX, point.x, 0.0, size.width_f64(), false)?;
    check(Component::TextureY, point.y, 0.0, size.height_f64(), false)
}

/// `yaw ∈ [-π, π)`, `pitch ∈ [-π/2, π/2]`.
pub fn validate_spherical(s: Spherical) -> Result<(), PositionError> {
    check(Component::Yaw, s.yaw, -PI, PI, false)?;
    check(Component::Pitch, s.pitch, -FRAC_PI_2, FRAC_PI_2, true)
}

/// Rejects NaN and infinite components. Range is not checked.
pub fn validate_finite(pos: Position) -> Result<(), PositionError> {
    let (a, b) = match pos {
        Position::Texture(p) => ((Component::TextureX, p.x), (Component::TextureY, p.y)),
        Position::Spherical(s) => ((Component::Yaw, s.yaw), (Component::Pitch, s.pitch)),
    };
    check(a.0, a.1, f64::MIN, f64::MAX, true)?;
    check(b.0, b.1, f64::MIN, f64::MAX, true)
}

pub fn validate_position(pos: Position, size: TextureSize) -> Result<(), PositionError> {
    match pos {
        Position::Texture(p) => validate_texture(p, size),
        Position::Spherical(s) => validate_spherical(s),
    }
}

/// Clamp a texture point into the image. The right and bottom edges are
/// exclusive, so they clamp to the last representable value below them.
pub fn clamp_texture(point: TexturePoint, size: TextureSize) -> TexturePoint {
    let max_x = just_below(size.width_f64());
    let max_y = just_below(size.height_f64());
    TexturePoint::new(point.x.clamp(0.0, max_x), point.y.clamp(0.0, max_y))
}

// Largest f64 strictly below a positive finite `v`.
fn just_below(v: f64) -> f64 {
    f64::from_bits(v.to_bits() - 1)
}

/// Wrap a yaw angle into `[-π, π)`.
pub fn wrap_yaw(yaw: f64) -> f64 {
    (yaw + PI).rem_euclid(TAU) - PI
}
