//! Texture-space <-> spherical mapping for equirectangular panoramas.
//!
//! Conventions:
//! - Texture space is pixel coordinates with the origin at the top-left of the
//!   source image, `x` growing right and `y` growing down.
//! - Spherical coordinates are `(yaw, pitch)` in radians with the origin at the
//!   image center. `yaw ∈ [-π, π)`, `pitch ∈ [-π/2, π/2]`.
//!
//! None of the mapping functions validate or clamp; NaN and infinities pass
//! straight through. See `validate` for range checks.

use core::f64::consts::{FRAC_PI_2, PI, TAU};

/// Pixel dimensions of an equirectangular texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    /// Dimensions assumed for a panorama whose real texture size is unknown.
    pub const EQUIRECT_DEFAULT: TextureSize = TextureSize {
        width: 4096,
        height: 2048,
    };

    /// Returns `None` when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn width_f64(self) -> f64 {
        f64::from(self.width)
    }

    pub fn height_f64(self) -> f64 {
        f64::from(self.height)
    }
}

impl Default for TextureSize {
    fn default() -> Self {
        Self::EQUIRECT_DEFAULT
    }
}

/// Pixel position on a panorama texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TexturePoint {
    pub x: f64,
    pub y: f64,
}

impl TexturePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Viewing direction in radians.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Spherical {
    pub yaw: f64,
    pub pitch: f64,
}

impl Spherical {
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self { yaw, pitch }
    }
}

/// A marker position in either representation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Position {
    Texture(TexturePoint),
    Spherical(Spherical),
}

impl Position {
    pub fn texture(x: f64, y: f64) -> Self {
        Position::Texture(TexturePoint::new(x, y))
    }

    pub fn spherical(yaw: f64, pitch: f64) -> Self {
        Position::Spherical(Spherical::new(yaw, pitch))
    }
}

impl From<TexturePoint> for Position {
    fn from(p: TexturePoint) -> Self {
        Position::Texture(p)
    }
}

impl From<Spherical> for Position {
    fn from(s: Spherical) -> Self {
        Position::Spherical(s)
    }
}

pub fn texture_to_spherical(point: TexturePoint, size: TextureSize) -> Spherical {
    let yaw = (point.x / size.width_f64()) * TAU - PI;
    let pitch = (point.y / size.height_f64()) * PI - FRAC_PI_2;
    Spherical::new(yaw, pitch)
}

/// Exact algebraic inverse of [`texture_to_spherical`].
pub fn spherical_to_texture(s: Spherical, size: TextureSize) -> TexturePoint {
    let x = (s.yaw + PI) / TAU * size.width_f64();
    let y = (s.pitch + FRAC_PI_2) / PI * size.height_f64();
    TexturePoint::new(x, y)
}

/// Renderable viewer coordinate for `pos`, whichever variant it holds.
pub fn normalize_position(pos: Position, size: TextureSize) -> Spherical {
    match pos {
        Position::Texture(p) => texture_to_spherical(p, size),
        Position::Spherical(s) => s,
    }
}

/// Pixel coordinate for `pos`, used by numeric editor fields.
pub fn to_texture_display(pos: Position, size: TextureSize) -> TexturePoint {
    match pos {
        Position::Texture(p) => p,
        Position::Spherical(s) => spherical_to_texture(s, size),
    }
}
