//! Pieces of the `tour` command line tool that do not touch the terminal.

use std::env;
use std::time::Duration;

use foundation::math::{
    PositionError, Spherical, TexturePoint, TextureSize, spherical_to_texture,
    texture_to_spherical, validate_spherical, validate_texture,
};
use streaming::{CacheConfig, LoaderConfig};
use tour::{PanoramaGraph, TourConfig};

pub fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Runtime settings resolved from the environment. Flags override them in
/// the binary.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Settings {
    pub texture: TextureSize,
    pub cache: CacheConfig,
    pub loader: LoaderConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        let default_texture = TextureSize::EQUIRECT_DEFAULT;
        let texture = TextureSize::new(
            env_var_u32("TOUR_TEXTURE_WIDTH", default_texture.width),
            env_var_u32("TOUR_TEXTURE_HEIGHT", default_texture.height),
        )
        .unwrap_or(default_texture);

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            max_bytes: env_var_usize("TOUR_CACHE_MAX_BYTES", cache_defaults.max_bytes),
            ttl: Duration::from_secs(env_var_u64(
                "TOUR_CACHE_TTL_SECS",
                cache_defaults.ttl.as_secs(),
            )),
        };

        let default_timeout = LoaderConfig::default().fetch_timeout;
        let loader = LoaderConfig {
            fetch_timeout: Duration::from_millis(env_var_u64(
                "TOUR_FETCH_TIMEOUT_MS",
                u64::try_from(default_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        Self {
            texture,
            cache,
            loader,
        }
    }

    pub fn tour_config(&self) -> TourConfig {
        TourConfig {
            default_texture: self.texture,
        }
    }

    /// Applies `--width`/`--height` over the environment. Zero is ignored.
    pub fn with_texture_override(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        let width = width.unwrap_or(self.texture.width);
        let height = height.unwrap_or(self.texture.height);
        if let Some(size) = TextureSize::new(width, height) {
            self.texture = size;
        }
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum ConvertFrom {
    /// Pixel coordinates `x y` to `yaw pitch`.
    Texture,
    /// Radians `yaw pitch` to pixel coordinates `x y`.
    Spherical,
}

pub fn convert(from: ConvertFrom, a: f64, b: f64, size: TextureSize) -> Result<String, PositionError> {
    match from {
        ConvertFrom::Texture => {
            let point = TexturePoint::new(a, b);
            validate_texture(point, size)?;
            let s = texture_to_spherical(point, size);
            Ok(format!("yaw={:.6} pitch={:.6}", s.yaw, s.pitch))
        }
        ConvertFrom::Spherical => {
            let s = Spherical::new(a, b);
            validate_spherical(s)?;
            let p = spherical_to_texture(s, size);
            Ok(format!("x={:.3} y={:.3}", p.x, p.y))
        }
    }
}

/// One line per node: id, name, link and hotspot counts, dangling targets.
pub fn inspect(graph: &PanoramaGraph) -> Vec<String> {
    let dangling = graph.dangling_links();
    graph
        .all_nodes()
        .map(|node| {
            let missing: Vec<&str> = dangling
                .iter()
                .filter(|d| d.source == node.id)
                .map(|d| d.target.as_str())
                .collect();
            let mut line = format!(
                "{}\t{}\tlinks={}\thotspots={}",
                node.id,
                node.display_name,
                node.links.len(),
                node.hotspots.len()
            );
            if !missing.is_empty() {
                line.push_str(&format!("\tdangling={}", missing.join(",")));
            }
            line
        })
        .collect()
}

/// Invariant violations followed by dangling links.
pub fn problems(graph: &PanoramaGraph) -> Vec<String> {
    let mut out: Vec<String> = graph
        .check_invariants()
        .iter()
        .map(ToString::to_string)
        .collect();
    out.extend(
        graph
            .dangling_links()
            .into_iter()
            .map(|d| format!("{}: link to missing node {}", d.source, d.target)),
    );
    out
}
