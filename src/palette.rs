//! Color tables shared by every renderer.

use crate::types::ClusterId;
use image::Rgba;

/// ColorBrewer "Oranges" anchors, light to dark.
const ORANGES: [&str; 9] = [
    "#fff5eb", "#fee6ce", "#fdd0a2", "#fdae6b", "#fd8d3c", "#f16913", "#d94801", "#a63603",
    "#7f2704",
];

const RAMP_SAMPLES: usize = 23;
const RAMP_START: f64 = -0.5;
/// Leading samples dropped so the lowest values are not near-white.
const RAMP_SKIP: usize = 10;

const CLUSTER_COLORS: [&str; ClusterId::COUNT] = ["#A6C3D0", "#BD4C2F", "#FCCF55"];

pub const BORDER: Rgba<u8> = Rgba([204, 204, 204, 255]);
pub const BACKDROP: Rgba<u8> = Rgba([128, 128, 128, 102]);
pub const AXIS: Rgba<u8> = Rgba([38, 38, 38, 255]);
pub const GRID: Rgba<u8> = Rgba([235, 235, 235, 255]);
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Parses `#rrggbb` into an opaque color; malformed channels read as 0.
pub fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    Rgba([channel(0..2), channel(2..4), channel(4..6), 255])
}

pub fn cluster_color(cluster: ClusterId) -> Rgba<u8> {
    hex_to_rgba(CLUSTER_COLORS[cluster.index()])
}

/// Color of the i-th series in a bar chart.
pub fn series_color(i: usize) -> Rgba<u8> {
    hex_to_rgba(CLUSTER_COLORS[i % CLUSTER_COLORS.len()])
}

/// A discrete sequential colormap indexed by a normalized value.
#[derive(Debug, Clone)]
pub struct SequentialPalette {
    stops: Vec<Rgba<u8>>,
}

impl SequentialPalette {
    /// The upper part of the Oranges ramp used by the metric maps.
    pub fn oranges() -> Self {
        let step = (1.0 - RAMP_START) / (RAMP_SAMPLES - 1) as f64;
        let stops = (RAMP_SKIP..RAMP_SAMPLES)
            .map(|i| sample_oranges(RAMP_START + step * i as f64))
            .collect();
        Self { stops }
    }

    pub fn stops(&self) -> &[Rgba<u8>] {
        &self.stops
    }

    /// Color for `t` in [0, 1]; out-of-range values clamp to the ends.
    pub fn color_at(&self, t: f64) -> Rgba<u8> {
        let n = self.stops.len();
        let idx = if t.is_nan() {
            0
        } else {
            ((t.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n - 1)
        };
        self.stops[idx]
    }
}

/// Linear `[vmin, vmax] -> [0, 1]` scaling; a collapsed range maps to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    pub vmin: f64,
    pub vmax: f64,
}

impl Normalize {
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self { vmin, vmax }
    }

    pub fn is_degenerate(&self) -> bool {
        self.vmax <= self.vmin
    }

    pub fn apply(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (value - self.vmin) / (self.vmax - self.vmin)
        }
    }
}

fn sample_oranges(t: f64) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let scaled = t * (ORANGES.len() - 1) as f64;
    let lo = scaled.floor() as usize;
    let hi = (lo + 1).min(ORANGES.len() - 1);
    let frac = scaled - lo as f64;

    let a = hex_to_rgba(ORANGES[lo]);
    let b = hex_to_rgba(ORANGES[hi]);
    let mix = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * frac).round() as u8;
    Rgba([mix(0), mix(1), mix(2), 255])
}

/// Perceived darkness, used to compare ramp saturation.
#[cfg(test)]
pub(crate) fn luminance(c: Rgba<u8>) -> f64 {
    0.2126 * c[0] as f64 + 0.7152 * c[1] as f64 + 0.0722 * c[2] as f64
}
