//! Value Colours
//!
//! Every value node owns a persistent colour, assigned lazily the first time
//! it becomes a value. Where the colour comes from is not the tree's concern:
//! the store asks an injected [`ColourGenerator`] for exactly one colour per
//! value transition.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// An opaque colour value, stored as `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Colour(String);

impl Colour {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02x}{g:02x}{b:02x}"))
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of colours for value nodes.
///
/// Implementations need not be deterministic.
pub trait ColourGenerator: Send {
    /// Produce one colour.
    fn generate(&mut self) -> Colour;
}

impl<F> ColourGenerator for F
where
    F: FnMut() -> Colour + Send,
{
    fn generate(&mut self) -> Colour {
        self()
    }
}

/// Golden-ratio conjugate; stepping the hue by it spreads consecutive
/// colours evenly around the wheel.
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

const SATURATION: f64 = 0.9;
const VALUE: f64 = 0.9;

/// Default generator: bright colours with well separated hues.
#[derive(Debug, Clone)]
pub struct GoldenRatioColours {
    hue: f64,
    saturation: f64,
    value: f64,
}

impl GoldenRatioColours {
    /// Start from a hue derived from the wall clock.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or_default();
        Self::with_seed(f64::from(nanos) / 1e9)
    }

    /// Start from a fixed hue in `[0, 1)`.
    pub fn with_seed(hue: f64) -> Self {
        Self {
            hue: hue.rem_euclid(1.0),
            saturation: SATURATION,
            value: VALUE,
        }
    }
}

impl Default for GoldenRatioColours {
    fn default() -> Self {
        Self::new()
    }
}

impl ColourGenerator for GoldenRatioColours {
    fn generate(&mut self) -> Colour {
        self.hue = (self.hue + GOLDEN_RATIO_CONJUGATE).rem_euclid(1.0);
        let (r, g, b) = hsv_to_rgb(self.hue, self.saturation, self.value);
        Colour::from_rgb(r, g, b)
    }
}

/// Deterministic generator for tests: `#000001`, `#000002`, ...
#[derive(Debug, Clone, Default)]
pub struct SequenceColours {
    next: u32,
}

impl SequenceColours {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of colours handed out so far.
    pub fn issued(&self) -> u32 {
        self.next
    }
}

impl ColourGenerator for SequenceColours {
    fn generate(&mut self) -> Colour {
        self.next += 1;
        Colour::new(format!("#{:06x}", self.next & 0x00ff_ffff))
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match sector as i64 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let channel = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}
