//! Allowed modulation depth as a function of flicker frequency.
//!
//! A piecewise curve in the style of IEEE-1789 risk envelopes. The numbers
//! come from the profile; nothing here encodes the standard itself.

use serde::{Deserialize, Serialize};

use crate::profile::DEFAULT_ALLOWED_MOD_PERCENT;

/// Lower bound on `f` in `a + b / f`.
const MIN_FREQ_HZ: f64 = 1e-6;

/// How a segment computes the allowed modulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentRule {
    /// `allowed = a + b / f`
    Inverse { a: f64, b: f64 },
    /// Constant cap across the band.
    Cap { max_percent: f64 },
}

/// One frequency band, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub f_min: f64,
    pub f_max: f64,
    #[serde(flatten)]
    pub rule: SegmentRule,
}

impl Segment {
    pub fn contains(&self, f_hz: f64) -> bool {
        self.f_min <= f_hz && f_hz <= self.f_max
    }

    fn allowed(&self, f_hz: f64) -> f64 {
        match self.rule {
            SegmentRule::Inverse { a, b } => a + b / f_hz.max(MIN_FREQ_HZ),
            SegmentRule::Cap { max_percent } => max_percent,
        }
    }
}

/// A normalized modulation curve. Segments are sorted by `f_min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickerCurve {
    /// Allowed modulation when no segment matches.
    pub default: f64,
    pub segments: Vec<Segment>,
    /// Clamp applied to the allowed value of a matched or fallback lookup.
    pub clamp: Option<(f64, f64)>,
}

impl Default for FlickerCurve {
    fn default() -> Self {
        Self {
            default: DEFAULT_ALLOWED_MOD_PERCENT,
            segments: Vec::new(),
            clamp: None,
        }
    }
}

impl FlickerCurve {
    /// Allowed percent modulation at `f_hz`. Never negative.
    ///
    /// A non-positive or non-finite frequency gets `default` without the
    /// clamp. Otherwise the first segment containing `f_hz` decides, then
    /// the clamp applies.
    pub fn allowed_mod_percent(&self, f_hz: f64) -> f64 {
        if !f_hz.is_finite() || f_hz <= 0.0 {
            return self.default.max(0.0);
        }
        let allowed = self
            .segments
            .iter()
            .find(|s| s.contains(f_hz))
            .map_or(self.default, |s| s.allowed(f_hz));
        let allowed = match self.clamp {
            Some((lo, hi)) => allowed.max(lo).min(hi),
            None => allowed,
        };
        allowed.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulationStatus {
    Within,
    Exceeds,
}

/// A measured modulation depth placed against the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub allowed: f64,
    pub measured: f64,
    pub status: ModulationStatus,
    /// `measured - allowed`; positive when exceeding.
    pub margin: f64,
}

pub fn classify_modulation(f_hz: f64, measured: f64, curve: &FlickerCurve) -> Classification {
    let allowed = curve.allowed_mod_percent(f_hz);
    Classification {
        allowed,
        measured,
        status: if measured > allowed {
            ModulationStatus::Exceeds
        } else {
            ModulationStatus::Within
        },
        margin: measured - allowed,
    }
}
