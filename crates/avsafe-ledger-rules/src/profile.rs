//! Compliance profiles.
//!
//! A profile document is loose: numbers may arrive as strings, curve
//! segments may be partial, whole sections may be missing. [`Profile`] is
//! the normalized form the evaluator works with. Normalization happens
//! once, at load time.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::warn;

use crate::curve::{FlickerCurve, Segment, SegmentRule};
use crate::error::{Result, RulesError};

/// Noise limit used when a profile does not configure `default`.
pub const DEFAULT_NOISE_LIMIT_DB: f64 = 55.0;
/// Allowed modulation when no curve segment matches.
pub const DEFAULT_ALLOWED_MOD_PERCENT: f64 = 1.0;
pub const DEFAULT_NOISE_FLAG_PCT: f64 = 10.0;
pub const DEFAULT_FLICKER_FLAG_PCT: f64 = 0.0;
pub const DEFAULT_PERCENTILES: [f64; 2] = [50.0, 90.0];

/// Key of the fallback noise limit.
pub const DEFAULT_LOCALE: &str = "default";

/// A normalized compliance profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub profile_id: Option<String>,
    pub schema_version: Option<String>,
    pub name: String,
    /// Case-folded alias to case-folded locale.
    pub locale_aliases: BTreeMap<String, String>,
    pub noise: NoiseRules,
    pub flicker: FlickerRules,
    /// Percentiles reported for both noise and flicker samples.
    pub display_percentiles: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseRules {
    /// Case-folded locale to LAeq limit in dB. Always holds `default`.
    pub limits: BTreeMap<String, f64>,
    pub flag_threshold_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlickerRules {
    pub curve: FlickerCurve,
    /// Measured modulation is clipped into this range before comparison.
    pub clip_measured: Option<(f64, f64)>,
    pub flag_threshold_pct: f64,
}

/// Where a resolved noise limit came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLimit {
    pub limit_db: f64,
    /// The locale key that matched, or `default`.
    pub source: String,
}

impl Profile {
    /// Parse and normalize a JSON profile document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let raw: RawProfile = serde_json::from_str(s)?;
        raw.normalize()
    }

    /// Normalize an already parsed JSON document.
    pub fn from_json(value: Json) -> Result<Self> {
        let raw: RawProfile = serde_json::from_value(value)?;
        raw.normalize()
    }

    /// Resolve a requested locale: case-fold, then match a limit key, then an alias.
    ///
    /// An unknown token is returned as is; the limit lookup falls back to
    /// `default` for it.
    pub fn resolve_locale(&self, requested: Option<&str>) -> Option<String> {
        let token = fold(requested?);
        if token.is_empty() {
            return None;
        }
        if self.noise.limits.contains_key(&token) {
            return Some(token);
        }
        match self.locale_aliases.get(&token) {
            Some(mapped) => Some(mapped.clone()),
            None => Some(token),
        }
    }

    /// Noise limit for an already resolved locale.
    pub fn noise_limit(&self, resolved: Option<&str>) -> ResolvedLimit {
        if let Some(locale) = resolved {
            if let Some(limit) = self.noise.limits.get(locale) {
                return ResolvedLimit {
                    limit_db: *limit,
                    source: locale.to_owned(),
                };
            }
        }
        ResolvedLimit {
            limit_db: self
                .noise
                .limits
                .get(DEFAULT_LOCALE)
                .copied()
                .unwrap_or(DEFAULT_NOISE_LIMIT_DB),
            source: DEFAULT_LOCALE.to_owned(),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        let mut limits = BTreeMap::new();
        limits.insert(DEFAULT_LOCALE.to_owned(), DEFAULT_NOISE_LIMIT_DB);
        Self {
            profile_id: None,
            schema_version: None,
            name: "profile".to_owned(),
            locale_aliases: BTreeMap::new(),
            noise: NoiseRules {
                limits,
                flag_threshold_pct: DEFAULT_NOISE_FLAG_PCT,
            },
            flicker: FlickerRules {
                curve: FlickerCurve::default(),
                clip_measured: None,
                flag_threshold_pct: DEFAULT_FLICKER_FLAG_PCT,
            },
            display_percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}

/// Read and normalize a JSON profile file.
pub fn load_profile(path: impl AsRef<Path>) -> Result<Profile> {
    let text = std::fs::read_to_string(path)?;
    Profile::from_json_str(&text)
}

/// Case-fold a locale token.
fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Coerce a number or numeric string to a finite float.
pub(crate) fn coerce_f64(value: &Json) -> Option<f64> {
    let f = match value {
        Json::Number(n) => n.as_f64()?,
        Json::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

fn required_f64(value: Option<&Json>, field: &str, default: f64) -> Result<f64> {
    match value {
        None | Some(Json::Null) => Ok(default),
        Some(v) => coerce_f64(v).ok_or_else(|| RulesError::InvalidValue {
            field: field.to_owned(),
            value: v.to_string(),
        }),
    }
}

fn range_pair(value: Option<&Json>, field: &str) -> Option<(f64, f64)> {
    let value = value?;
    if value.is_null() {
        return None;
    }
    let pair = value.as_array().and_then(|items| match items.as_slice() {
        [lo, hi] => Some((coerce_f64(lo)?, coerce_f64(hi)?)),
        _ => None,
    });
    if pair.is_none() {
        warn!(field, value = %value, "ignoring malformed range");
    }
    pair
}

fn text(value: Option<&Json>) -> Option<String> {
    match value? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    profile_id: Option<Json>,
    #[serde(default)]
    schema_version: Option<Json>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    locales: RawLocales,
    #[serde(default)]
    noise: RawNoise,
    #[serde(default)]
    flicker: RawFlicker,
    #[serde(default)]
    display: RawDisplay,
}

#[derive(Debug, Default, Deserialize)]
struct RawLocales {
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNoise {
    #[serde(default)]
    laeq_limits_db: BTreeMap<String, Json>,
    #[serde(default)]
    flag_threshold_pct: Option<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFlicker {
    #[serde(default)]
    percent_mod_vs_freq: RawCurve,
    #[serde(default)]
    clip_percent_mod_range: Option<Json>,
    #[serde(default)]
    flag_threshold_pct: Option<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCurve {
    #[serde(default)]
    default: Option<Json>,
    #[serde(default)]
    segments: Vec<Json>,
    #[serde(default)]
    clip_allowed_range: Option<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDisplay {
    #[serde(default)]
    percentiles: Option<Vec<Json>>,
}

impl RawProfile {
    fn normalize(self) -> Result<Profile> {
        let mut limits = BTreeMap::new();
        for (locale, value) in &self.noise.laeq_limits_db {
            let field = format!("noise.laeq_limits_db.{}", locale);
            limits.insert(fold(locale), required_f64(Some(value), &field, DEFAULT_NOISE_LIMIT_DB)?);
        }
        limits
            .entry(DEFAULT_LOCALE.to_owned())
            .or_insert(DEFAULT_NOISE_LIMIT_DB);

        let locale_aliases = self
            .locales
            .aliases
            .iter()
            .map(|(alias, target)| (fold(alias), fold(target)))
            .collect();

        let display_percentiles = match &self.display.percentiles {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    coerce_f64(v).ok_or_else(|| RulesError::InvalidValue {
                        field: format!("display.percentiles[{}]", i),
                        value: v.to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => DEFAULT_PERCENTILES.to_vec(),
        };

        Ok(Profile {
            profile_id: text(self.profile_id.as_ref()),
            schema_version: text(self.schema_version.as_ref()),
            name: self.name.unwrap_or_else(|| "profile".to_owned()),
            locale_aliases,
            noise: NoiseRules {
                limits,
                flag_threshold_pct: required_f64(
                    self.noise.flag_threshold_pct.as_ref(),
                    "noise.flag_threshold_pct",
                    DEFAULT_NOISE_FLAG_PCT,
                )?,
            },
            flicker: FlickerRules {
                curve: self.flicker.percent_mod_vs_freq.normalize()?,
                clip_measured: range_pair(
                    self.flicker.clip_percent_mod_range.as_ref(),
                    "flicker.clip_percent_mod_range",
                ),
                flag_threshold_pct: required_f64(
                    self.flicker.flag_threshold_pct.as_ref(),
                    "flicker.flag_threshold_pct",
                    DEFAULT_FLICKER_FLAG_PCT,
                )?,
            },
            display_percentiles,
        })
    }
}

impl RawCurve {
    fn normalize(&self) -> Result<FlickerCurve> {
        let default = required_f64(
            self.default.as_ref(),
            "flicker.percent_mod_vs_freq.default",
            DEFAULT_ALLOWED_MOD_PERCENT,
        )?;
        let mut segments: Vec<Segment> = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                let segment = parse_segment(raw);
                if segment.is_none() {
                    warn!(index = i, segment = %raw, "skipping malformed flicker segment");
                }
                segment
            })
            .collect();
        segments.sort_by(|a, b| a.f_min.total_cmp(&b.f_min));

        Ok(FlickerCurve {
            default,
            segments,
            clamp: range_pair(
                self.clip_allowed_range.as_ref(),
                "flicker.percent_mod_vs_freq.clip_allowed_range",
            ),
        })
    }
}

/// `{f_min, f_max, a, b}` or `{f_min, f_max, max_percent}`; `a`/`b` wins
/// when both forms are present.
fn parse_segment(raw: &Json) -> Option<Segment> {
    let obj = raw.as_object()?;
    let num = |key: &str| obj.get(key).and_then(coerce_f64);
    let f_min = num("f_min")?;
    let f_max = num("f_max")?;
    let rule = match (num("a"), num("b"), num("max_percent")) {
        (Some(a), Some(b), _) => SegmentRule::Inverse { a, b },
        (_, _, Some(max_percent)) => SegmentRule::Cap { max_percent },
        _ => return None,
    };
    Some(Segment { f_min, f_max, rule })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_gets_defaults() {
        let p = Profile::from_json(json!({})).unwrap();
        assert_eq!(p, Profile::default());
        assert_eq!(p.noise.limits.get("default"), Some(&55.0));
        assert_eq!(p.display_percentiles, vec![50.0, 90.0]);
    }

    #[test]
    fn test_numeric_strings_coerced() {
        let p = Profile::from_json(json!({
            "noise": {"laeq_limits_db": {"Munich": "50", "default": 60}, "flag_threshold_pct": "5"},
            "flicker": {"percent_mod_vs_freq": {"default": "2.5"}}
        }))
        .unwrap();
        assert_eq!(p.noise.limits.get("munich"), Some(&50.0));
        assert_eq!(p.noise.limits.get("default"), Some(&60.0));
        assert_eq!(p.noise.flag_threshold_pct, 5.0);
        assert_eq!(p.flicker.curve.default, 2.5);
    }

    #[test]
    fn test_bad_limit_is_error() {
        let err = Profile::from_json(json!({"noise": {"laeq_limits_db": {"berlin": "loud"}}}))
            .unwrap_err();
        assert!(matches!(err, RulesError::InvalidValue { .. }));
    }

    #[test]
    fn test_segments_sorted_and_malformed_skipped() {
        let p = Profile::from_json(json!({"flicker": {"percent_mod_vs_freq": {"segments": [
            {"f_min": 200, "f_max": 1000, "a": 0.5, "b": 400},
            {"f_min": "80", "f_max": 120, "a": 0.1, "b": 600},
            {"f_min": 120, "f_max": 200},
            {"f_max": 10},
            "nonsense",
            {"f_min": 1000, "f_max": 10000, "max_percent": 8}
        ]}}}))
        .unwrap();
        let mins: Vec<f64> = p.flicker.curve.segments.iter().map(|s| s.f_min).collect();
        assert_eq!(mins, vec![80.0, 200.0, 1000.0]);
        assert_eq!(
            p.flicker.curve.segments[2].rule,
            SegmentRule::Cap { max_percent: 8.0 }
        );
    }

    #[test]
    fn test_ranges() {
        let p = Profile::from_json(json!({"flicker": {
            "clip_percent_mod_range": [0, 100],
            "percent_mod_vs_freq": {"clip_allowed_range": [1]}
        }}))
        .unwrap();
        assert_eq!(p.flicker.clip_measured, Some((0.0, 100.0)));
        assert_eq!(p.flicker.curve.clamp, None);
    }

    #[test]
    fn test_locale_resolution() {
        let p = Profile::from_json(json!({
            "locales": {"aliases": {"Köln": "Cologne", "muc": "munich"}},
            "noise": {"laeq_limits_db": {"munich": 50, "cologne": 52}}
        }))
        .unwrap();
        assert_eq!(p.resolve_locale(Some("  MUNICH ")).as_deref(), Some("munich"));
        assert_eq!(p.resolve_locale(Some("KÖLN")).as_deref(), Some("cologne"));
        assert_eq!(p.resolve_locale(Some("paris")).as_deref(), Some("paris"));
        assert_eq!(p.resolve_locale(Some("   ")), None);
        assert_eq!(p.resolve_locale(None), None);

        let resolved = p.noise_limit(Some("cologne"));
        assert_eq!((resolved.limit_db, resolved.source.as_str()), (52.0, "cologne"));
        let fallback = p.noise_limit(Some("paris"));
        assert_eq!((fallback.limit_db, fallback.source.as_str()), (55.0, "default"));
    }

    #[test]
    fn test_metadata_accepts_numbers() {
        let p = Profile::from_json(json!({"profile_id": "eu-residential", "schema_version": 2}))
            .unwrap();
        assert_eq!(p.profile_id.as_deref(), Some("eu-residential"));
        assert_eq!(p.schema_version.as_deref(), Some("2"));
    }

    #[test]
    fn test_load_profile_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(&path, r#"{"name": "berlin-night", "noise": {"laeq_limits_db": {"berlin": 45}}}"#)
            .unwrap();
        let p = load_profile(&path).unwrap();
        assert_eq!(p.name, "berlin-night");
        assert_eq!(p.noise.limits.get("berlin"), Some(&45.0));

        assert!(matches!(load_profile(dir.path().join("missing.json")), Err(RulesError::Io(_))));
    }
}
