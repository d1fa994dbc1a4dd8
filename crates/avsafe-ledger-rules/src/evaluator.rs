//! Compliance evaluation of a descriptor stream against a [`Profile`].
//!
//! Evaluation is independent of the ledger: it reads payload fields and
//! never looks at chain blocks. It always runs to completion; records with
//! missing or non-numeric fields simply do not contribute samples.

use std::collections::BTreeMap;

use avsafe_ledger_core::Payload;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curve::{classify_modulation, ModulationStatus};
use crate::profile::Profile;
use crate::stats::{mean, pct_over, percentile_sorted};

/// Flag emitted when the input holds no records.
pub const NO_DATA_FLAG: &str = "no data";

/// Percentile label to value (`None` when the sample is empty).
pub type Percentiles = BTreeMap<String, Option<f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseStats {
    pub limit_db: f64,
    /// Share of samples strictly above `limit_db`, in percent.
    pub pct_over: f64,
    pub mean_db: Option<f64>,
    pub samples: usize,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlickerStats {
    /// Records carrying both a frequency and a modulation depth.
    pub evaluated: usize,
    pub violations: usize,
    pub pct_violations: f64,
    pub percentiles: Percentiles,
}

/// How the evaluation was parameterized, for auditability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub profile_id: Option<String>,
    pub schema_version: Option<String>,
    pub locale_requested: Option<String>,
    pub locale_resolved: Option<String>,
    pub noise_limit_source: Option<String>,
    pub display_percentiles: Vec<f64>,
}

/// Result of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub n_records: usize,
    pub flags: Vec<String>,
    /// `None` only for an empty input.
    pub noise: Option<NoiseStats>,
    pub flicker: Option<FlickerStats>,
    pub trace: Trace,
}

/// A single out-of-bounds observation on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    NoiseOverLimit { laeq_db: f64, limit_db: f64 },
    FlickerExceedsCurve { freq_hz: f64, measured: f64, allowed: f64 },
}

/// Findings for one record, by stream index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFindings {
    pub index: usize,
    pub findings: Vec<Finding>,
}

/// Sound level: `audio.laeq_db`, else flat `laeq_db`.
pub fn sound_level(payload: &Payload) -> Option<f64> {
    field(payload, &["audio", "laeq_db"], "laeq_db")
}

/// Dominant flicker frequency: `light.tlm_freq_hz`, else flat `tlm_f_dom_hz`.
pub fn flicker_freq(payload: &Payload) -> Option<f64> {
    field(payload, &["light", "tlm_freq_hz"], "tlm_f_dom_hz")
}

/// Modulation depth: `light.tlm_mod_percent`, else flat `tlm_percent_mod`.
pub fn modulation(payload: &Payload) -> Option<f64> {
    field(payload, &["light", "tlm_mod_percent"], "tlm_percent_mod")
}

fn field(payload: &Payload, path: &[&str], flat: &str) -> Option<f64> {
    payload
        .get_path(path)
        .and_then(|v| v.as_finite_f64())
        .or_else(|| payload.get(flat).and_then(|v| v.as_finite_f64()))
}

/// Evaluate a stream of payloads.
pub fn evaluate<'a, I>(payloads: I, profile: &Profile, locale: Option<&str>) -> EvaluationResult
where
    I: IntoIterator<Item = &'a Payload>,
{
    let payloads: Vec<&Payload> = payloads.into_iter().collect();
    let mut trace = Trace {
        profile_id: profile.profile_id.clone(),
        schema_version: profile.schema_version.clone(),
        locale_requested: locale.map(str::to_owned),
        ..Trace::default()
    };

    if payloads.is_empty() {
        return EvaluationResult {
            n_records: 0,
            flags: vec![NO_DATA_FLAG.to_owned()],
            noise: None,
            flicker: None,
            trace,
        };
    }

    let resolved = profile.resolve_locale(locale);
    let limit = profile.noise_limit(resolved.as_deref());
    trace.locale_resolved = resolved;
    trace.noise_limit_source = Some(limit.source.clone());
    trace.display_percentiles = profile.display_percentiles.clone();

    let mut flags = Vec::new();

    let levels: Vec<f64> = payloads.iter().filter_map(|p| sound_level(p)).collect();
    let noise = NoiseStats {
        limit_db: limit.limit_db,
        pct_over: pct_over(&levels, limit.limit_db),
        mean_db: mean(&levels),
        samples: levels.len(),
        percentiles: percentiles(&levels, &profile.display_percentiles),
    };
    if noise.pct_over > profile.noise.flag_threshold_pct {
        flags.push(format!(
            "Noise: LAeq > {:.0} dB in {:.1}% of minutes",
            noise.limit_db, noise.pct_over
        ));
    }

    let mut depths = Vec::new();
    let mut violations = 0usize;
    for payload in &payloads {
        let (Some(f_hz), Some(measured)) = (flicker_freq(payload), modulation(payload)) else {
            continue;
        };
        let measured = clip_measured(measured, profile);
        depths.push(measured);
        if classify_modulation(f_hz, measured, &profile.flicker.curve).status
            == ModulationStatus::Exceeds
        {
            violations += 1;
        }
    }
    let evaluated = depths.len();
    let pct_violations = if evaluated == 0 {
        0.0
    } else {
        100.0 * violations as f64 / evaluated as f64
    };
    let flicker = FlickerStats {
        evaluated,
        violations,
        pct_violations,
        percentiles: percentiles(&depths, &profile.display_percentiles),
    };
    if flicker.pct_violations > profile.flicker.flag_threshold_pct {
        flags.push(format!(
            "Flicker: {:.1}% minutes exceed IEEE-1789 curve",
            flicker.pct_violations
        ));
    }

    dedup_in_order(&mut flags);
    debug!(
        n_records = payloads.len(),
        noise_samples = noise.samples,
        flicker_evaluated = evaluated,
        flags = flags.len(),
        "evaluation complete"
    );

    EvaluationResult {
        n_records: payloads.len(),
        flags,
        noise: Some(noise),
        flicker: Some(flicker),
        trace,
    }
}

/// Per-record findings for drill-down reporting. Records without findings
/// are omitted.
pub fn record_findings<'a, I>(payloads: I, profile: &Profile, locale: Option<&str>) -> Vec<RecordFindings>
where
    I: IntoIterator<Item = &'a Payload>,
{
    let resolved = profile.resolve_locale(locale);
    let limit_db = profile.noise_limit(resolved.as_deref()).limit_db;

    payloads
        .into_iter()
        .enumerate()
        .filter_map(|(index, payload)| {
            let mut findings = Vec::new();
            if let Some(laeq_db) = sound_level(payload) {
                if laeq_db > limit_db {
                    findings.push(Finding::NoiseOverLimit { laeq_db, limit_db });
                }
            }
            if let (Some(freq_hz), Some(raw)) = (flicker_freq(payload), modulation(payload)) {
                let c = classify_modulation(freq_hz, clip_measured(raw, profile), &profile.flicker.curve);
                if c.status == ModulationStatus::Exceeds {
                    findings.push(Finding::FlickerExceedsCurve {
                        freq_hz,
                        measured: c.measured,
                        allowed: c.allowed,
                    });
                }
            }
            (!findings.is_empty()).then_some(RecordFindings { index, findings })
        })
        .collect()
}

fn clip_measured(measured: f64, profile: &Profile) -> f64 {
    match profile.flicker.clip_measured {
        Some((lo, hi)) => measured.max(lo).min(hi),
        None => measured,
    }
}

fn percentiles(sample: &[f64], requested: &[f64]) -> Percentiles {
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);
    requested
        .iter()
        .map(|p| {
            let value = percentile_sorted(&sorted, *p);
            (format!("p{}", p), value)
        })
        .collect()
}

fn dedup_in_order(flags: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    flags.retain(|f| seen.insert(f.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(json: serde_json::Value) -> Payload {
        Payload::try_from(json).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let profile = Profile::default();
        let result = evaluate(std::iter::empty(), &profile, Some("munich"));
        assert_eq!(result.n_records, 0);
        assert_eq!(result.flags, vec!["no data".to_owned()]);
        assert!(result.noise.is_none());
        assert!(result.flicker.is_none());
        assert_eq!(result.trace.locale_requested.as_deref(), Some("munich"));
    }

    #[test]
    fn test_flat_field_fallbacks() {
        let p = payload(json!({"laeq_db": 61, "tlm_f_dom_hz": 100.0, "tlm_percent_mod": "7"}));
        assert_eq!(sound_level(&p), Some(61.0));
        assert_eq!(flicker_freq(&p), Some(100.0));
        // Strings are not numbers in records.
        assert_eq!(modulation(&p), None);
    }

    #[test]
    fn test_nested_fields_win() {
        let p = payload(json!({"audio": {"laeq_db": 40.0}, "laeq_db": 90.0}));
        assert_eq!(sound_level(&p), Some(40.0));
    }

    #[test]
    fn test_bool_is_not_a_level() {
        let p = payload(json!({"audio": {"laeq_db": true}}));
        assert_eq!(sound_level(&p), None);
    }

    #[test]
    fn test_percentile_labels() {
        let map = percentiles(&[1.0, 2.0, 3.0], &[50.0, 97.5]);
        assert_eq!(map.get("p50"), Some(&Some(2.0)));
        assert!(map.contains_key("p97.5"));
        let empty = percentiles(&[], &[50.0]);
        assert_eq!(empty.get("p50"), Some(&None));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut flags = vec!["a".to_owned(), "b".to_owned(), "a".to_owned()];
        dedup_in_order(&mut flags);
        assert_eq!(flags, vec!["a".to_owned(), "b".to_owned()]);
    }
}
