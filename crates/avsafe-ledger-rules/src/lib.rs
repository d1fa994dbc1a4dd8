//! # AV-SAFE Ledger Rules
//!
//! Compliance evaluation over descriptor records: LAeq noise limits per
//! locale and temporal light modulation against a frequency-dependent
//! curve.
//!
//! ## Key Types
//!
//! - [`Profile`] - Normalized thresholds, loaded with [`load_profile`]
//! - [`FlickerCurve`] - Allowed modulation depth by frequency
//! - [`EvaluationResult`] - Aggregate statistics, flags and trace
//!
//! The evaluator reads payloads only. It neither trusts nor checks the
//! chain; pair it with `avsafe_ledger_core::verify_chain` for that.

pub mod curve;
pub mod error;
pub mod evaluator;
pub mod profile;
pub mod stats;

pub use curve::{classify_modulation, Classification, FlickerCurve, ModulationStatus, Segment, SegmentRule};
pub use error::{Result, RulesError};
pub use evaluator::{
    evaluate, record_findings, EvaluationResult, Finding, FlickerStats, NoiseStats, RecordFindings,
    Trace, NO_DATA_FLAG,
};
pub use profile::{load_profile, FlickerRules, NoiseRules, Profile, ResolvedLimit};
