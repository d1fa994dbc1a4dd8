//! # AV-SAFE Ledger Testkit
//!
//! Testing utilities for the AV-SAFE ledger.
//!
//! - **Golden vectors**: fixed payloads with their canonical bytes, chain
//!   hashes and signatures, for cross-implementation checks
//! - **Generators**: proptest strategies for payloads, chains and tampering
//! - **Fixtures**: seeded synthetic minute descriptors with optional spikes
//!
//! ## Golden Vectors
//!
//! ```rust
//! use avsafe_ledger_testkit::vectors::{all_vectors, check_vector};
//!
//! for vector in all_vectors() {
//!     check_vector(&vector).unwrap();
//! }
//! ```
//!
//! ## Fixtures
//!
//! ```rust
//! use avsafe_ledger_testkit::fixtures::{MinuteFixture, Spike};
//! use avsafe_ledger_core::HashAlg;
//!
//! let mut fixture = MinuteFixture::new(42).audio_spike(Spike::new(10, 3, 20.0));
//! let records = fixture.chain(30, HashAlg::Sha256).unwrap();
//! assert_eq!(records.len(), 30);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{device_fixtures, MinuteFixture, Spike};
pub use generators::{build_chain, Tamper};
pub use vectors::{all_vectors, check_vector, verify_all_vectors, GoldenVector};
