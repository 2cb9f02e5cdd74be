//! External Fetchers (C8, §4.8).
//!
//! Grounded on the teacher's `executors` crate's per-kind pluggable module
//! layout (`executors/claude.rs`, `executors/gemini.rs`, …), generalized here
//! from "per-coding-agent adapter" to "per-distribution-kind download
//! client" (`distribution/paper.rs`, `distribution/vanilla.rs`, …), and on
//! the teacher's own `backon` dependency (declared in `crates/db` and
//! `crates/executors`) for the retry policy this spec names explicitly.

pub mod digest;
pub mod distribution;
pub mod download;
pub mod plugin;
pub mod runtime;

pub use digest::DigestAlgorithm;
pub use distribution::{fetcher_for, DistributionFetcher, DistributionRequest};
pub use download::{download_verified, ExpectedDigest, FetchError, FetchedArtifact};
pub use plugin::PluginRequest;
pub use runtime::fetch_runtime;
