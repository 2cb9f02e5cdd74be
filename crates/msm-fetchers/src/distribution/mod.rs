//! Per-distribution-kind JAR fetchers (§4.8).
//!
//! Generalized from the teacher's per-coding-agent adapter layout
//! (`executors/claude.rs`, `executors/gemini.rs`, one module per backend
//! sharing a common trait) to one module per `DistributionKind`.

mod fabric;
mod forge;
mod paper;
mod purpur;
mod vanilla;

use std::path::Path;

use async_trait::async_trait;

use crate::download::{FetchError, FetchedArtifact};

/// What C5 asks a distribution fetcher to resolve into a downloaded JAR.
pub struct DistributionRequest<'a> {
    pub version: &'a str,
    pub dest_dir: &'a Path,
}

#[async_trait]
pub trait DistributionFetcher: Send + Sync {
    /// Resolve `version` against the upstream registry/manifest and download
    /// the server JAR into `dest_dir`, verifying any published digest.
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: DistributionRequest<'_>,
    ) -> Result<FetchedArtifact, FetchError>;
}

pub fn fetcher_for(kind: msm_db::DistributionKind) -> Box<dyn DistributionFetcher> {
    match kind {
        msm_db::DistributionKind::Vanilla => Box::new(vanilla::VanillaFetcher),
        msm_db::DistributionKind::Paper => Box::new(paper::PaperFetcher),
        msm_db::DistributionKind::Purpur => Box::new(purpur::PurpurFetcher),
        msm_db::DistributionKind::Fabric => Box::new(fabric::FabricFetcher),
        msm_db::DistributionKind::Forge => Box::new(forge::ForgeFetcher),
    }
}
