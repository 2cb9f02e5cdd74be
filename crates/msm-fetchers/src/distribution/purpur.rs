//! PurpurMC's API mirrors PaperMC's shape closely enough that this fetcher
//! is a near-duplicate of `paper.rs`, but Purpur publishes the JAR's MD5
//! rather than SHA-256/512, so (as with vanilla) no digest is verified here
//! — only a successful, complete download.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DistributionFetcher, DistributionRequest};
use crate::download::{download_verified, FetchError, FetchedArtifact};

const API_BASE: &str = "https://api.purpurmc.org/v2/purpur";

pub struct PurpurFetcher;

#[derive(Deserialize)]
struct VersionDetail {
    builds: Builds,
}

#[derive(Deserialize)]
struct Builds {
    latest: String,
}

#[async_trait]
impl DistributionFetcher for PurpurFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: DistributionRequest<'_>,
    ) -> Result<FetchedArtifact, FetchError> {
        let version_url = format!("{API_BASE}/{}", request.version);
        let detail: VersionDetail = client.get(&version_url).send().await?.json().await?;

        let download_url = format!(
            "{API_BASE}/{}/{}/download",
            request.version, detail.builds.latest
        );
        let dest = request.dest_dir.join("server.jar");
        download_verified(client, &download_url, &dest, None).await
    }
}
