//! PaperMC's v2 API: resolve the latest build for a version, download the
//! published JAR, verify against the SHA-256 the API returns alongside it.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DistributionFetcher, DistributionRequest};
use crate::download::{download_verified, ExpectedDigest, FetchError, FetchedArtifact};
use crate::digest::DigestAlgorithm;

const API_BASE: &str = "https://api.papermc.io/v2/projects/paper";

pub struct PaperFetcher;

#[derive(Deserialize)]
struct BuildsResponse {
    builds: Vec<u32>,
}

#[derive(Deserialize)]
struct BuildDetail {
    downloads: Downloads,
}

#[derive(Deserialize)]
struct Downloads {
    application: Application,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    sha256: String,
}

#[async_trait]
impl DistributionFetcher for PaperFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: DistributionRequest<'_>,
    ) -> Result<FetchedArtifact, FetchError> {
        let builds_url = format!("{API_BASE}/versions/{}/builds", request.version);
        let builds: BuildsResponse = client.get(&builds_url).send().await?.json().await?;
        let latest_build = builds
            .builds
            .into_iter()
            .max()
            .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

        let detail_url = format!("{API_BASE}/versions/{}/builds/{latest_build}", request.version);
        let detail: BuildDetail = client.get(&detail_url).send().await?.json().await?;

        let download_url = format!(
            "{API_BASE}/versions/{}/builds/{latest_build}/downloads/{}",
            request.version, detail.downloads.application.name
        );
        let dest = request.dest_dir.join("server.jar");
        download_verified(
            client,
            &download_url,
            &dest,
            Some(ExpectedDigest {
                algorithm: DigestAlgorithm::Sha256,
                hex: detail.downloads.application.sha256,
            }),
        )
        .await
    }
}
