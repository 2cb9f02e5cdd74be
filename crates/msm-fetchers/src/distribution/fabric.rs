//! Fabric's installer/meta API: pin the loader to the newest stable release,
//! ask the meta server for a server-launch JAR for `<game-version>` +
//! `<loader-version>` + `<installer-version>`.

use async_trait::async_trait;
use serde::Deserialize;

use super::{DistributionFetcher, DistributionRequest};
use crate::download::{download_verified, FetchError, FetchedArtifact};

const META_BASE: &str = "https://meta.fabricmc.net/v2/versions";

pub struct FabricFetcher;

#[derive(Deserialize)]
struct LoaderVersion {
    loader: LoaderDetail,
}

#[derive(Deserialize)]
struct LoaderDetail {
    version: String,
    stable: bool,
}

#[derive(Deserialize)]
struct InstallerVersion {
    version: String,
    stable: bool,
}

#[async_trait]
impl DistributionFetcher for FabricFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: DistributionRequest<'_>,
    ) -> Result<FetchedArtifact, FetchError> {
        let loaders_url = format!("{META_BASE}/loader/{}", request.version);
        let loaders: Vec<LoaderVersion> = client.get(&loaders_url).send().await?.json().await?;
        let loader = loaders
            .iter()
            .find(|l| l.loader.stable)
            .or_else(|| loaders.first())
            .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

        let installers: Vec<InstallerVersion> = client
            .get(format!("{META_BASE}/installer"))
            .send()
            .await?
            .json()
            .await?;
        let installer = installers
            .iter()
            .find(|i| i.stable)
            .or_else(|| installers.first())
            .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

        let download_url = format!(
            "{META_BASE}/loader/{}/{}/{}/server/jar",
            request.version, loader.loader.version, installer.version
        );
        let dest = request.dest_dir.join("server.jar");
        download_verified(client, &download_url, &dest, None).await
    }
}
