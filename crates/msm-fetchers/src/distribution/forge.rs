//! Forge has no JSON metadata API, only a Maven `maven-metadata.xml` index
//! and an installer JAR (not a ready-to-run server JAR — the installer must
//! be run with `--installServer`, which the Lifecycle Engine handles as a
//! one-time step before the first `start`). No dependency in the teacher's
//! or pack's stack parses XML, so this does the minimal string scan needed
//! to pull `<version>` entries out of the metadata document rather than
//! pulling in a new crate for one field.

use async_trait::async_trait;

use super::{DistributionFetcher, DistributionRequest};
use crate::download::{download_verified, FetchError, FetchedArtifact};

const METADATA_URL: &str =
    "https://maven.minecraftforge.net/net/minecraftforge/forge/maven-metadata.xml";

pub struct ForgeFetcher;

fn newest_build_for_version(metadata_xml: &str, mc_version: &str) -> Option<String> {
    metadata_xml
        .split("<version>")
        .skip(1)
        .filter_map(|chunk| chunk.split("</version>").next())
        .filter(|v| v.starts_with(&format!("{mc_version}-")))
        .last()
        .map(|v| v.to_string())
}

#[async_trait]
impl DistributionFetcher for ForgeFetcher {
    async fn fetch(
        &self,
        client: &reqwest::Client,
        request: DistributionRequest<'_>,
    ) -> Result<FetchedArtifact, FetchError> {
        let metadata = client.get(METADATA_URL).send().await?.text().await?;
        let build = newest_build_for_version(&metadata, request.version)
            .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

        let download_url = format!(
            "https://maven.minecraftforge.net/net/minecraftforge/forge/{build}/forge-{build}-installer.jar"
        );
        let dest = request.dest_dir.join("forge-installer.jar");
        download_verified(client, &download_url, &dest, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_last_matching_build_for_the_requested_version() {
        let metadata = "<versions><version>1.20.1-47.1.0</version><version>1.20.1-47.2.0</version><version>1.20.2-48.0.0</version></versions>";
        assert_eq!(
            newest_build_for_version(metadata, "1.20.1"),
            Some("1.20.1-47.2.0".to_string())
        );
    }

    #[test]
    fn returns_none_when_no_build_matches() {
        let metadata = "<versions><version>1.20.2-48.0.0</version></versions>";
        assert_eq!(newest_build_for_version(metadata, "1.20.1"), None);
    }
}
