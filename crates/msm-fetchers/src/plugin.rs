//! Plugin fetchers, one per `PluginSource` (§3, §4.8). Modrinth publishes a
//! SHA-512 per file, which digest-verified downloads use directly; Hangar
//! does not publish a digest on its public download endpoint, and a bare
//! `Url` source carries none either, so both fall back to download-without-
//! digest like the non-SHA-256/512 distribution fetchers.

use std::path::Path;

use serde::Deserialize;

use crate::download::{download_verified, ExpectedDigest, FetchError, FetchedArtifact};
use crate::digest::DigestAlgorithm;

pub struct PluginRequest<'a> {
    pub project_id: Option<&'a str>,
    pub version: Option<&'a str>,
    pub url: Option<&'a str>,
    pub dest_dir: &'a Path,
}

#[derive(Deserialize)]
struct ModrinthVersion {
    files: Vec<ModrinthFile>,
}

#[derive(Deserialize)]
struct ModrinthFile {
    url: String,
    filename: String,
    hashes: ModrinthHashes,
}

#[derive(Deserialize)]
struct ModrinthHashes {
    sha512: Option<String>,
}

pub async fn fetch_modrinth(
    client: &reqwest::Client,
    request: PluginRequest<'_>,
) -> Result<FetchedArtifact, FetchError> {
    let project_id = request
        .project_id
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::BAD_REQUEST))?;

    let versions_url = format!("https://api.modrinth.com/v2/project/{project_id}/version");
    let versions: Vec<ModrinthVersion> = client.get(&versions_url).send().await?.json().await?;
    let version = versions
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;
    let file = version
        .files
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

    let dest = request.dest_dir.join(&file.filename);
    let expected = file.hashes.sha512.map(|hex| ExpectedDigest { algorithm: DigestAlgorithm::Sha512, hex });
    download_verified(client, &file.url, &dest, expected).await
}

#[derive(Deserialize)]
struct HangarLatestVersion {
    name: String,
}

pub async fn fetch_hangar(
    client: &reqwest::Client,
    request: PluginRequest<'_>,
) -> Result<FetchedArtifact, FetchError> {
    let project_id = request
        .project_id
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::BAD_REQUEST))?;

    let version = match request.version {
        Some(v) => v.to_string(),
        None => {
            let latest_url = format!("https://hangar.papermc.io/api/v1/projects/{project_id}/latest");
            let latest: HangarLatestVersion = client.get(&latest_url).send().await?.json().await?;
            latest.name
        }
    };

    let download_url =
        format!("https://hangar.papermc.io/api/v1/projects/{project_id}/versions/{version}/PAPER/download");
    let dest = request.dest_dir.join(format!("{project_id}-{version}.jar"));
    download_verified(client, &download_url, &dest, None).await
}

pub async fn fetch_url(
    client: &reqwest::Client,
    request: PluginRequest<'_>,
) -> Result<FetchedArtifact, FetchError> {
    let url = request
        .url
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::BAD_REQUEST))?;
    let filename = url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("plugin.jar");
    let dest = request.dest_dir.join(filename);
    download_verified(client, url, &dest, None).await
}
