//! JDK runtime fetcher, used when a server is created without an explicit
//! `runtime_path` and no discovered runtime on the host satisfies the
//! distribution's minimum Java version. Resolves against Eclipse
//! Temurin's (Adoptium) public API, which publishes a SHA-256 checksum URL
//! alongside each binary.

use std::path::Path;

use serde::Deserialize;

use crate::digest::DigestAlgorithm;
use crate::download::{download_verified, ExpectedDigest, FetchError, FetchedArtifact};

const API_BASE: &str = "https://api.adoptium.net/v3/assets/latest";

#[derive(Deserialize)]
struct AssetEntry {
    binary: Binary,
}

#[derive(Deserialize)]
struct Binary {
    package: Package,
}

#[derive(Deserialize)]
struct Package {
    link: String,
    checksum: Option<String>,
}

fn os_name() -> &'static str {
    if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "windows"
    }
}

fn arch_name() -> &'static str {
    if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else {
        "x64"
    }
}

pub async fn fetch_runtime(
    client: &reqwest::Client,
    major_version: u32,
    dest_dir: &Path,
) -> Result<FetchedArtifact, FetchError> {
    let url = format!(
        "{API_BASE}/{major_version}/hotspot?architecture={}&image_type=jdk&os={}",
        arch_name(),
        os_name()
    );
    let assets: Vec<AssetEntry> = client.get(&url).send().await?.json().await?;
    let asset = assets
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::BadStatus(reqwest::StatusCode::NOT_FOUND))?;

    let archive_name = if cfg!(target_os = "windows") { "jdk.zip" } else { "jdk.tar.gz" };
    let dest = dest_dir.join(archive_name);
    let expected = asset
        .binary
        .package
        .checksum
        .map(|hex| ExpectedDigest { algorithm: DigestAlgorithm::Sha256, hex });

    download_verified(client, &asset.binary.package.link, &dest, expected).await
}
