//! `discover_runtimes` (§4.1, §6): scan known JDK/JRE install locations and
//! the supervisor's own `runtimes/` directory, invoking each candidate with
//! `-version` and parsing the banner.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredRuntime {
    pub path: PathBuf,
    pub major_version: u32,
    pub vendor: String,
    pub is_development_kit: bool,
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            candidates.push(dir.join(java_binary_name()));
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(entries) = std::fs::read_dir("/usr/lib/jvm") {
            for entry in entries.flatten() {
                candidates.push(entry.path().join("bin").join(java_binary_name()));
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(entries) = std::fs::read_dir("/Library/Java/JavaVirtualMachines") {
            for entry in entries.flatten() {
                candidates.push(
                    entry
                        .path()
                        .join("Contents")
                        .join("Home")
                        .join("bin")
                        .join(java_binary_name()),
                );
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        for base in ["C:\\Program Files", "C:\\Program Files (x86)"] {
            if let Ok(vendors) = std::fs::read_dir(base) {
                for vendor in vendors.flatten() {
                    if let Ok(versions) = std::fs::read_dir(vendor.path()) {
                        for version in versions.flatten() {
                            candidates.push(version.path().join("bin").join(java_binary_name()));
                        }
                    }
                }
            }
        }
    }

    candidates.push(msm_utils::paths::runtimes_dir().join("bin").join(java_binary_name()));

    candidates
}

fn java_binary_name() -> &'static str {
    if cfg!(windows) { "java.exe" } else { "java" }
}

/// Scan known paths, invoke each candidate with `-version`, and parse the
/// first three-dotted token from the stderr banner. Duplicate canonical
/// paths are deduplicated before the caller sees them.
pub fn discover() -> Vec<DiscoveredRuntime> {
    let mut seen = std::collections::HashSet::new();
    let mut runtimes = Vec::new();

    for candidate in candidate_paths() {
        if !candidate.is_file() {
            continue;
        }
        let canonical = candidate.canonicalize().unwrap_or(candidate.clone());
        if !seen.insert(canonical.clone()) {
            continue;
        }
        if let Some(runtime) = probe(&canonical) {
            runtimes.push(runtime);
        }
    }

    runtimes
}

fn probe(path: &Path) -> Option<DiscoveredRuntime> {
    let output = Command::new(path).arg("-version").output().ok()?;
    let banner = String::from_utf8_lossy(&output.stderr);
    let (major_version, vendor) = parse_version_banner(&banner)?;
    let is_development_kit = path
        .parent()
        .and_then(|bin| bin.parent())
        .map(|home| home.join("bin").join(if cfg!(windows) { "javac.exe" } else { "javac" }).is_file())
        .unwrap_or(false);

    Some(DiscoveredRuntime {
        path: path.to_path_buf(),
        major_version,
        vendor,
        is_development_kit,
    })
}

/// Parses banners like `openjdk version "21.0.1" 2023-10-17` or
/// `java version "1.8.0_392"` into a major version number, folding the
/// legacy `1.X` scheme down to `X`.
fn parse_version_banner(banner: &str) -> Option<(u32, String)> {
    let first_line = banner.lines().next()?;
    let vendor = first_line.split_whitespace().next().unwrap_or("unknown").to_string();

    let quote_start = first_line.find('"')? + 1;
    let rest = &first_line[quote_start..];
    let quote_end = rest.find('"')?;
    let version_token = &rest[..quote_end];

    let mut parts = version_token.split('.');
    let first: u32 = parts.next()?.parse().ok()?;
    let major = if first == 1 {
        parts.next()?.parse().ok()?
    } else {
        first
    };

    Some((major, vendor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_openjdk_banner() {
        let banner = "openjdk version \"21.0.1\" 2023-10-17\nOpenJDK Runtime Environment (build 21.0.1+12)\n";
        let (major, vendor) = parse_version_banner(banner).unwrap();
        assert_eq!(major, 21);
        assert_eq!(vendor, "openjdk");
    }

    #[test]
    fn parses_legacy_1_x_banner() {
        let banner = "java version \"1.8.0_392\"\n";
        let (major, vendor) = parse_version_banner(banner).unwrap();
        assert_eq!(major, 8);
        assert_eq!(vendor, "java");
    }

    #[test]
    fn rejects_banner_without_quoted_version() {
        assert!(parse_version_banner("not a java banner").is_none());
    }
}
