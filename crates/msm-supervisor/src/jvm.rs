//! JVM argv composition and jar-file resolution (§4.4, §4.8).
//!
//! Every distribution but Forge writes a ready-to-run `server.jar`; Forge's
//! fetcher writes an installer that must be run once with `--installServer`
//! (handled in `Supervisor::run_forge_installer`) before a real server jar
//! exists on disk, under a `forge-<version>-<loader-version>.jar`-style name
//! that varies by Forge version. No archive-parsing crate exists anywhere in
//! the corpus, so both jar-discovery paths here work by filename/size
//! convention rather than reading a jar's `Main-Class` manifest.

use std::path::{Path, PathBuf};

use msm_db::DistributionKind;

use crate::error::SupervisorError;

const VANILLA_JAR_NAME: &str = "server.jar";
const FORGE_INSTALLER_NAME: &str = "forge-installer.jar";

pub fn eula_accepted(working_directory: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(working_directory.join("eula.txt")) else {
        return false;
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .any(|line| line.eq_ignore_ascii_case("eula=true"))
}

/// The jar to pass to `-jar` for a distribution, relative to the server's
/// working directory (the process is spawned with that directory as cwd).
pub fn runnable_jar_path(working_directory: &Path, distribution: DistributionKind) -> PathBuf {
    match distribution {
        DistributionKind::Forge => find_forge_server_jar(working_directory)
            .unwrap_or_else(|| working_directory.join(FORGE_INSTALLER_NAME)),
        _ => working_directory.join(VANILLA_JAR_NAME),
    }
}

fn find_forge_server_jar(working_directory: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(working_directory).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jar"))
        .find(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.starts_with("forge-") && !name.contains("installer")
        })
}

pub fn compose_argv(
    runtime_path: &str,
    heap_size: &str,
    extra_args: Option<&str>,
    jar_path: &Path,
) -> Vec<String> {
    let mut argv = vec![
        runtime_path.to_string(),
        format!("-Xmx{heap_size}"),
        format!("-Xms{heap_size}"),
    ];
    if let Some(extra) = extra_args {
        argv.extend(extra.split_whitespace().map(str::to_string));
    }
    argv.push("-jar".to_string());
    argv.push(jar_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| jar_path.to_string_lossy().to_string()));
    argv.push("nogui".to_string());
    argv
}

/// `import`'s jar-discovery fallback (§4.4): `server.jar` if present, else
/// the largest `.jar` in the directory by file size.
pub fn find_importable_jar(path: &Path) -> Result<PathBuf, SupervisorError> {
    let server_jar = path.join(VANILLA_JAR_NAME);
    if server_jar.exists() {
        return Ok(server_jar);
    }

    let entries = std::fs::read_dir(path).map_err(SupervisorError::Filesystem)?;
    let largest = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "jar"))
        .filter_map(|p| std::fs::metadata(&p).ok().map(|m| (p, m.len())))
        .max_by_key(|(_, size)| *size)
        .map(|(p, _)| p);

    largest.ok_or_else(|| SupervisorError::NoImportableJar(path.to_string_lossy().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn eula_accepted_requires_an_uncommented_true_line() {
        let dir = tempdir().unwrap();
        assert!(!eula_accepted(dir.path()));

        std::fs::write(dir.path().join("eula.txt"), "#comment\neula=false\n").unwrap();
        assert!(!eula_accepted(dir.path()));

        std::fs::write(dir.path().join("eula.txt"), "#comment\neula=true\n").unwrap();
        assert!(eula_accepted(dir.path()));
    }

    #[test]
    fn runnable_jar_path_is_server_jar_for_non_forge_distributions() {
        let dir = tempdir().unwrap();
        let path = runnable_jar_path(dir.path(), DistributionKind::Paper);
        assert_eq!(path, dir.path().join("server.jar"));
    }

    #[test]
    fn runnable_jar_path_finds_the_installed_forge_server_jar() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("forge-installer.jar"), b"installer").unwrap();
        std::fs::write(dir.path().join("forge-1.20.4-49.0.0.jar"), b"server").unwrap();

        let path = runnable_jar_path(dir.path(), DistributionKind::Forge);
        assert_eq!(path.file_name().unwrap(), "forge-1.20.4-49.0.0.jar");
    }

    #[test]
    fn runnable_jar_path_falls_back_to_the_installer_before_install() {
        let dir = tempdir().unwrap();
        let path = runnable_jar_path(dir.path(), DistributionKind::Forge);
        assert_eq!(path.file_name().unwrap(), "forge-installer.jar");
    }

    #[test]
    fn compose_argv_orders_jvm_flags_before_the_jar_and_nogui_last() {
        let jar = Path::new("/srv/alpha/server.jar");
        let argv = compose_argv("/usr/bin/java", "2G", Some("-Dfoo=bar"), jar);
        assert_eq!(
            argv,
            vec!["/usr/bin/java", "-Xmx2G", "-Xms2G", "-Dfoo=bar", "-jar", "server.jar", "nogui"]
        );
    }

    #[test]
    fn find_importable_jar_prefers_server_jar() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("server.jar"), b"1").unwrap();
        std::fs::write(dir.path().join("other.jar"), vec![0u8; 100]).unwrap();
        assert_eq!(find_importable_jar(dir.path()).unwrap(), dir.path().join("server.jar"));
    }

    #[test]
    fn find_importable_jar_falls_back_to_the_largest_jar() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("small.jar"), vec![0u8; 10]).unwrap();
        std::fs::write(dir.path().join("big.jar"), vec![0u8; 1000]).unwrap();
        assert_eq!(find_importable_jar(dir.path()).unwrap(), dir.path().join("big.jar"));
    }

    #[test]
    fn find_importable_jar_errors_when_nothing_is_found() {
        let dir = tempdir().unwrap();
        assert!(find_importable_jar(dir.path()).is_err());
    }
}
