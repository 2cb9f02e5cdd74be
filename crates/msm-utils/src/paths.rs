//! Data-directory resolution (§6).
//!
//! Mirrors the teacher's `utils::assets` module: a single OS-appropriate
//! root directory, with every other path (database, servers, backups,
//! runtimes, config) derived from it and overridable via environment
//! variables for tests and unusual deployments.

use std::path::PathBuf;

use directories::ProjectDirs;

fn project_dirs() -> ProjectDirs {
    ProjectDirs::from("com", "msm", "msm").expect("OS didn't give us a home directory")
}

/// Root of all persistent msm state.
///
/// - Windows: `%APPDATA%\msm`
/// - Linux: `$XDG_DATA_HOME/msm` or `~/.local/share/msm`
/// - macOS: `~/Library/Application Support/msm`
///
/// Respects `MSM_DATA_DIR` for tests and custom deployments.
pub fn data_root() -> PathBuf {
    let path = if let Ok(dir) = std::env::var("MSM_DATA_DIR") {
        PathBuf::from(dir)
    } else {
        project_dirs().data_dir().to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("failed to create msm data directory");
    }

    path
}

pub fn database_path() -> PathBuf {
    if let Ok(path) = std::env::var("MSM_DATABASE_PATH") {
        return PathBuf::from(path);
    }
    data_root().join("msm.sqlite")
}

pub fn servers_dir() -> PathBuf {
    let dir = data_root().join("servers");
    ensure_dir(&dir);
    dir
}

pub fn backups_dir() -> PathBuf {
    let dir = data_root().join("backups");
    ensure_dir(&dir);
    dir
}

pub fn runtimes_dir() -> PathBuf {
    let dir = data_root().join("runtimes");
    ensure_dir(&dir);
    dir
}

pub fn db_backups_dir() -> PathBuf {
    let dir = data_root().join("db_backups");
    ensure_dir(&dir);
    dir
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

/// Working directory for a single managed server, `servers/<name>/`.
pub fn server_dir(name: &str) -> PathBuf {
    servers_dir().join(name)
}

fn ensure_dir(path: &PathBuf) {
    if !path.exists() {
        std::fs::create_dir_all(path).expect("failed to create msm subdirectory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn database_path_default_is_under_data_root() {
        let tmp = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };
        unsafe { std::env::remove_var("MSM_DATABASE_PATH") };
        let path = database_path();
        unsafe { std::env::remove_var("MSM_DATA_DIR") };
        assert_eq!(path, tmp.path().join("msm.sqlite"));
    }

    #[test]
    #[serial]
    fn server_dir_is_nested_under_servers() {
        let tmp = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };
        let dir = server_dir("alpha");
        unsafe { std::env::remove_var("MSM_DATA_DIR") };
        assert_eq!(dir, tmp.path().join("servers").join("alpha"));
    }
}
