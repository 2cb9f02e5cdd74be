//! Internal database snapshot/restore, separate from the user-facing
//! `Backup` entity (which archives a managed server's world directory).
//!
//! Grounded on the teacher's db-backup flow (snapshot-before-migration,
//! restore-most-recent-on-corruption); the teacher compresses with `zstd`,
//! this crate uses `tar`+`flate2` gzip to share one archive format with the
//! world backups in `msm_supervisor` / `msm_services::backup`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use tracing::info;

fn db_backups_dir() -> PathBuf {
    msm_utils::paths::db_backups_dir()
}

/// Snapshot the database file before applying migrations.
pub fn backup_before_migration(db_path: &Path) -> std::io::Result<PathBuf> {
    snapshot(db_path, "pre-migration")
}

/// Snapshot the database file on an arbitrary schedule (periodic background
/// task; see `msm_services::db_backup_task`).
pub fn backup_scheduled(db_path: &Path) -> std::io::Result<PathBuf> {
    snapshot(db_path, "scheduled")
}

fn snapshot(db_path: &Path, reason: &str) -> std::io::Result<PathBuf> {
    let dir = db_backups_dir();
    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let archive_name = format!("msm-db-{reason}-{timestamp}.tar.gz");
    let archive_path = dir.join(&archive_name);

    let file_name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "msm.sqlite".into());

    let out = File::create(&archive_path)?;
    let enc = GzEncoder::new(out, Compression::default());
    let mut tar_builder = Builder::new(enc);
    let mut source = File::open(db_path)?;
    tar_builder.append_file(file_name, &mut source)?;
    tar_builder.into_inner()?.finish()?;

    info!(path = %archive_path.display(), "created database snapshot");
    prune_old_snapshots(&dir)?;
    Ok(archive_path)
}

/// Keep only the most recent snapshots so the backups directory doesn't
/// grow unbounded; the user-facing `Backup` entity has its own retention
/// policy, this is purely an internal safety net.
const MAX_RETAINED_SNAPSHOTS: usize = 10;

fn prune_old_snapshots(dir: &Path) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "gz").unwrap_or(false))
        .collect();
    entries.sort();
    if entries.len() > MAX_RETAINED_SNAPSHOTS {
        for old in &entries[..entries.len() - MAX_RETAINED_SNAPSHOTS] {
            let _ = std::fs::remove_file(old);
        }
    }
    Ok(())
}

/// Restore `db_path` from the most recent snapshot in the db-backups
/// directory. Returns `Ok(false)` if no snapshot exists.
pub fn restore_most_recent(db_path: &Path) -> std::io::Result<bool> {
    let dir = db_backups_dir();
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(&dir) {
        Ok(read) => read
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "gz").unwrap_or(false))
            .collect(),
        Err(_) => return Ok(false),
    };
    entries.sort();
    let Some(latest) = entries.pop() else {
        return Ok(false);
    };

    let corrupt_aside = db_path.with_extension("sqlite.corrupt");
    if db_path.exists() {
        std::fs::rename(db_path, &corrupt_aside)?;
    }

    let file = File::open(&latest)?;
    let dec = GzDecoder::new(BufReader::new(file));
    let mut archive = Archive::new(dec);
    let parent = db_path.parent().unwrap_or_else(|| Path::new("."));
    archive.unpack(parent)?;

    info!(from = %latest.display(), "restored database from snapshot");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn with_data_dir<F: FnOnce(&TempDir)>(f: F) {
        let dir = TempDir::new().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", dir.path()) };
        f(&dir);
        unsafe { std::env::remove_var("MSM_DATA_DIR") };
    }

    #[test]
    #[serial]
    fn snapshot_then_restore_roundtrips_file_contents() {
        with_data_dir(|dir| {
            let db_path = dir.path().join("msm.sqlite");
            std::fs::write(&db_path, b"SQLite format 3\0fake-db-contents").unwrap();

            let archive = backup_scheduled(&db_path).unwrap();
            assert!(archive.exists());

            std::fs::remove_file(&db_path).unwrap();
            let restored = restore_most_recent(&db_path).unwrap();
            assert!(restored);
            let contents = std::fs::read(&db_path).unwrap();
            assert_eq!(contents, b"SQLite format 3\0fake-db-contents");
        });
    }

    #[test]
    #[serial]
    fn restore_returns_false_when_no_snapshot_exists() {
        with_data_dir(|dir| {
            let db_path = dir.path().join("msm.sqlite");
            let restored = restore_most_recent(&db_path).unwrap();
            assert!(!restored);
        });
    }
}
