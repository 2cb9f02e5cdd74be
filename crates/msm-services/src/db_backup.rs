//! Periodic `msm.sqlite` snapshotting (§2.2 supplemented features),
//! distinct from the user-facing `Backup` entity — this guards the
//! supervisor's own bookkeeping database, not a managed server's world.
//!
//! Same `tokio::time::interval` + `mpsc` control-channel shape as
//! [`crate::reconciler`] and [`crate::scheduler`].

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

enum DbBackupCommand {
    RunNow,
    Shutdown,
}

#[derive(Clone)]
pub struct DbBackupHandle {
    tx: mpsc::Sender<DbBackupCommand>,
}

impl DbBackupHandle {
    pub async fn run_now(&self) {
        let _ = self.tx.send(DbBackupCommand::RunNow).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(DbBackupCommand::Shutdown).await;
    }
}

pub struct DbBackupTask {
    db_path: PathBuf,
    interval: Duration,
}

impl DbBackupTask {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path, interval: DEFAULT_BACKUP_INTERVAL }
    }

    pub fn spawn(self) -> DbBackupHandle {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(self.run(rx));
        DbBackupHandle { tx }
    }

    async fn run(self, mut rx: mpsc::Receiver<DbBackupCommand>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // first tick fires immediately; don't snapshot on startup

        loop {
            tokio::select! {
                _ = ticker.tick() => self.snapshot().await,
                cmd = rx.recv() => match cmd {
                    Some(DbBackupCommand::RunNow) => self.snapshot().await,
                    Some(DbBackupCommand::Shutdown) | None => break,
                },
            }
        }
    }

    async fn snapshot(&self) {
        let db_path = self.db_path.clone();
        let result = tokio::task::spawn_blocking(move || msm_db::sqlite_backup::backup_scheduled(&db_path)).await;
        match result {
            Ok(Ok(path)) => info!(path = %path.display(), "periodic database snapshot completed"),
            Ok(Err(e)) => error!(error = %e, "periodic database snapshot failed"),
            Err(e) => error!(error = %e, "periodic database snapshot task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn run_now_produces_a_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };

        let db_path = tmp.path().join("msm.sqlite");
        std::fs::write(&db_path, b"SQLite format 3\0fake").unwrap();

        let handle = DbBackupTask::new(db_path).spawn();
        handle.run_now().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        let backups = std::fs::read_dir(msm_utils::paths::db_backups_dir()).unwrap().count();
        assert!(backups >= 1);

        unsafe { std::env::remove_var("MSM_DATA_DIR") };
    }
}
