//! Data Store Gateway (C2, §4.2).
//!
//! Grounded on `crates/db/src/lib.rs` from the teacher: `DBService` pool
//! construction with tuned pragmas, a migration runner guarded by sqlx's own
//! migration table, and a `PRAGMA quick_check` corruption probe with
//! restore-from-backup recovery. The teacher's zstd-compressed snapshot
//! backup is reimplemented in `sqlite_backup` using gzip (`tar`+`flate2`) to
//! match the one compression stack this spec actually names for the
//! (separate, user-facing) `Backup` entity.

pub mod models;
pub mod sqlite_backup;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{error, info, warn};

pub use models::*;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

async fn apply_performance_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    conn.execute("PRAGMA temp_store = 2").await?;
    conn.execute("PRAGMA mmap_size = 67108864").await?;
    // Must be set after mmap_size: see teacher's db/src/lib.rs for why
    // ordering matters (mmap can otherwise bypass fsync guarantees).
    conn.execute("PRAGMA synchronous = NORMAL").await?;
    conn.execute("PRAGMA cache_size = -64000").await?;
    conn.execute("PRAGMA wal_autocheckpoint = 2000").await?;
    Ok(())
}

async fn connect_pool(db_path: &std::path::Path) -> Result<Pool<Sqlite>, sqlx::Error> {
    let database_url = format!("sqlite://{}", db_path.to_string_lossy());
    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS));

    SqlitePoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .min_connections(DEFAULT_MIN_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)))
        .after_connect(|conn, _meta| Box::pin(async move { apply_performance_pragmas(conn).await }))
        .connect_with(options)
        .await
}

async fn quick_check(pool: &Pool<Sqlite>) -> Result<String, sqlx::Error> {
    sqlx::query_scalar("PRAGMA quick_check").fetch_one(pool).await
}

#[derive(Clone)]
pub struct DbGateway {
    pub pool: Pool<Sqlite>,
}

impl DbGateway {
    /// Construct the gateway: connect, integrity-check with recovery,
    /// snapshot, migrate.
    pub async fn new() -> Result<Self, sqlx::Error> {
        let db_path = msm_utils::paths::database_path();
        let existed_before = db_path.exists();

        let mut pool = connect_pool(&db_path).await?;

        if existed_before {
            match quick_check(&pool).await {
                Ok(result) if result == "ok" => {}
                Ok(result) => {
                    error!(result = %result, "database integrity check failed, attempting recovery");
                    pool.close().await;
                    if sqlite_backup::restore_most_recent(&db_path)
                        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?
                    {
                        info!("restored database from most recent backup");
                        pool = connect_pool(&db_path).await?;
                    } else {
                        return Err(sqlx::Error::Protocol(format!(
                            "database corruption detected ({result}) and no backup available for recovery"
                        )));
                    }
                }
                Err(e) => {
                    warn!(error = ?e, "could not run integrity check, proceeding anyway");
                }
            }

            if let Err(e) = sqlite_backup::backup_before_migration(&db_path) {
                warn!(error = ?e, "failed to create pre-migration backup");
            }
        }

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// In-memory gateway for tests: migrated, never touches disk.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Begin a scoped unit of work (§4.2 `with-scope`).
    ///
    /// The returned `Scope` wraps a `sqlx::Transaction`: dropping it without
    /// calling `commit()` rolls back automatically (sqlx's own `Drop`
    /// behavior), so every exit path — including an early `?` return — is
    /// covered without the caller having to remember to roll back by hand.
    pub async fn begin_scope(&self) -> Result<Scope<'static>, sqlx::Error> {
        Ok(Scope {
            tx: self.pool.begin().await?,
        })
    }
}

pub struct Scope<'a> {
    pub tx: sqlx::Transaction<'a, Sqlite>,
}

impl<'a> Scope<'a> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::managed_server::{CreateManagedServer, DistributionKind, ManagedServer};

    #[tokio::test]
    async fn scope_commits_on_success_and_is_visible_after() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let mut scope = gw.begin_scope().await.unwrap();
        ManagedServer::insert(
            scope.conn(),
            CreateManagedServer {
                name: "alpha".into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                working_directory: "/tmp/alpha".into(),
                tcp_port: 25565,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            },
        )
        .await
        .unwrap();
        scope.commit().await.unwrap();

        let found = ManagedServer::find_by_name(&gw.pool, "alpha").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn scope_rolls_back_when_dropped_without_commit() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        {
            let mut scope = gw.begin_scope().await.unwrap();
            ManagedServer::insert(
                scope.conn(),
                CreateManagedServer {
                    name: "beta".into(),
                    distribution: DistributionKind::Paper,
                    version: "1.20.4".into(),
                    working_directory: "/tmp/beta".into(),
                    tcp_port: 25566,
                    heap_size: "1G".into(),
                    runtime_path: None,
                    runtime_arguments: None,
                },
            )
            .await
            .unwrap();
            // scope dropped here without commit
        }

        let found = ManagedServer::find_by_name(&gw.pool, "beta").await.unwrap();
        assert!(found.is_none());
    }
}
