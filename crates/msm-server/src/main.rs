use msm_server::file_logging;
use msm_server::state::AppState;
use msm_services::{DbBackupTask, Reconciler, Scheduler};
use msm_supervisor::Supervisor;
use thiserror::Error;

#[derive(Debug, Error)]
enum MsmdError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[tokio::main]
async fn main() -> Result<(), MsmdError> {
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _log_guard = file_logging::init_logging(&log_level);

    if let Some(stale) = msm_utils::instance::current().await {
        tracing::warn!(pid = stale.pid, port = stale.port, "a prior msmd instance is already registered and alive, refusing to start a second one against the same data root");
        return Ok(());
    }
    // `current()` already treats a dead pid as "no instance"; nothing further
    // to clean up here beyond letting register() below overwrite the file.

    let config = msm_utils::config::load();

    let db = msm_db::DbGateway::new().await?;
    let platform = msm_platform::current_backend();
    let supervisor = Supervisor::new(db.clone(), platform);

    let scheduler = Scheduler::new(db.clone(), supervisor.schedule_dispatcher()).spawn();
    let reconciler = Reconciler::new(db.clone(), supervisor.registry().clone(), supervisor.exit_hook()).spawn();
    let db_backup = DbBackupTask::new(msm_utils::paths::database_path()).spawn();

    let state = AppState::new(supervisor.clone(), scheduler.clone(), reconciler.clone());
    let app = msm_server::routes::router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    let actual_port = listener.local_addr()?.port();

    let instance = msm_utils::instance::InstanceInfo::new(actual_port);
    if let Err(e) = msm_utils::instance::register(&instance).await {
        tracing::warn!(error = %e, "failed to register instance file");
    }

    tracing::info!("msmd listening on http://{}:{}", config.host, actual_port);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shutting down");
    scheduler.shutdown().await;
    reconciler.shutdown().await;
    db_backup.shutdown().await;
    if let Err(e) = msm_utils::instance::unregister().await {
        tracing::warn!(error = %e, "failed to remove instance file");
    }

    if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&supervisor.db().pool).await {
        tracing::warn!(error = %e, "final WAL checkpoint failed");
    }
    supervisor.db().pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
