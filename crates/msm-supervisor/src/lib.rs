//! Lifecycle Engine (C5, §4.4) — the public contract used by HTTP handlers,
//! CLI commands, and the Scheduler: `start`/`stop`/`restart`/`status`/
//! `create`/`import`/`delete`, plus the exit-callback chain (§4.5) and the
//! restart-on-crash backoff policy (§4.7) that consults it.
//!
//! Grounded on `crates/local-deployment/src/lib.rs`'s `Deployment` trait —
//! one struct that owns every other service (config, db, container,
//! filesystem, …) and exposes the operations HTTP routes call directly.
//! Generalized here from "wire together git/container/analytics services"
//! to "wire together the platform backend, data store gateway, process
//! registry, console fabric, and external fetchers".

pub mod error;
mod jvm;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use msm_db::{
    CreateManagedServer, DbGateway, DistributionKind, ManagedServer, ScheduleAction,
};
use msm_platform::PlatformBackend;
use msm_services::{ExitHook, ProcessRegistry};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub use error::{ErrorKind, SupervisorError};

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(30);
const DEFAULT_CRASH_BACKOFF: Duration = Duration::from_secs(30);
const MAX_CRASH_BACKOFF: Duration = Duration::from_secs(600);
const CLEAN_RUN_RESET_THRESHOLD: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServerSpec {
    pub name: String,
    pub distribution: DistributionKind,
    pub version: String,
    pub tcp_port: i64,
    pub heap_size: String,
    pub runtime_path: Option<String>,
    pub runtime_arguments: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub server: ManagedServer,
    pub uptime_seconds: Option<i64>,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct CrashState {
    consecutive_crashes: u32,
}

pub struct Supervisor {
    db: DbGateway,
    platform: Arc<dyn PlatformBackend>,
    registry: Arc<ProcessRegistry>,
    http: reqwest::Client,
    /// Servers currently being stopped by an explicit operator `stop` call,
    /// consulted by the exit-callback chain to suppress restart-on-crash
    /// for operator-initiated exits.
    intentional_stops: Mutex<HashSet<i64>>,
    crash_state: Mutex<HashMap<i64, CrashState>>,
}

impl Supervisor {
    pub fn new(db: DbGateway, platform: Arc<dyn PlatformBackend>) -> Arc<Self> {
        Arc::new(Self {
            db,
            platform,
            registry: Arc::new(ProcessRegistry::new()),
            http: reqwest::Client::new(),
            intentional_stops: Mutex::new(HashSet::new()),
            crash_state: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    pub fn db(&self) -> &DbGateway {
        &self.db
    }

    pub fn platform(&self) -> &Arc<dyn PlatformBackend> {
        &self.platform
    }

    // ---- create / import / delete -------------------------------------

    pub async fn create(self: &Arc<Self>, spec: CreateServerSpec) -> Result<ManagedServer, SupervisorError> {
        if !msm_utils::name::is_valid_server_name(&spec.name) {
            return Err(SupervisorError::InvalidName(spec.name));
        }
        if !(1..=65535).contains(&spec.tcp_port) {
            return Err(SupervisorError::InvalidPort(spec.tcp_port));
        }

        let mut scope = self.db.begin_scope().await?;
        if ManagedServer::find_by_name(scope.conn(), &spec.name).await?.is_some() {
            scope.rollback().await?;
            return Err(SupervisorError::NameInUse(spec.name));
        }

        let working_directory = msm_utils::paths::server_dir(&spec.name);
        std::fs::create_dir_all(&working_directory).map_err(SupervisorError::Filesystem)?;

        let record = ManagedServer::insert(
            scope.conn(),
            CreateManagedServer {
                name: spec.name.clone(),
                distribution: spec.distribution,
                version: spec.version.clone(),
                working_directory: working_directory.to_string_lossy().to_string(),
                tcp_port: spec.tcp_port,
                heap_size: spec.heap_size,
                runtime_path: spec.runtime_path,
                runtime_arguments: spec.runtime_arguments,
            },
        )
        .await?;
        scope.commit().await?;

        self.fetch_distribution_jar(&record, &working_directory).await?;

        info!(server_id = record.id, name = %record.name, "server created");
        Ok(record)
    }

    async fn fetch_distribution_jar(
        &self,
        server: &ManagedServer,
        working_directory: &Path,
    ) -> Result<(), SupervisorError> {
        let fetcher = msm_fetchers::fetcher_for(server.distribution);
        fetcher
            .fetch(
                &self.http,
                msm_fetchers::DistributionRequest { version: &server.version, dest_dir: working_directory },
            )
            .await?;

        if server.distribution == DistributionKind::Forge {
            self.run_forge_installer(server, working_directory).await?;
        }
        Ok(())
    }

    /// Forge publishes an installer, not a ready-to-run server jar; it must
    /// be run once with `--installServer` before the server can start. No
    /// archive-parsing crate exists in the corpus, so the resulting jar is
    /// located by filename convention rather than by reading the installer's
    /// manifest.
    async fn run_forge_installer(
        &self,
        server: &ManagedServer,
        working_directory: &Path,
    ) -> Result<(), SupervisorError> {
        let runtime = self.resolve_runtime(server)?;
        let argv = vec![
            runtime,
            "-jar".to_string(),
            "forge-installer.jar".to_string(),
            "--installServer".to_string(),
        ];
        let mut spawned = self.platform.spawn(working_directory, &argv, &HashMap::new()).await?;
        spawned.wait().await.map_err(SupervisorError::Filesystem)?;
        Ok(())
    }

    pub async fn import(
        self: &Arc<Self>,
        path: PathBuf,
        spec: CreateServerSpec,
    ) -> Result<ManagedServer, SupervisorError> {
        if !msm_utils::name::is_valid_server_name(&spec.name) {
            return Err(SupervisorError::InvalidName(spec.name));
        }
        jvm::find_importable_jar(&path)?;

        let mut scope = self.db.begin_scope().await?;
        if ManagedServer::find_by_name(scope.conn(), &spec.name).await?.is_some() {
            scope.rollback().await?;
            return Err(SupervisorError::NameInUse(spec.name));
        }
        let record = ManagedServer::insert(
            scope.conn(),
            CreateManagedServer {
                name: spec.name,
                distribution: spec.distribution,
                version: spec.version,
                working_directory: path.to_string_lossy().to_string(),
                tcp_port: spec.tcp_port,
                heap_size: spec.heap_size,
                runtime_path: spec.runtime_path,
                runtime_arguments: spec.runtime_arguments,
            },
        )
        .await?;
        scope.commit().await?;
        Ok(record)
    }

    pub async fn delete(&self, server_id: i64, keep_files: bool) -> Result<(), SupervisorError> {
        let server = self.require_server(server_id).await?;
        if server.running {
            return Err(SupervisorError::AlreadyRunning(server_id));
        }

        if !keep_files {
            if is_elevated_principal() {
                return Err(SupervisorError::ElevatedPrincipal);
            }
            let working_directory = PathBuf::from(&server.working_directory);
            let data_root = msm_utils::paths::data_root();
            let canonical = working_directory
                .canonicalize()
                .map_err(SupervisorError::Filesystem)?;
            let canonical_root = data_root.canonicalize().map_err(SupervisorError::Filesystem)?;
            if !canonical.starts_with(&canonical_root) || canonical == canonical_root {
                return Err(SupervisorError::PathTraversal { path: canonical.to_string_lossy().to_string() });
            }
            std::fs::remove_dir_all(&canonical).map_err(SupervisorError::Filesystem)?;
        }

        ManagedServer::delete(&self.db.pool, server_id).await?;
        info!(server_id, "server deleted");
        Ok(())
    }

    // ---- start / stop / restart / status -------------------------------

    pub async fn start(self: &Arc<Self>, server_id: i64) -> Result<u32, SupervisorError> {
        let server = self.require_server(server_id).await?;

        if server.running && self.platform.is_alive(server.pid.unwrap_or(0) as u32).await {
            return Err(SupervisorError::AlreadyRunning(server_id));
        }
        if server.running {
            // Stale: DB says running but the OS disagrees. Heal and continue.
            ManagedServer::set_running_state(&self.db.pool, server_id, false, None).await?;
        }

        let working_directory = PathBuf::from(&server.working_directory);
        std::fs::create_dir_all(&working_directory).map_err(SupervisorError::Filesystem)?;

        if !jvm::eula_accepted(&working_directory) {
            return Err(SupervisorError::EulaMissing(server_id));
        }

        let mut jar_path = jvm::runnable_jar_path(&working_directory, server.distribution);
        if !jar_path.exists() {
            self.fetch_distribution_jar(&server, &working_directory).await?;
            jar_path = jvm::runnable_jar_path(&working_directory, server.distribution);
        }

        let port_check = self.platform.free_port(server.tcp_port as u16);
        if !port_check.free {
            return Err(SupervisorError::PortInUse { port: server.tcp_port, holder_pid: port_check.holder_pid });
        }

        let runtime = self.resolve_runtime(&server)?;
        let argv = jvm::compose_argv(&runtime, &server.heap_size, server.runtime_arguments.as_deref(), &jar_path);

        let spawned = self.platform.spawn(&working_directory, &argv, &HashMap::new()).await?;
        let pid = spawned.pid;

        self.registry.register(server_id, spawned, self.exit_hook());

        ManagedServer::set_running_state(&self.db.pool, server_id, true, Some(pid as i64)).await?;
        info!(server_id, pid, "server started");
        Ok(pid)
    }

    /// The exit-callback chain (§4.5): set `{running:false, pid:null,
    /// last-stopped:now}`, log, then run restart-on-crash if applicable.
    /// `server-stopped` notification to subscribers is handled independently
    /// by the console fabric watching the same registry exit signal.
    async fn handle_exit(self: &Arc<Self>, server_id: i64, exit_code: Option<i32>) {
        if let Err(e) = ManagedServer::set_running_state(&self.db.pool, server_id, false, None).await {
            error!(server_id, error = %e, "exit-callback chain: failed to persist stopped state");
        }

        let operator_initiated = self.intentional_stops.lock().remove(&server_id);
        if operator_initiated {
            return;
        }

        let server = match ManagedServer::find_by_id(&self.db.pool, server_id).await {
            Ok(Some(s)) => s,
            _ => return,
        };
        if !server.restart_on_crash {
            return;
        }

        warn!(server_id, exit_code, "unexpected exit; evaluating restart-on-crash policy");
        self.schedule_crash_restart(server_id, server.last_started);
    }

    fn schedule_crash_restart(self: &Arc<Self>, server_id: i64, last_started: Option<chrono::DateTime<Utc>>) {
        let elapsed = last_started
            .map(|t| (Utc::now() - t).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(Duration::ZERO);

        let mut states = self.crash_state.lock();
        let state = states.entry(server_id).or_default();
        if elapsed >= CLEAN_RUN_RESET_THRESHOLD {
            state.consecutive_crashes = 0;
        }
        let backoff = DEFAULT_CRASH_BACKOFF
            .saturating_mul(1 << state.consecutive_crashes.min(16))
            .min(MAX_CRASH_BACKOFF);
        state.consecutive_crashes = state.consecutive_crashes.saturating_add(1);
        drop(states);

        let sleep_for = backoff.saturating_sub(elapsed);
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if !sleep_for.is_zero() {
                tokio::time::sleep(sleep_for).await;
            }
            if let Err(e) = supervisor.start(server_id).await {
                error!(server_id, error = %e, "restart-on-crash start attempt failed");
            }
        });
    }

    pub async fn stop(&self, server_id: i64, grace: Duration) -> Result<(), SupervisorError> {
        let server = self.require_server(server_id).await?;
        let Some(child) = self.registry.get(server_id) else {
            if server.running {
                ManagedServer::set_running_state(&self.db.pool, server_id, false, None).await?;
            }
            return Err(SupervisorError::AlreadyStopped(server_id));
        };

        self.intentional_stops.lock().insert(server_id);

        let _ = child.send_command("stop").await;
        if tokio::time::timeout(grace, wait_for_exit(&child)).await.is_err() {
            let _ = self.platform.signal_graceful(child.pid).await;
            if tokio::time::timeout(grace, wait_for_exit(&child)).await.is_err() {
                let _ = self.platform.signal_force(child.pid).await;
            }
        }

        ManagedServer::set_running_state(&self.db.pool, server_id, false, None).await?;
        info!(server_id, "server stopped");
        Ok(())
    }

    pub async fn restart(self: &Arc<Self>, server_id: i64) -> Result<u32, SupervisorError> {
        match self.stop(server_id, DEFAULT_STOP_GRACE).await {
            Ok(()) | Err(SupervisorError::AlreadyStopped(_)) => {}
            Err(e) => return Err(e),
        }
        self.start(server_id).await
    }

    pub async fn status(&self, server_id: i64) -> Result<ServerStatus, SupervisorError> {
        let mut server = self.require_server(server_id).await?;

        let alive = match server.pid {
            Some(pid) => self.platform.is_alive(pid as u32).await,
            None => false,
        };

        if server.running != alive {
            ManagedServer::set_running_state(
                &self.db.pool,
                server_id,
                alive,
                if alive { server.pid } else { None },
            )
            .await?;
            server.running = alive;
            if !alive {
                server.pid = None;
            }
        }

        let (cpu_percent, memory_bytes) = match server.pid {
            Some(pid) if alive => {
                let snapshot = msm_platform::inspector::snapshot(pid as u32);
                (snapshot.cpu_percent, snapshot.memory_bytes)
            }
            _ => (0.0, 0),
        };

        let uptime_seconds = match (server.running, server.last_started) {
            (true, Some(started)) => Some((Utc::now() - started).num_seconds().max(0)),
            _ => None,
        };

        Ok(ServerStatus { server, uptime_seconds, cpu_percent, memory_bytes })
    }

    fn resolve_runtime(&self, server: &ManagedServer) -> Result<String, SupervisorError> {
        if let Some(path) = &server.runtime_path {
            return Ok(path.clone());
        }
        let mut discovered = self.platform.discover_runtimes();
        discovered.sort_by_key(|r| std::cmp::Reverse(r.major_version));
        discovered
            .into_iter()
            .next()
            .map(|r| r.path.to_string_lossy().to_string())
            .ok_or_else(|| SupervisorError::Filesystem(std::io::Error::other("no Java runtime discovered")))
    }

    async fn require_server(&self, server_id: i64) -> Result<ManagedServer, SupervisorError> {
        ManagedServer::find_by_id(&self.db.pool, server_id)
            .await?
            .ok_or(SupervisorError::ServerNotFound(server_id))
    }

    /// Builds the closure the Scheduler (C7) dispatches due schedules
    /// through, so `msm-services` never depends on this crate directly.
    pub fn schedule_dispatcher(self: &Arc<Self>) -> msm_services::ScheduleDispatcher {
        let supervisor = Arc::clone(self);
        Arc::new(move |schedule: msm_db::Schedule| {
            let supervisor = Arc::clone(&supervisor);
            Box::pin(async move {
                match schedule.action {
                    ScheduleAction::Start => {
                        supervisor.start(schedule.server_id).await.map(|_| ()).map_err(|e| e.to_string())
                    }
                    ScheduleAction::Stop => supervisor
                        .stop(schedule.server_id, DEFAULT_STOP_GRACE)
                        .await
                        .or_else(|e| if matches!(e, SupervisorError::AlreadyStopped(_)) { Ok(()) } else { Err(e) })
                        .map_err(|e| e.to_string()),
                    ScheduleAction::Restart => {
                        supervisor.restart(schedule.server_id).await.map(|_| ()).map_err(|e| e.to_string())
                    }
                    ScheduleAction::Backup => supervisor
                        .backup(schedule.server_id, msm_db::BackupKind::Scheduled)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    ScheduleAction::Command => {
                        let Some(child) = supervisor.registry.get(schedule.server_id) else {
                            return Err("server is not running".to_string());
                        };
                        let command = schedule.payload.clone().unwrap_or_default();
                        child.send_command(&command).await.map_err(|e| e.to_string())
                    }
                }
            })
        })
    }

    /// Builds the exit-callback chain (§4.5) as a standalone `ExitHook` so
    /// callers outside the registry-registration path — namely the
    /// Reconciler (§4.6), which finds servers dead without ever having
    /// registered them in this run — can apply it too.
    pub fn exit_hook(self: &Arc<Self>) -> ExitHook {
        let supervisor = Arc::clone(self);
        Arc::new(move |server_id, exit_code| {
            let supervisor = Arc::clone(&supervisor);
            Box::pin(async move {
                supervisor.handle_exit(server_id, exit_code).await;
            })
        })
    }

    /// Archives the server's working directory into `backups/<name>_<ts>.tar.gz`
    /// (§6). Grounded on the teacher's `sqlite_backup` gzip-tar idiom,
    /// applied here to a server's whole working directory instead of the
    /// sqlite file.
    pub async fn backup(&self, server_id: i64, kind: msm_db::BackupKind) -> Result<msm_db::Backup, SupervisorError> {
        let server = self.require_server(server_id).await?;
        let working_directory = PathBuf::from(&server.working_directory);
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let file_name = format!("{}_{}.tar.gz", server.name, timestamp);
        let dest = msm_utils::paths::backups_dir().join(&file_name);

        let record = msm_db::Backup::insert(
            &self.db.pool,
            msm_db::CreateBackup { server_id, file_path: dest.to_string_lossy().to_string(), kind },
        )
        .await?;

        let archive_name = server.name.clone();
        let result = tokio::task::spawn_blocking(move || archive_directory(&working_directory, &dest, &archive_name))
            .await
            .map_err(|e| SupervisorError::Filesystem(std::io::Error::other(e.to_string())))?;

        match result {
            Ok(size_bytes) => {
                msm_db::Backup::mark_completed(&self.db.pool, record.id, size_bytes as i64).await?;
            }
            Err(e) => {
                msm_db::Backup::mark_failed(&self.db.pool, record.id).await?;
                return Err(SupervisorError::Filesystem(e));
            }
        }

        msm_db::Backup::find_by_id(&self.db.pool, record.id)
            .await?
            .ok_or(SupervisorError::BackupNotFound(record.id))
    }

    /// Restores a backup's archive over its server's working directory.
    /// Refused while the server is running, same as `delete`. The archive's
    /// top-level entry is the server name (§6), so extracting into the
    /// working directory's parent recreates it in place.
    pub async fn restore_backup(&self, backup_id: i64) -> Result<(), SupervisorError> {
        let backup = msm_db::Backup::find_by_id(&self.db.pool, backup_id)
            .await?
            .ok_or(SupervisorError::BackupNotFound(backup_id))?;
        let server = self.require_server(backup.server_id).await?;
        if server.running {
            return Err(SupervisorError::AlreadyRunning(server.id));
        }

        let working_directory = PathBuf::from(&server.working_directory);
        let Some(parent) = working_directory.parent().map(Path::to_path_buf) else {
            return Err(SupervisorError::Filesystem(std::io::Error::other(
                "server working directory has no parent to extract into",
            )));
        };
        let archive_path = PathBuf::from(&backup.file_path);

        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &parent))
            .await
            .map_err(|e| SupervisorError::Filesystem(std::io::Error::other(e.to_string())))?
            .map_err(SupervisorError::Filesystem)?;

        Ok(())
    }
}

fn archive_directory(source: &Path, dest: &Path, top_level_name: &str) -> std::io::Result<u64> {
    let file = std::fs::File::create(dest)?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(top_level_name, source)?;
    builder.into_inner()?.finish()?;
    Ok(std::fs::metadata(dest)?.len())
}

fn extract_archive(archive_path: &Path, dest_parent: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest_parent)
}

async fn wait_for_exit(child: &msm_services::ManagedChild) {
    let mut rx = child.subscribe_exit();
    if child.is_exited() {
        return;
    }
    let _ = rx.changed().await;
}

/// §4.6 root/administrator guard: mandatory for filesystem removal. Checks
/// the POSIX effective uid directly via `nix` (already a pack dependency
/// for C1's process-group signaling); a no-op (never elevated) on Windows
/// pending a real elevated-token check.
fn is_elevated_principal() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::Uid::effective().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msm_platform::current_backend;
    use serial_test::serial;
    use tempfile::tempdir;

    async fn supervisor_with_tempdir() -> (Arc<Supervisor>, tempfile::TempDir) {
        let tmp = tempdir().unwrap();
        unsafe { std::env::set_var("MSM_DATA_DIR", tmp.path()) };
        let db = DbGateway::new_in_memory().await.unwrap();
        let platform = current_backend();
        (Supervisor::new(db, platform), tmp)
    }

    #[tokio::test]
    #[serial]
    async fn create_rejects_invalid_names() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;
        let err = supervisor
            .create(CreateServerSpec {
                name: "bad name".into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                tcp_port: 25565,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    #[serial]
    async fn status_on_unknown_server_is_not_found() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;
        let err = supervisor.status(999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    #[serial]
    async fn stop_on_a_never_started_server_is_already_stopped() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;
        let record = ManagedServer::insert(
            &supervisor.db.pool,
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

        let err = supervisor.stop(record.id, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    #[serial]
    async fn delete_refuses_a_running_server() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;
        let record = ManagedServer::insert(
            &supervisor.db.pool,
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
        ManagedServer::set_running_state(&supervisor.db.pool, record.id, true, Some(1)).await.unwrap();

        let err = supervisor.delete(record.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    #[serial]
    async fn delete_refuses_a_working_directory_outside_the_data_root() {
        let (supervisor, tmp) = supervisor_with_tempdir().await;
        let outside = tempdir().unwrap();
        let record = ManagedServer::insert(
            &supervisor.db.pool,
            CreateManagedServer {
                name: "escaped".into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                working_directory: outside.path().to_string_lossy().to_string(),
                tcp_port: 25565,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            },
        )
        .await
        .unwrap();

        let err = supervisor.delete(record.id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(outside.path().exists());
        let _ = tmp;
    }

    #[tokio::test]
    #[serial]
    async fn start_fails_when_the_configured_port_is_already_bound() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;

        // Occupy a real port so `PlatformBackend::free_port` reports it taken,
        // without ever needing a real `java` binary: the port check in
        // `start()` runs before the runtime is resolved or anything spawned.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let working_directory = tempdir().unwrap();
        std::fs::write(working_directory.path().join("eula.txt"), "eula=true\n").unwrap();
        std::fs::write(working_directory.path().join("server.jar"), b"fake").unwrap();

        let record = ManagedServer::insert(
            &supervisor.db.pool,
            CreateManagedServer {
                name: "alpha".into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                working_directory: working_directory.path().to_string_lossy().to_string(),
                tcp_port: port as i64,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            },
        )
        .await
        .unwrap();

        let err = supervisor.start(record.id).await.unwrap_err();
        assert!(matches!(err, SupervisorError::PortInUse { port: p, .. } if p == port as i64));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        drop(listener);
    }

    #[tokio::test]
    #[serial]
    async fn backup_archives_the_working_directory_and_marks_the_record_completed() {
        let (supervisor, _tmp) = supervisor_with_tempdir().await;
        let working_directory = tempdir().unwrap();
        std::fs::write(working_directory.path().join("server.properties"), b"motd=hi\n").unwrap();

        let record = ManagedServer::insert(
            &supervisor.db.pool,
            CreateManagedServer {
                name: "alpha".into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                working_directory: working_directory.path().to_string_lossy().to_string(),
                tcp_port: 25565,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            },
        )
        .await
        .unwrap();

        let backup = supervisor.backup(record.id, msm_db::BackupKind::Scheduled).await.unwrap();
        assert_eq!(backup.status, msm_db::BackupStatus::Completed);
        assert!(backup.size_bytes > 0);
        assert!(PathBuf::from(&backup.file_path).exists());
    }
}
