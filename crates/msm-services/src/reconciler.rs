//! Reconciler (C6, §4.6) — periodically reconciles the DB's `running` flag
//! against the process registry's actual live state, and sweeps dead
//! console rings. Never auto-stops a server on its own initiative; a server
//! the DB marks running but the registry no longer holds is run through the
//! same exit-callback chain (§4.5) a registered child's own exit-watcher
//! would have run, with exit code "unknown", so restart-on-crash and the
//! `server-stopped` notification both still fire for it.
//!
//! Grounded on the teacher's `db/src/backup_scheduler.rs`: a
//! `tokio::time::interval` loop selected against an `mpsc` control channel
//! for on-demand triggers and shutdown.

use std::sync::Arc;
use std::time::Duration;

use msm_db::DbGateway;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::registry::{ExitHook, ProcessRegistry};

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RING_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RING_TTL: Duration = Duration::from_secs(600);

enum ReconcilerCommand {
    RunNow,
    Shutdown,
}

#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::Sender<ReconcilerCommand>,
}

impl ReconcilerHandle {
    pub async fn run_now(&self) {
        let _ = self.tx.send(ReconcilerCommand::RunNow).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ReconcilerCommand::Shutdown).await;
    }
}

pub struct Reconciler {
    db: DbGateway,
    registry: Arc<ProcessRegistry>,
    exit_hook: ExitHook,
    reconcile_interval: Duration,
    ring_sweep_interval: Duration,
    ring_ttl: Duration,
}

impl Reconciler {
    /// `exit_hook` is the Lifecycle Engine's exit-callback chain
    /// (`Supervisor::exit_hook`) — the same one `ProcessRegistry::register`
    /// is given for a freshly spawned child.
    pub fn new(db: DbGateway, registry: Arc<ProcessRegistry>, exit_hook: ExitHook) -> Self {
        Self {
            db,
            registry,
            exit_hook,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            ring_sweep_interval: DEFAULT_RING_SWEEP_INTERVAL,
            ring_ttl: DEFAULT_RING_TTL,
        }
    }

    pub fn spawn(self) -> ReconcilerHandle {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(self.run(rx));
        ReconcilerHandle { tx }
    }

    async fn run(self, mut rx: mpsc::Receiver<ReconcilerCommand>) {
        let mut reconcile_tick = tokio::time::interval(self.reconcile_interval);
        let mut sweep_tick = tokio::time::interval(self.ring_sweep_interval);

        info!(
            reconcile_secs = self.reconcile_interval.as_secs(),
            sweep_secs = self.ring_sweep_interval.as_secs(),
            "reconciler started"
        );

        loop {
            tokio::select! {
                Some(cmd) = rx.recv() => {
                    match cmd {
                        ReconcilerCommand::RunNow => self.reconcile_once().await,
                        ReconcilerCommand::Shutdown => {
                            info!("reconciler shutting down");
                            break;
                        }
                    }
                }
                _ = reconcile_tick.tick() => self.reconcile_once().await,
                _ = sweep_tick.tick() => {
                    self.registry.sweep_dead(self.ring_ttl);
                }
            }
        }
    }

    /// Compares the catalog's `running` rows against the registry's live
    /// set. A server the DB marks running but the registry no longer holds
    /// is treated as an unobserved exit: the exit-callback chain (§4.5) runs
    /// for it with exit code "unknown", exactly as it would have if the
    /// process had died while registered. A server the registry holds but
    /// the DB marks stopped is an inconsistency that gets logged only —
    /// never auto-stopped.
    async fn reconcile_once(&self) {
        let servers = match msm_db::ManagedServer::list_all(&self.db.pool).await {
            Ok(servers) => servers,
            Err(e) => {
                warn!(error = %e, "reconciler could not list servers");
                return;
            }
        };

        for server in servers {
            let registered = self.registry.is_registered(server.id);

            if server.running && !registered {
                warn!(
                    server_id = server.id,
                    name = %server.name,
                    "server marked running but has no live process; running exit-callback chain"
                );
                (self.exit_hook)(server.id, None).await;
            } else if !server.running && registered {
                warn!(
                    server_id = server.id,
                    name = %server.name,
                    "server has a live process but catalog marks it stopped; leaving process running"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msm_db::{CreateManagedServer, DistributionKind, ManagedServer};
    use parking_lot::Mutex;

    async fn seed(gw: &DbGateway, name: &str) -> i64 {
        ManagedServer::insert(
            &gw.pool,
            CreateManagedServer {
                name: name.into(),
                distribution: DistributionKind::Vanilla,
                version: "1.20.4".into(),
                working_directory: "/tmp/x".into(),
                tcp_port: 25565,
                heap_size: "1G".into(),
                runtime_path: None,
                runtime_arguments: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    /// A stand-in for `Supervisor::exit_hook`: persists the stopped state
    /// the way the real chain's first step does, and records that it ran.
    fn recording_hook(gw: DbGateway, invoked: Arc<Mutex<Vec<(i64, Option<i32>)>>>) -> ExitHook {
        Arc::new(move |server_id, exit_code| {
            let gw = gw.clone();
            let invoked = Arc::clone(&invoked);
            Box::pin(async move {
                invoked.lock().push((server_id, exit_code));
                let _ = ManagedServer::set_running_state(&gw.pool, server_id, false, None).await;
            })
        })
    }

    #[tokio::test]
    async fn reconcile_runs_the_exit_callback_chain_for_servers_with_no_live_process() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let id = seed(&gw, "alpha").await;
        ManagedServer::set_running_state(&gw.pool, id, true, Some(123)).await.unwrap();

        let registry = Arc::new(ProcessRegistry::new());
        let invoked = Arc::new(Mutex::new(Vec::new()));
        let reconciler = Reconciler::new(gw.clone(), registry, recording_hook(gw.clone(), Arc::clone(&invoked)));
        reconciler.reconcile_once().await;

        let after = ManagedServer::find_by_id(&gw.pool, id).await.unwrap().unwrap();
        assert!(!after.running);
        assert_eq!(after.pid, None);
        assert_eq!(*invoked.lock(), vec![(id, None)]);
    }

    #[tokio::test]
    async fn reconcile_leaves_consistent_rows_untouched() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let id = seed(&gw, "beta").await;

        let registry = Arc::new(ProcessRegistry::new());
        let invoked = Arc::new(Mutex::new(Vec::new()));
        let reconciler = Reconciler::new(gw.clone(), registry, recording_hook(gw.clone(), Arc::clone(&invoked)));
        reconciler.reconcile_once().await;

        let after = ManagedServer::find_by_id(&gw.pool, id).await.unwrap().unwrap();
        assert!(!after.running);
        assert!(invoked.lock().is_empty());
    }
}
