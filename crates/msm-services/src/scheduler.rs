//! Scheduler (C7, §4.7) — durable cron schedules, a single sleep-until-next
//! dispatch task, per-`(server-id, action)` single-flight, and the
//! restart-on-crash backoff policy consulted from the exit-callback chain.
//!
//! Grounded on the same `tokio::time::interval` + `mpsc` control-channel
//! idiom as [`crate::reconciler`] (itself from the teacher's
//! `backup_scheduler.rs`), adapted to sleep until the earliest `next_run`
//! rather than a fixed period.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use msm_db::{DbGateway, Schedule, ScheduleAction};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cron::CronSchedule;

/// Submits a due schedule's action to whichever component owns it
/// (Lifecycle Engine for start/stop/restart, a backup handler for backup,
/// the console fabric for command). Injected by the caller so this crate
/// never depends on the supervisor crate that implements the actions.
pub type ScheduleDispatcher =
    Arc<dyn Fn(Schedule) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

/// Lower bound on how often the dispatch loop re-checks the schedule table
/// even with nothing due, so a newly inserted schedule with an
/// earlier-than-anything-else `next_run` is never missed for long.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const DEFAULT_CRASH_BACKOFF: Duration = Duration::from_secs(30);
pub const MAX_CRASH_BACKOFF: Duration = Duration::from_secs(600);
pub const CLEAN_RUN_RESET_THRESHOLD: Duration = Duration::from_secs(600);

enum SchedulerCommand {
    RunNow,
    Shutdown,
}

#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub async fn run_now(&self) {
        let _ = self.tx.send(SchedulerCommand::RunNow).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SchedulerCommand::Shutdown).await;
    }
}

pub struct Scheduler {
    db: DbGateway,
    dispatch: ScheduleDispatcher,
    in_flight: Arc<Mutex<HashSet<(i64, ScheduleAction)>>>,
}

impl Scheduler {
    pub fn new(db: DbGateway, dispatch: ScheduleDispatcher) -> Self {
        Self { db, dispatch, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(self.run(rx));
        SchedulerHandle { tx }
    }

    async fn run(self, mut rx: mpsc::Receiver<SchedulerCommand>) {
        // §4.7: at startup, load all enabled schedules and compute next_run
        // for any that don't already have one.
        match Schedule::list_enabled(&self.db.pool).await {
            Ok(schedules) => {
                for schedule in schedules.into_iter().filter(|s| s.next_run.is_none()) {
                    self.recompute_next_run(&schedule).await;
                }
            }
            Err(e) => error!(error = %e, "scheduler could not load schedules at startup"),
        }

        info!("scheduler started");

        loop {
            let sleep_duration = self.sleep_duration_until_next_due().await;

            tokio::select! {
                Some(cmd) = rx.recv() => {
                    match cmd {
                        SchedulerCommand::RunNow => {}
                        SchedulerCommand::Shutdown => {
                            info!("scheduler shutting down");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(sleep_duration) => {}
            }

            self.dispatch_due().await;
        }
    }

    async fn sleep_duration_until_next_due(&self) -> Duration {
        let schedules = match Schedule::list_enabled(&self.db.pool).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "scheduler could not list schedules, falling back to poll interval");
                return MAX_POLL_INTERVAL;
            }
        };

        let earliest = schedules.iter().filter_map(|s| s.next_run).min();
        let now = Utc::now();
        match earliest {
            Some(next) if next <= now => Duration::ZERO,
            Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO).min(MAX_POLL_INTERVAL),
            None => MAX_POLL_INTERVAL,
        }
    }

    async fn dispatch_due(&self) {
        let due = match Schedule::due(&self.db.pool, Utc::now()).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "scheduler could not query due schedules");
                return;
            }
        };

        for schedule in due {
            let key = (schedule.server_id, schedule.action);
            if !self.in_flight.lock().insert(key) {
                warn!(
                    server_id = schedule.server_id,
                    action = ?schedule.action,
                    "schedule fired while the previous run is still in flight; dropping"
                );
                continue;
            }

            let db = self.db.clone();
            let dispatch = Arc::clone(&self.dispatch);
            let in_flight = Arc::clone(&self.in_flight);

            tokio::spawn(async move {
                run_one(db, dispatch, schedule).await;
                in_flight.lock().remove(&key);
            });
        }
    }

    /// Computes and persists `next_run` for a schedule outside the dispatch
    /// path (startup, or a schedule created with no `next_run` yet).
    async fn recompute_next_run(&self, schedule: &Schedule) {
        let cron = match CronSchedule::parse(&schedule.cron_expression) {
            Ok(c) => c,
            Err(e) => {
                error!(schedule_id = schedule.id, error = %e, "schedule has an invalid cron expression");
                return;
            }
        };
        match cron.first_fire_after(Utc::now()) {
            Ok(next) => {
                if let Err(e) =
                    Schedule::record_run(&self.db.pool, schedule.id, schedule.last_run.unwrap_or(Utc::now()), Some(next))
                        .await
                {
                    warn!(schedule_id = schedule.id, error = %e, "failed to persist computed next_run");
                }
            }
            Err(e) => error!(schedule_id = schedule.id, error = %e, "could not compute next fire time"),
        }
    }
}

/// One schedule's fire: re-read+recompute+persist under a gateway scope,
/// then dispatch the action outside the scope so the transaction is never
/// held across the (potentially long) action itself.
async fn run_one(db: DbGateway, dispatch: ScheduleDispatcher, fired: Schedule) {
    let now = Utc::now();

    let current = {
        let mut scope = match db.begin_scope().await {
            Ok(s) => s,
            Err(e) => {
                error!(schedule_id = fired.id, error = %e, "could not begin scope for schedule dispatch");
                return;
            }
        };

        let current = match Schedule::find_by_id(scope.conn(), fired.id).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(schedule_id = fired.id, "schedule was deleted before it could fire");
                let _ = scope.rollback().await;
                return;
            }
            Err(e) => {
                error!(schedule_id = fired.id, error = %e, "could not re-read schedule before firing");
                let _ = scope.rollback().await;
                return;
            }
        };

        if !current.enabled {
            info!(schedule_id = fired.id, "schedule was disabled before it could fire; skipping");
            let _ = scope.rollback().await;
            return;
        }

        let cron = match CronSchedule::parse(&current.cron_expression) {
            Ok(c) => c,
            Err(e) => {
                error!(schedule_id = fired.id, error = %e, "schedule has an invalid cron expression");
                let _ = scope.rollback().await;
                return;
            }
        };

        let next_run = match cron.first_fire_after(now) {
            Ok(next) => next,
            Err(e) => {
                error!(schedule_id = fired.id, error = %e, "could not compute next fire time");
                let _ = scope.rollback().await;
                return;
            }
        };

        if let Err(e) = Schedule::record_run(scope.conn(), fired.id, now, Some(next_run)).await {
            error!(schedule_id = fired.id, error = %e, "could not persist schedule run");
            let _ = scope.rollback().await;
            return;
        }

        if let Err(e) = scope.commit().await {
            error!(schedule_id = fired.id, error = %e, "could not commit schedule run");
            return;
        }

        current
    };

    match dispatch(current.clone()).await {
        Ok(()) => info!(schedule_id = current.id, action = ?current.action, "schedule action completed"),
        Err(e) => error!(schedule_id = current.id, action = ?current.action, error = %e, "schedule action failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msm_db::{CreateManagedServer, CreateSchedule, DistributionKind, ManagedServer};
    use tokio::sync::Mutex as AsyncMutex;

    async fn seed_server(gw: &DbGateway) -> i64 {
        ManagedServer::insert(
            &gw.pool,
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
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn run_one_advances_next_run_and_invokes_the_dispatcher() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server_id = seed_server(&gw).await;
        let schedule = Schedule::insert(
            &gw.pool,
            CreateSchedule {
                server_id,
                action: ScheduleAction::Backup,
                cron_expression: "* * * * *".into(),
                payload: None,
            },
        )
        .await
        .unwrap();

        let invoked = Arc::new(AsyncMutex::new(None));
        let invoked_clone = Arc::clone(&invoked);
        let dispatch: ScheduleDispatcher = Arc::new(move |s: Schedule| {
            let invoked = Arc::clone(&invoked_clone);
            Box::pin(async move {
                *invoked.lock().await = Some(s.id);
                Ok(())
            })
        });

        run_one(gw.clone(), dispatch, schedule.clone()).await;

        assert_eq!(*invoked.lock().await, Some(schedule.id));
        let after = Schedule::find_by_id(&gw.pool, schedule.id).await.unwrap().unwrap();
        assert!(after.last_run.is_some());
        assert!(after.next_run.unwrap() > after.last_run.unwrap());
    }

    #[tokio::test]
    async fn run_one_skips_a_schedule_disabled_before_it_fires() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server_id = seed_server(&gw).await;
        let schedule = Schedule::insert(
            &gw.pool,
            CreateSchedule {
                server_id,
                action: ScheduleAction::Restart,
                cron_expression: "* * * * *".into(),
                payload: None,
            },
        )
        .await
        .unwrap();
        Schedule::set_enabled(&gw.pool, schedule.id, false).await.unwrap();

        let called = Arc::new(AsyncMutex::new(false));
        let called_clone = Arc::clone(&called);
        let dispatch: ScheduleDispatcher = Arc::new(move |_s: Schedule| {
            let called = Arc::clone(&called_clone);
            Box::pin(async move {
                *called.lock().await = true;
                Ok(())
            })
        });

        run_one(gw.clone(), dispatch, schedule).await;
        assert!(!*called.lock().await);
    }
}
