//! Process Registry, Console Fabric, Reconciler, and Scheduler (C3, C4, C6,
//! C7) — everything in the spec that runs as a background Tokio task against
//! either a live child process or the database, independent of the HTTP
//! surface and the Lifecycle Engine that owns process spawning itself.

pub mod cron;
pub mod db_backup;
pub mod fabric;
pub mod reconciler;
pub mod registry;
pub mod scheduler;

pub use cron::{CronError, CronSchedule};
pub use db_backup::{DbBackupHandle, DbBackupTask};
pub use fabric::{send_command, subscribe, Frame, PongSink, Subscription};
pub use reconciler::{Reconciler, ReconcilerHandle};
pub use registry::{ExitHook, ExitSignal, ManagedChild, ProcessRegistry};
pub use scheduler::{Scheduler, ScheduleDispatcher, SchedulerHandle};
