pub mod api_key;
pub mod backup;
pub mod managed_server;
pub mod plugin;
pub mod schedule;

pub use api_key::{ApiKey, MintedApiKey};
pub use backup::{Backup, BackupKind, BackupStatus, CreateBackup};
pub use managed_server::{CreateManagedServer, DistributionKind, ManagedServer};
pub use plugin::{CreatePlugin, Plugin, PluginSource};
pub use schedule::{CreateSchedule, Schedule, ScheduleAction};
