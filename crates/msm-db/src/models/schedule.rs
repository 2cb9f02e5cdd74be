//! `Schedule` catalog row: a cron-driven action against a managed server
//! (§3 Data Model, C7 Cron-Driven Task Scheduler).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAction {
    Start,
    Stop,
    Restart,
    Backup,
    Command,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub server_id: i64,
    pub action: ScheduleAction,
    pub cron_expression: String,
    pub payload: Option<String>,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSchedule {
    pub server_id: i64,
    pub action: ScheduleAction,
    pub cron_expression: String,
    pub payload: Option<String>,
}

impl Schedule {
    pub async fn insert<'e, E>(exec: E, data: CreateSchedule) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO schedules (server_id, action, cron_expression, payload)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(data.server_id)
        .bind(data.action)
        .bind(data.cron_expression)
        .bind(data.payload)
        .fetch_one(exec)
        .await
    }

    pub async fn find_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    pub async fn list_for_server<'e, E>(exec: E, server_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM schedules WHERE server_id = ? ORDER BY id ASC")
            .bind(server_id)
            .fetch_all(exec)
            .await
    }

    /// Every enabled schedule, regardless of `next_run`. Used at scheduler
    /// startup and to find the earliest upcoming fire time to sleep until.
    pub async fn list_enabled<'e, E>(exec: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM schedules WHERE enabled = 1")
            .fetch_all(exec)
            .await
    }

    /// All enabled schedules whose `next_run` has arrived, oldest first —
    /// polled by the scheduler's tick loop.
    pub async fn due<'e, E>(exec: E, now: DateTime<Utc>) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM schedules WHERE enabled = 1 AND next_run IS NOT NULL AND next_run <= ? ORDER BY next_run ASC",
        )
        .bind(now)
        .fetch_all(exec)
        .await
    }

    pub async fn set_enabled<'e, E>(exec: E, id: i64, enabled: bool) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE schedules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn record_run<'e, E>(
        exec: E,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE schedules SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run)
            .bind(next_run)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::managed_server::{CreateManagedServer, DistributionKind, ManagedServer};
    use crate::DbGateway;
    use chrono::Duration;

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
    async fn due_only_returns_enabled_schedules_whose_time_has_passed() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server_id = seed_server(&gw).await;
        let now = Utc::now();

        let past = Schedule::insert(
            &gw.pool,
            CreateSchedule {
                server_id,
                action: ScheduleAction::Backup,
                cron_expression: "0 3 * * *".into(),
                payload: None,
            },
        )
        .await
        .unwrap();
        Schedule::record_run(&gw.pool, past.id, now - Duration::hours(2), Some(now - Duration::minutes(1)))
            .await
            .unwrap();

        let future = Schedule::insert(
            &gw.pool,
            CreateSchedule {
                server_id,
                action: ScheduleAction::Restart,
                cron_expression: "0 4 * * *".into(),
                payload: None,
            },
        )
        .await
        .unwrap();
        Schedule::record_run(&gw.pool, future.id, now - Duration::hours(2), Some(now + Duration::hours(1)))
            .await
            .unwrap();

        let due = Schedule::due(&gw.pool, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);
    }

    #[tokio::test]
    async fn disabled_schedules_are_never_due() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server_id = seed_server(&gw).await;
        let now = Utc::now();

        let s = Schedule::insert(
            &gw.pool,
            CreateSchedule {
                server_id,
                action: ScheduleAction::Stop,
                cron_expression: "0 0 * * *".into(),
                payload: None,
            },
        )
        .await
        .unwrap();
        Schedule::record_run(&gw.pool, s.id, now, Some(now - Duration::minutes(1))).await.unwrap();
        Schedule::set_enabled(&gw.pool, s.id, false).await.unwrap();

        let due = Schedule::due(&gw.pool, now).await.unwrap();
        assert!(due.is_empty());
    }
}
