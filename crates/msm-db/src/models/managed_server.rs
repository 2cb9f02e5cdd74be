//! `ManagedServer` catalog row (§3 Data Model).
//!
//! CRUD methods are generic over `sqlx::Executor` rather than tied to
//! `SqlitePool`, grounded on the executor-over-transaction pattern the
//! teacher uses at `crates/db/src/models/plan_step.rs:247` (`pool.begin()`
//! then passing `&mut *tx` into the same query functions used with the
//! pool). That lets every model function run unmodified inside a
//! `DbGateway::Scope` or directly against the pool for simple reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    Vanilla,
    Paper,
    Purpur,
    Fabric,
    Forge,
}

impl std::fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DistributionKind::Vanilla => "vanilla",
            DistributionKind::Paper => "paper",
            DistributionKind::Purpur => "purpur",
            DistributionKind::Fabric => "fabric",
            DistributionKind::Forge => "forge",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DistributionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vanilla" => Ok(Self::Vanilla),
            "paper" => Ok(Self::Paper),
            "purpur" => Ok(Self::Purpur),
            "fabric" => Ok(Self::Fabric),
            "forge" => Ok(Self::Forge),
            other => Err(format!("unknown distribution kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ManagedServer {
    pub id: i64,
    pub name: String,
    pub distribution: DistributionKind,
    pub version: String,
    pub working_directory: String,
    pub tcp_port: i64,
    pub heap_size: String,
    pub runtime_path: Option<String>,
    pub runtime_arguments: Option<String>,
    pub running: bool,
    pub pid: Option<i64>,
    pub restart_on_crash: bool,
    pub last_started: Option<DateTime<Utc>>,
    pub last_stopped: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateManagedServer {
    pub name: String,
    pub distribution: DistributionKind,
    pub version: String,
    pub working_directory: String,
    pub tcp_port: i64,
    pub heap_size: String,
    pub runtime_path: Option<String>,
    pub runtime_arguments: Option<String>,
}

impl ManagedServer {
    pub async fn insert<'e, E>(exec: E, data: CreateManagedServer) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO servers
                 (name, distribution, version, working_directory, tcp_port, heap_size, runtime_path, runtime_arguments)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(data.name)
        .bind(data.distribution)
        .bind(data.version)
        .bind(data.working_directory)
        .bind(data.tcp_port)
        .bind(data.heap_size)
        .bind(data.runtime_path)
        .bind(data.runtime_arguments)
        .fetch_one(exec)
        .await
    }

    pub async fn find_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM servers WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    pub async fn find_by_name<'e, E>(exec: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM servers WHERE name = ?")
            .bind(name)
            .fetch_optional(exec)
            .await
    }

    pub async fn list_all<'e, E>(exec: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM servers ORDER BY name ASC")
            .fetch_all(exec)
            .await
    }

    pub async fn set_running_state<'e, E>(
        exec: E,
        id: i64,
        running: bool,
        pid: Option<i64>,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        if running {
            sqlx::query(
                "UPDATE servers SET running = 1, pid = ?, last_started = strftime('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = ?",
            )
            .bind(pid)
            .bind(id)
            .execute(exec)
            .await?;
        } else {
            sqlx::query(
                "UPDATE servers SET running = 0, pid = NULL, last_stopped = strftime('%Y-%m-%dT%H:%M:%fZ','now') WHERE id = ?",
            )
            .bind(id)
            .execute(exec)
            .await?;
        }
        Ok(())
    }

    /// Full replace of the operator-editable configuration fields (PATCH
    /// semantics are resolved by the caller merging onto the current
    /// snapshot before calling this).
    pub async fn update_config<'e, E>(
        exec: E,
        id: i64,
        heap_size: &str,
        tcp_port: i64,
        runtime_path: Option<&str>,
        runtime_arguments: Option<&str>,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE servers SET heap_size = ?, tcp_port = ?, runtime_path = ?, runtime_arguments = ? WHERE id = ?",
        )
        .bind(heap_size)
        .bind(tcp_port)
        .bind(runtime_path)
        .bind(runtime_arguments)
        .bind(id)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn set_restart_on_crash<'e, E>(
        exec: E,
        id: i64,
        restart_on_crash: bool,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE servers SET restart_on_crash = ? WHERE id = ?")
            .bind(restart_on_crash)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM servers WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbGateway;

    async fn gateway() -> DbGateway {
        DbGateway::new_in_memory().await.unwrap()
    }

    fn sample(name: &str, port: i64) -> CreateManagedServer {
        CreateManagedServer {
            name: name.to_string(),
            distribution: DistributionKind::Paper,
            version: "1.20.4".into(),
            working_directory: format!("/tmp/{name}"),
            tcp_port: port,
            heap_size: "2G".into(),
            runtime_path: None,
            runtime_arguments: None,
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_name_round_trips() {
        let gw = gateway().await;
        let created = ManagedServer::insert(&gw.pool, sample("alpha", 25565)).await.unwrap();
        assert_eq!(created.name, "alpha");
        assert!(!created.running);

        let found = ManagedServer::find_by_name(&gw.pool, "alpha").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.distribution, DistributionKind::Paper);
    }

    #[tokio::test]
    async fn set_running_state_updates_pid_and_clears_on_stop() {
        let gw = gateway().await;
        let created = ManagedServer::insert(&gw.pool, sample("beta", 25566)).await.unwrap();

        ManagedServer::set_running_state(&gw.pool, created.id, true, Some(4242)).await.unwrap();
        let running = ManagedServer::find_by_id(&gw.pool, created.id).await.unwrap().unwrap();
        assert!(running.running);
        assert_eq!(running.pid, Some(4242));

        ManagedServer::set_running_state(&gw.pool, created.id, false, None).await.unwrap();
        let stopped = ManagedServer::find_by_id(&gw.pool, created.id).await.unwrap().unwrap();
        assert!(!stopped.running);
        assert_eq!(stopped.pid, None);
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let gw = gateway().await;
        let created = ManagedServer::insert(&gw.pool, sample("gamma", 25567)).await.unwrap();
        ManagedServer::delete(&gw.pool, created.id).await.unwrap();
        assert!(ManagedServer::find_by_id(&gw.pool, created.id).await.unwrap().is_none());
    }
}
