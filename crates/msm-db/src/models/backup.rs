//! `Backup` catalog row: a point-in-time archive of a managed server's
//! working directory (§3 Data Model). Distinct from the internal database
//! snapshots in `crate::sqlite_backup`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Manual,
    Scheduled,
    PreUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Backup {
    pub id: i64,
    pub server_id: i64,
    pub file_path: String,
    pub size_bytes: i64,
    pub kind: BackupKind,
    pub status: BackupStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBackup {
    pub server_id: i64,
    pub file_path: String,
    pub kind: BackupKind,
}

impl Backup {
    pub async fn insert<'e, E>(exec: E, data: CreateBackup) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO backups (server_id, file_path, kind, status)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(data.server_id)
        .bind(data.file_path)
        .bind(data.kind)
        .bind(BackupStatus::InProgress)
        .fetch_one(exec)
        .await
    }

    pub async fn mark_completed<'e, E>(exec: E, id: i64, size_bytes: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE backups SET status = ?, size_bytes = ? WHERE id = ?")
            .bind(BackupStatus::Completed)
            .bind(size_bytes)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn mark_failed<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE backups SET status = ? WHERE id = ?")
            .bind(BackupStatus::Failed)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn find_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM backups WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    pub async fn list_for_server<'e, E>(exec: E, server_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM backups WHERE server_id = ? ORDER BY created_at DESC")
            .bind(server_id)
            .fetch_all(exec)
            .await
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM backups WHERE id = ?")
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

    #[tokio::test]
    async fn insert_starts_in_progress_then_completes() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server = ManagedServer::insert(
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
        .unwrap();

        let backup = Backup::insert(
            &gw.pool,
            CreateBackup {
                server_id: server.id,
                file_path: "/tmp/alpha-backup.tar.gz".into(),
                kind: BackupKind::Manual,
            },
        )
        .await
        .unwrap();
        assert_eq!(backup.status, BackupStatus::InProgress);

        Backup::mark_completed(&gw.pool, backup.id, 4096).await.unwrap();
        let found = Backup::find_by_id(&gw.pool, backup.id).await.unwrap().unwrap();
        assert_eq!(found.status, BackupStatus::Completed);
        assert_eq!(found.size_bytes, 4096);
    }
}
