//! `Plugin` catalog row: a JAR installed into a managed server's plugins
//! directory, tracked for update checks (§3 Data Model, C8 External
//! Fetchers).

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PluginSource {
    Modrinth,
    Hangar,
    Url,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Plugin {
    pub id: i64,
    pub server_id: i64,
    pub name: String,
    pub source: PluginSource,
    pub source_project_id: Option<String>,
    pub installed_version: Option<String>,
    pub file_path: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CreatePlugin {
    pub server_id: i64,
    pub name: String,
    pub source: PluginSource,
    pub source_project_id: Option<String>,
    pub installed_version: Option<String>,
    pub file_path: String,
}

impl Plugin {
    pub async fn insert<'e, E>(exec: E, data: CreatePlugin) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            r#"INSERT INTO plugins (server_id, name, source, source_project_id, installed_version, file_path)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(data.server_id)
        .bind(data.name)
        .bind(data.source)
        .bind(data.source_project_id)
        .bind(data.installed_version)
        .bind(data.file_path)
        .fetch_one(exec)
        .await
    }

    pub async fn find_by_id<'e, E>(exec: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM plugins WHERE id = ?")
            .bind(id)
            .fetch_optional(exec)
            .await
    }

    pub async fn list_for_server<'e, E>(exec: E, server_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM plugins WHERE server_id = ? ORDER BY name ASC")
            .bind(server_id)
            .fetch_all(exec)
            .await
    }

    pub async fn set_enabled<'e, E>(exec: E, id: i64, enabled: bool) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE plugins SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn set_installed_version<'e, E>(
        exec: E,
        id: i64,
        installed_version: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE plugins SET installed_version = ? WHERE id = ?")
            .bind(installed_version)
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM plugins WHERE id = ?")
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
    async fn insert_then_update_installed_version() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let server = ManagedServer::insert(
            &gw.pool,
            CreateManagedServer {
                name: "alpha".into(),
                distribution: DistributionKind::Paper,
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

        let plugin = Plugin::insert(
            &gw.pool,
            CreatePlugin {
                server_id: server.id,
                name: "Essentials".into(),
                source: PluginSource::Modrinth,
                source_project_id: Some("essentialsx".into()),
                installed_version: Some("2.20.1".into()),
                file_path: "/tmp/alpha/plugins/Essentials.jar".into(),
            },
        )
        .await
        .unwrap();

        Plugin::set_installed_version(&gw.pool, plugin.id, "2.20.2").await.unwrap();
        let found = Plugin::find_by_id(&gw.pool, plugin.id).await.unwrap().unwrap();
        assert_eq!(found.installed_version.as_deref(), Some("2.20.2"));
    }
}
