//! `ApiKey` catalog row and the minting/verification flow around it (§3
//! Data Model, HTTP API auth surface).
//!
//! Only a SHA-256 digest of the key is ever persisted; the plaintext is
//! returned once, at mint time, and never stored or logged again.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, Sqlite};
use subtle::ConstantTimeEq;

const KEY_LENGTH: usize = 40;
const PREFIX_LENGTH: usize = 8;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub label: String,
    pub prefix: String,
    #[serde(skip_serializing, default)]
    pub hash: String,
    pub permissions: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Returned once at mint time; `plaintext` is shown to the caller and then
/// discarded, only `key.hash` is ever persisted.
#[derive(Debug, Serialize, Deserialize)]
pub struct MintedApiKey {
    pub key: ApiKey,
    pub plaintext: String,
}

fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_plaintext() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

impl ApiKey {
    pub async fn mint<'e, E>(
        exec: E,
        label: &str,
        permissions: &str,
    ) -> Result<MintedApiKey, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let plaintext = generate_plaintext();
        let prefix = plaintext.chars().take(PREFIX_LENGTH).collect::<String>();
        let hash = hash_key(&plaintext);

        let key = sqlx::query_as::<_, Self>(
            r#"INSERT INTO api_keys (label, prefix, hash, permissions)
               VALUES (?, ?, ?, ?)
               RETURNING *"#,
        )
        .bind(label)
        .bind(&prefix)
        .bind(&hash)
        .bind(permissions)
        .fetch_one(exec)
        .await?;

        Ok(MintedApiKey { key, plaintext })
    }

    /// Verify a presented key against the active, matching-prefix row.
    /// Returns `None` on any mismatch, inactive row, or missing prefix —
    /// callers should treat all three identically (generic "unauthorized").
    /// The hash comparison itself runs in constant time (§6).
    pub async fn verify<'e, E>(exec: E, presented: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        if presented.len() < PREFIX_LENGTH {
            return Ok(None);
        }
        let prefix = &presented[..PREFIX_LENGTH];
        let candidate = sqlx::query_as::<_, Self>(
            "SELECT * FROM api_keys WHERE prefix = ? AND active = 1",
        )
        .bind(prefix)
        .fetch_optional(exec)
        .await?;

        let presented_hash = hash_key(presented);
        Ok(candidate.filter(|k| k.hash.as_bytes().ct_eq(presented_hash.as_bytes()).into()))
    }

    pub async fn list_all<'e, E>(exec: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM api_keys ORDER BY created_at DESC")
            .fetch_all(exec)
            .await
    }

    pub async fn revoke<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE api_keys SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(exec: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query("DELETE FROM api_keys WHERE id = ?")
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

    #[tokio::test]
    async fn mint_then_verify_accepts_the_plaintext_once() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let minted = ApiKey::mint(&gw.pool, "ci", "full").await.unwrap();
        assert_eq!(minted.plaintext.len(), KEY_LENGTH);

        let verified = ApiKey::verify(&gw.pool, &minted.plaintext).await.unwrap();
        assert!(verified.is_some());
        assert_eq!(verified.unwrap().id, minted.key.id);
    }

    #[tokio::test]
    async fn verify_rejects_garbage_and_revoked_keys() {
        let gw = DbGateway::new_in_memory().await.unwrap();
        let minted = ApiKey::mint(&gw.pool, "ci", "full").await.unwrap();

        assert!(ApiKey::verify(&gw.pool, "not-a-real-key").await.unwrap().is_none());

        ApiKey::revoke(&gw.pool, minted.key.id).await.unwrap();
        assert!(ApiKey::verify(&gw.pool, &minted.plaintext).await.unwrap().is_none());
    }
}
