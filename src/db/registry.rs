//! Lookup into the organization registry

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

use crate::error::GatewayError;
use crate::event::Provider;

/// A registered organization binding, keyed by provider installation id.
/// Owned by the platform's onboarding flow; the gateway only reads it.
#[derive(Debug, Clone, FromRow)]
pub struct GitOrganization {
    pub installation_id: String,
    pub provider: String,
    pub name: String,
}

/// Read side of the organization registry.
///
/// The pipeline uses this to decide whether an inbound installation belongs
/// to an onboarded tenant. Implementations must be safe for concurrent use.
#[async_trait]
pub trait OrganizationRegistry: Send + Sync {
    async fn get_organization_by_installation_id(
        &self,
        installation_id: &str,
        provider: Provider,
    ) -> Result<Option<GitOrganization>, GatewayError>;
}

/// SQLite-backed registry
#[derive(Clone)]
pub struct SqlOrganizationRegistry {
    pool: SqlitePool,
}

impl SqlOrganizationRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers or renames an organization binding. Provisioning is the
    /// platform's job; this helper exists for that side and for tests.
    pub async fn upsert_organization(
        &self,
        installation_id: &str,
        provider: Provider,
        name: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            r#"
            INSERT INTO git_organizations (installation_id, provider, name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(installation_id, provider) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(installation_id)
        .bind(provider.as_str())
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::DatabaseError(format!("Failed to upsert organization: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl OrganizationRegistry for SqlOrganizationRegistry {
    async fn get_organization_by_installation_id(
        &self,
        installation_id: &str,
        provider: Provider,
    ) -> Result<Option<GitOrganization>, GatewayError> {
        let org = sqlx::query_as::<_, GitOrganization>(
            r#"
            SELECT installation_id, provider, name
            FROM git_organizations
            WHERE installation_id = ? AND provider = ?
            "#,
        )
        .bind(installation_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            GatewayError::DatabaseError(format!("Failed to look up organization: {}", e))
        })?;

        Ok(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection so every query sees the same in-memory database.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn lookup_returns_registered_binding() {
        let registry = SqlOrganizationRegistry::new(test_pool().await);
        registry
            .upsert_organization("123", Provider::Github, "acme")
            .await
            .unwrap();

        let org = registry
            .get_organization_by_installation_id("123", Provider::Github)
            .await
            .unwrap()
            .expect("binding should exist");
        assert_eq!(org.installation_id, "123");
        assert_eq!(org.provider, "github");
        assert_eq!(org.name, "acme");
    }

    #[tokio::test]
    async fn lookup_of_unknown_installation_is_empty() {
        let registry = SqlOrganizationRegistry::new(test_pool().await);

        let org = registry
            .get_organization_by_installation_id("999", Provider::Github)
            .await
            .unwrap();
        assert!(org.is_none());
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let registry = SqlOrganizationRegistry::new(test_pool().await);
        registry
            .upsert_organization("123", Provider::Github, "acme")
            .await
            .unwrap();
        registry
            .upsert_organization("123", Provider::Github, "acme-renamed")
            .await
            .unwrap();

        let org = registry
            .get_organization_by_installation_id("123", Provider::Github)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.name, "acme-renamed");
    }
}
