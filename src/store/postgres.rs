use anyhow::{Context, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::model::{Entity, EntityKind, EntityStatus, Id, Node};
use crate::store::traits::{DuplicateEntry, EntityStore};

const ENTITY_COLUMNS: &str =
    "id, name, tenant_id, version, networking, status, description, created, updated";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn entity_from_row(kind: EntityKind, row: &PgRow) -> Result<Entity> {
    let description: Option<String> = row.try_get("description")?;
    let description = match description.as_deref() {
        None | Some("") => None,
        Some(text) => Some(
            serde_json::from_str::<Node>(text).context("Stored description is not valid JSON")?,
        ),
    };
    let status: String = row.try_get("status")?;
    let Json(networking): Json<serde_json::Value> = row.try_get("networking")?;

    Ok(Entity {
        id: row.try_get("id")?,
        kind,
        name: row.try_get("name")?,
        tenant_id: row.try_get("tenant_id")?,
        version: row.try_get("version")?,
        networking,
        status: EntityStatus::parse(&status).unwrap_or_default(), // Default fallback
        description,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl EntityStore for PostgresStore {
    async fn create_entity(&self, entity: Entity) -> Result<()> {
        let description = entity
            .description
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize description")?;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            entity.kind.table(),
            ENTITY_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(&entity.id)
            .bind(&entity.name)
            .bind(&entity.tenant_id)
            .bind(entity.version)
            .bind(Json(&entity.networking))
            .bind(entity.status.as_str())
            .bind(description)
            .bind(entity.created)
            .bind(entity.updated)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DuplicateEntry {
                kind: entity.kind,
                name: entity.name,
            }
            .into()),
            Err(e) => Err(e).context(format!("Failed to create {}", entity.kind)),
        }
    }

    async fn get_entity(&self, kind: EntityKind, id: &Id) -> Result<Option<Entity>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", ENTITY_COLUMNS, kind.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {}", kind))?;

        let Some(row) = row else {
            return Ok(None);
        };

        entity_from_row(kind, &row).map(Some)
    }

    async fn list_entities(&self, kind: EntityKind, tenant_id: &str) -> Result<Vec<Entity>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE tenant_id = $1 ORDER BY created, name",
            ENTITY_COLUMNS,
            kind.table()
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {}s", kind))?;

        rows.iter().map(|row| entity_from_row(kind, row)).collect()
    }

    async fn update_entity(&self, entity: &Entity) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET name = $2, version = $3, networking = $4, status = $5, updated = NOW() WHERE id = $1",
            entity.kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(&entity.id)
            .bind(&entity.name)
            .bind(entity.version)
            .bind(Json(&entity.networking))
            .bind(entity.status.as_str())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(DuplicateEntry {
                kind: entity.kind,
                name: entity.name.clone(),
            }
            .into()),
            Err(e) => Err(e).context(format!("Failed to update {}", entity.kind)),
        }
    }

    async fn save_description(&self, kind: EntityKind, id: &Id, description: Option<&Node>) -> Result<()> {
        let description = description
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize description")?;

        let sql = format!(
            "UPDATE {} SET description = $2, updated = NOW() WHERE id = $1",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(description)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to save {} description", kind))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("{} '{}' does not exist", kind, id);
        }
        Ok(())
    }

    async fn set_status(&self, kind: EntityKind, id: &Id, status: EntityStatus) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET status = $2, updated = NOW() WHERE id = $1",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to set {} status", kind))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("{} '{}' does not exist", kind, id);
        }
        Ok(())
    }

    async fn delete_entity(&self, kind: EntityKind, id: &Id) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {}", kind))?;

        Ok(result.rows_affected() > 0)
    }
}
