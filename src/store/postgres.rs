use super::migrations::MigrationRunner;
use super::RegistrationFilter;
use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::models::{NewRegistration, PushedData, PushedFields, RegistrationInfo, User};
use chrono::{NaiveDate, Utc};
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const REGISTRATION_COLUMNS: &str = "id, base_url, description, contact_email, contact_name, \
    oai_provider, provider_short_name, provider_long_name, meta_tos, meta_license, meta_privacy, \
    meta_sharing_tos, meta_license_extended, meta_future_license, property_list, approved_sets, \
    registration_date";

const PUSHED_COLUMNS: &str =
    "id, url, doi, tags, title, service_id, description, contributors, date_updated, source_id";

const USER_COLUMNS: &str = "id, username, token_hash, date_joined";

const UPDATE_PUSHED: &str = "UPDATE pushed_data SET url = $2, doi = $3, tags = $4, title = $5, \
     service_id = $6, description = $7, contributors = $8, date_updated = $9 WHERE id = $1";

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = create_pool(&config.database_url, config.max_db_connections)?;

        // Test connection
        let client = pool.get().await.map_err(|e| RegistryError::StorageUnavailable {
            cause: e.to_string(),
        })?;
        client.execute("SELECT 1", &[]).await.map_err(|e| {
            RegistryError::StorageUnavailable {
                cause: format!("Ping failed: {}", e),
            }
        })?;
        drop(client);

        info!("Connected to PostgreSQL");

        let applied = MigrationRunner::new().run(&pool).await?;
        if applied > 0 {
            info!("Applied {} schema migration(s)", applied);
        }

        Ok(Self { pool })
    }

    pub async fn ping(&self) -> bool {
        match self.pool.get().await {
            Ok(client) => client.execute("SELECT 1", &[]).await.is_ok(),
            Err(_) => false,
        }
    }

    pub async fn create_registration(&self, new: NewRegistration) -> Result<RegistrationInfo> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO registration_info (contact_name, contact_email, registration_date) \
                     VALUES ($1, $2, $3) RETURNING {}",
                    REGISTRATION_COLUMNS
                ),
                &[&new.contact_name, &new.contact_email, &Utc::now()],
            )
            .await?;
        Ok(registration_from_row(&row))
    }

    pub async fn get_registration(&self, id: i64) -> Result<Option<RegistrationInfo>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM registration_info WHERE id = $1", REGISTRATION_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(registration_from_row))
    }

    pub async fn save_registration(&self, r: &RegistrationInfo) -> Result<()> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE registration_info SET base_url = $2, description = $3, contact_email = $4, \
                 contact_name = $5, oai_provider = $6, provider_short_name = $7, provider_long_name = $8, \
                 meta_tos = $9, meta_license = $10, meta_privacy = $11, meta_sharing_tos = $12, \
                 meta_license_extended = $13, meta_future_license = $14, property_list = $15, \
                 approved_sets = $16, registration_date = $17 WHERE id = $1",
                &[
                    &r.id,
                    &r.base_url,
                    &r.description,
                    &r.contact_email,
                    &r.contact_name,
                    &r.oai_provider,
                    &r.provider_short_name,
                    &r.provider_long_name,
                    &r.meta_tos,
                    &r.meta_license,
                    &r.meta_privacy,
                    &r.meta_sharing_tos,
                    &r.meta_license_extended,
                    &r.meta_future_license,
                    &r.property_list,
                    &r.approved_sets,
                    &r.registration_date,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(RegistryError::RegistrationNotFound { reg_id: r.id });
        }
        Ok(())
    }

    pub async fn find_registration_by_name(&self, name: &str) -> Result<Option<RegistrationInfo>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM registration_info WHERE provider_long_name = $1 ORDER BY id LIMIT 1",
                    REGISTRATION_COLUMNS
                ),
                &[&name],
            )
            .await?;
        Ok(row.as_ref().map(registration_from_row))
    }

    pub async fn list_registrations(&self, filter: &RegistrationFilter) -> Result<Vec<RegistrationInfo>> {
        let client = self.pool.get().await?;
        let limit = filter.limit.map(|l| l as i64);

        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM registration_info \
                     WHERE ($1::TEXT IS NULL OR provider_long_name ILIKE '%' || $1 || '%') \
                       AND ($2::TIMESTAMPTZ IS NULL OR registration_date >= $2) \
                     ORDER BY registration_date, id LIMIT $3",
                    REGISTRATION_COLUMNS
                ),
                &[&filter.search, &filter.registered_since, &limit],
            )
            .await?;

        Ok(rows.iter().map(registration_from_row).collect())
    }

    pub async fn create_user(&self, username: &str, token_hash: &str) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO users (username, token_hash, date_joined) VALUES ($1, $2, $3) RETURNING {}",
                    USER_COLUMNS
                ),
                &[&username, &token_hash, &Utc::now()],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    RegistryError::UsernameTaken {
                        username: username.to_string(),
                    }
                } else {
                    RegistryError::from(e)
                }
            })?;
        Ok(user_from_row(&row))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS), &[&id])
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn find_user_by_token(&self, token_hash: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE token_hash = $1", USER_COLUMNS),
                &[&token_hash],
            )
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn set_user_token(&self, id: i64, token_hash: &str) -> Result<()> {
        let client = self.pool.get().await?;
        let updated = client
            .execute("UPDATE users SET token_hash = $2 WHERE id = $1", &[&id, &token_hash])
            .await?;
        if updated == 0 {
            return Err(RegistryError::NotFound { resource: "User", id });
        }
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS), &[])
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    pub async fn create_pushed(
        &self,
        source_id: i64,
        fields: PushedFields,
        today: NaiveDate,
    ) -> Result<PushedData> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO pushed_data (url, doi, tags, title, service_id, description, contributors, date_updated, source_id) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
                    PUSHED_COLUMNS
                ),
                &[
                    &fields.url,
                    &fields.doi,
                    &fields.tags,
                    &fields.title,
                    &fields.service_id,
                    &fields.description,
                    &fields.contributors,
                    &today,
                    &source_id,
                ],
            )
            .await?;
        Ok(pushed_from_row(&row))
    }

    pub async fn get_pushed(&self, id: i64) -> Result<Option<PushedData>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&format!("SELECT {} FROM pushed_data WHERE id = $1", PUSHED_COLUMNS), &[&id])
            .await?;
        Ok(row.as_ref().map(pushed_from_row))
    }

    pub async fn list_pushed(&self, source_id: Option<i64>) -> Result<Vec<PushedData>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM pushed_data WHERE ($1::BIGINT IS NULL OR source_id = $1) ORDER BY id",
                    PUSHED_COLUMNS
                ),
                &[&source_id],
            )
            .await?;
        Ok(rows.iter().map(pushed_from_row).collect())
    }

    pub async fn save_pushed(&self, d: &PushedData) -> Result<()> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                UPDATE_PUSHED,
                &[
                    &d.id,
                    &d.url,
                    &d.doi,
                    &d.tags,
                    &d.title,
                    &d.service_id,
                    &d.description,
                    &d.contributors,
                    &d.date_updated,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(RegistryError::NotFound {
                resource: "PushedData",
                id: d.id,
            });
        }
        Ok(())
    }

    /// Updates every record in one transaction; an unknown id rolls all of them back.
    pub async fn save_pushed_many(&self, records: &[PushedData]) -> Result<()> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let statement = tx.prepare(UPDATE_PUSHED).await?;

        for d in records {
            let updated = tx
                .execute(
                    &statement,
                    &[
                        &d.id,
                        &d.url,
                        &d.doi,
                        &d.tags,
                        &d.title,
                        &d.service_id,
                        &d.description,
                        &d.contributors,
                        &d.date_updated,
                    ],
                )
                .await?;
            if updated == 0 {
                return Err(RegistryError::NotFound {
                    resource: "PushedData",
                    id: d.id,
                });
            }
        }

        tx.commit().await?;
        debug!("Saved {} pushed record(s) in one transaction", records.len());
        Ok(())
    }

    pub async fn delete_pushed(&self, id: i64) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM pushed_data WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}

fn registration_from_row(row: &Row) -> RegistrationInfo {
    RegistrationInfo {
        id: row.get("id"),
        base_url: row.get("base_url"),
        description: row.get("description"),
        contact_email: row.get("contact_email"),
        contact_name: row.get("contact_name"),
        oai_provider: row.get("oai_provider"),
        provider_short_name: row.get("provider_short_name"),
        provider_long_name: row.get("provider_long_name"),
        meta_tos: row.get("meta_tos"),
        meta_license: row.get("meta_license"),
        meta_privacy: row.get("meta_privacy"),
        meta_sharing_tos: row.get("meta_sharing_tos"),
        meta_license_extended: row.get("meta_license_extended"),
        meta_future_license: row.get("meta_future_license"),
        property_list: row.get("property_list"),
        approved_sets: row.get("approved_sets"),
        registration_date: row.get("registration_date"),
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        token_hash: row.get("token_hash"),
        date_joined: row.get("date_joined"),
    }
}

fn pushed_from_row(row: &Row) -> PushedData {
    PushedData {
        id: row.get("id"),
        url: row.get("url"),
        doi: row.get("doi"),
        tags: row.get("tags"),
        title: row.get("title"),
        service_id: row.get("service_id"),
        description: row.get("description"),
        contributors: row.get("contributors"),
        date_updated: row.get("date_updated"),
        source_id: row.get("source_id"),
    }
}

fn create_pool(database_url: &str, max_size: u32) -> Result<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(database_url.to_string());

    cfg.pool = Some(deadpool_postgres::PoolConfig {
        max_size: max_size as usize,
        timeouts: deadpool_postgres::Timeouts {
            wait: Some(Duration::from_secs(5)),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| RegistryError::Internal(format!("Failed to create pool: {}", e)))
}
