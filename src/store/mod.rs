//! Storage for registrations, users and pushed records
//!
//! Two interchangeable backends sit behind [`Store`]:
//! - `Postgres`: deadpool-managed pool, schema migrations applied on connect
//! - `Memory`: `DashMap`-backed, for tests and throwaway deployments

mod memory;
mod migrations;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::models::{NewRegistration, PushedData, PushedFields, RegistrationInfo, User};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    /// Case-insensitive substring of `provider_long_name`.
    pub search: Option<String>,
    pub registered_since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

pub enum Store {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl Store {
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.storage_backend {
            StorageBackend::Memory => Ok(Store::Memory(MemoryStore::new())),
            StorageBackend::Postgres => Ok(Store::Postgres(PgStore::connect(config).await?)),
        }
    }

    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => StorageBackend::Memory.as_str(),
            Store::Postgres(_) => StorageBackend::Postgres.as_str(),
        }
    }

    pub async fn ping(&self) -> bool {
        match self {
            Store::Memory(_) => true,
            Store::Postgres(pg) => pg.ping().await,
        }
    }

    pub async fn create_registration(&self, new: NewRegistration) -> Result<RegistrationInfo> {
        match self {
            Store::Memory(m) => Ok(m.create_registration(new)),
            Store::Postgres(pg) => pg.create_registration(new).await,
        }
    }

    pub async fn get_registration(&self, id: i64) -> Result<Option<RegistrationInfo>> {
        match self {
            Store::Memory(m) => Ok(m.get_registration(id)),
            Store::Postgres(pg) => pg.get_registration(id).await,
        }
    }

    pub async fn save_registration(&self, registration: &RegistrationInfo) -> Result<()> {
        match self {
            Store::Memory(m) => m.save_registration(registration),
            Store::Postgres(pg) => pg.save_registration(registration).await,
        }
    }

    pub async fn find_registration_by_name(&self, name: &str) -> Result<Option<RegistrationInfo>> {
        match self {
            Store::Memory(m) => Ok(m.find_registration_by_name(name)),
            Store::Postgres(pg) => pg.find_registration_by_name(name).await,
        }
    }

    pub async fn list_registrations(&self, filter: &RegistrationFilter) -> Result<Vec<RegistrationInfo>> {
        match self {
            Store::Memory(m) => Ok(m.list_registrations(filter)),
            Store::Postgres(pg) => pg.list_registrations(filter).await,
        }
    }

    pub async fn create_user(&self, username: &str, token_hash: &str) -> Result<User> {
        match self {
            Store::Memory(m) => m.create_user(username, token_hash),
            Store::Postgres(pg) => pg.create_user(username, token_hash).await,
        }
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        match self {
            Store::Memory(m) => Ok(m.get_user(id)),
            Store::Postgres(pg) => pg.get_user(id).await,
        }
    }

    pub async fn find_user_by_token(&self, token_hash: &str) -> Result<Option<User>> {
        match self {
            Store::Memory(m) => Ok(m.find_user_by_token(token_hash)),
            Store::Postgres(pg) => pg.find_user_by_token(token_hash).await,
        }
    }

    pub async fn set_user_token(&self, id: i64, token_hash: &str) -> Result<()> {
        match self {
            Store::Memory(m) => m.set_user_token(id, token_hash),
            Store::Postgres(pg) => pg.set_user_token(id, token_hash).await,
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        match self {
            Store::Memory(m) => Ok(m.list_users()),
            Store::Postgres(pg) => pg.list_users().await,
        }
    }

    pub async fn create_pushed(
        &self,
        source_id: i64,
        fields: PushedFields,
        today: NaiveDate,
    ) -> Result<PushedData> {
        match self {
            Store::Memory(m) => Ok(m.create_pushed(source_id, fields, today)),
            Store::Postgres(pg) => pg.create_pushed(source_id, fields, today).await,
        }
    }

    pub async fn get_pushed(&self, id: i64) -> Result<Option<PushedData>> {
        match self {
            Store::Memory(m) => Ok(m.get_pushed(id)),
            Store::Postgres(pg) => pg.get_pushed(id).await,
        }
    }

    /// All records ordered by id, optionally only those owned by `source_id`.
    pub async fn list_pushed(&self, source_id: Option<i64>) -> Result<Vec<PushedData>> {
        match self {
            Store::Memory(m) => Ok(m.list_pushed(source_id)),
            Store::Postgres(pg) => pg.list_pushed(source_id).await,
        }
    }

    pub async fn save_pushed(&self, data: &PushedData) -> Result<()> {
        match self {
            Store::Memory(m) => m.save_pushed(data),
            Store::Postgres(pg) => pg.save_pushed(data).await,
        }
    }

    /// Saves every record or none of them.
    pub async fn save_pushed_many(&self, records: &[PushedData]) -> Result<()> {
        match self {
            Store::Memory(m) => m.save_pushed_many(records),
            Store::Postgres(pg) => pg.save_pushed_many(records).await,
        }
    }

    pub async fn delete_pushed(&self, id: i64) -> Result<bool> {
        match self {
            Store::Memory(m) => Ok(m.delete_pushed(id)),
            Store::Postgres(pg) => pg.delete_pushed(id).await,
        }
    }
}
