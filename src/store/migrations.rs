use crate::error::{RegistryError, Result};
use deadpool_postgres::Pool;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

const MIGRATIONS_TABLE: &str = "_share_registration_migrations";

/// Schema migrations compiled into the binary, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial.sql",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct MigrationRunner;

impl MigrationRunner {
    pub fn new() -> Self {
        Self
    }

    async fn ensure_migrations_table(&self, pool: &Pool) -> Result<()> {
        let client = pool.get().await?;

        client
            .batch_execute(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id SERIAL PRIMARY KEY,
                    migration_file TEXT NOT NULL UNIQUE,
                    checksum TEXT NOT NULL,
                    applied_at TIMESTAMPTZ DEFAULT NOW()
                )
                "#,
                MIGRATIONS_TABLE
            ))
            .await
            .map_err(|e| RegistryError::MigrationFailed {
                migration: format!("{} table creation", MIGRATIONS_TABLE),
                cause: e.to_string(),
            })?;

        Ok(())
    }

    async fn applied_migrations(&self, pool: &Pool) -> Result<Vec<(String, String)>> {
        let client = pool.get().await?;

        let rows = client
            .query(
                &format!(
                    "SELECT migration_file, checksum FROM {} ORDER BY id",
                    MIGRATIONS_TABLE
                ),
                &[],
            )
            .await
            .map_err(|e| RegistryError::MigrationFailed {
                migration: "query applied migrations".to_string(),
                cause: e.to_string(),
            })?;

        Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
    }

    /// Applies every pending migration in its own transaction. Returns how many ran.
    pub async fn run(&self, pool: &Pool) -> Result<usize> {
        self.ensure_migrations_table(pool).await?;
        let applied = self.applied_migrations(pool).await?;

        let mut count = 0;
        for (name, sql) in MIGRATIONS {
            let checksum = compute_checksum(sql);

            if let Some((_, recorded)) = applied.iter().find(|(file, _)| file == name) {
                if *recorded != checksum {
                    warn!(
                        "Migration {} changed since it was applied (recorded {}, now {})",
                        name, recorded, checksum
                    );
                } else {
                    debug!("Migration {} already applied", name);
                }
                continue;
            }

            let mut client = pool.get().await?;
            let tx = client.transaction().await?;

            tx.batch_execute(sql)
                .await
                .map_err(|e| RegistryError::MigrationFailed {
                    migration: name.to_string(),
                    cause: e.to_string(),
                })?;

            tx.execute(
                &format!(
                    "INSERT INTO {} (migration_file, checksum) VALUES ($1, $2)",
                    MIGRATIONS_TABLE
                ),
                &[name, &checksum],
            )
            .await?;

            tx.commit().await.map_err(|e| RegistryError::MigrationFailed {
                migration: name.to_string(),
                cause: e.to_string(),
            })?;

            info!("Applied migration {}", name);
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sha256_hex() {
        let checksum = compute_checksum("CREATE TABLE t (id INT);");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum("CREATE TABLE t (id INT);"));
        assert_ne!(checksum, compute_checksum("CREATE TABLE t (id BIGINT);"));
    }

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
        assert!(MIGRATIONS.iter().all(|(_, sql)| !sql.trim().is_empty()));
    }
}
