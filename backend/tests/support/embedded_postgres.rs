//! Per-test store databases cloned from a migrated template.
//!
//! The template is named after a hash of `backend/migrations`, so editing a
//! migration forces a fresh template. Platform roles are cluster-wide and are
//! provisioned before the template is migrated.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pg_embedded_setup_unpriv::test_support::hash_directory;
use pg_embedded_setup_unpriv::{ClusterHandle, TemporaryDatabase};
use postgres::{Client, NoTls};
use tokio::runtime::Runtime;
use uuid::Uuid;
use woo_sync_store::outbound::persistence::{
    DbPool, PoolConfig, provision_platform_roles, run_pending_migrations,
};

use super::format_postgres_error;
use super::shared_cluster::shared_cluster_handle;

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TEMPLATE_NAME_PREFIX: &str = "woo_store_template";
const TEMPLATE_PROVISION_RETRIES: usize = 5;
const TEMPLATE_PROVISION_RETRY_DELAY: Duration = Duration::from_millis(500);

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

fn template_database_name() -> Result<String, String> {
    let hash =
        hash_directory(migrations_dir()).map_err(|err| format!("hash migrations: {err}"))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

/// Creates or reuses a template database with every migration applied.
fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, String> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| format!("template check: {err:?}"))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| format!("create template: {err:?}"))?;
        let url = cluster.connection().database_url(&template_name);
        provision_platform_roles(&url).map_err(|err| err.to_string())?;
        run_pending_migrations(&url).map_err(|err| err.to_string())?;
    }

    Ok(template_name)
}

fn provision_template_database(cluster: &ClusterHandle) -> Result<TemporaryDatabase, String> {
    let mut last_error = String::from("create database from template: exhausted retries");
    for attempt in 1..=TEMPLATE_PROVISION_RETRIES {
        let outcome = ensure_template_database(cluster).and_then(|template_name| {
            let db_name = format!("test_{}", Uuid::new_v4().simple());
            cluster
                .temporary_database_from_template(db_name.as_str(), template_name.as_str())
                .map_err(|error| format!("create database from template: {error:?}"))
        });
        match outcome {
            Ok(database) => return Ok(database),
            Err(error) => {
                last_error = format!("attempt {attempt}/{TEMPLATE_PROVISION_RETRIES}: {error}");
            }
        }
        if attempt < TEMPLATE_PROVISION_RETRIES {
            std::thread::sleep(TEMPLATE_PROVISION_RETRY_DELAY);
        }
    }
    Err(last_error)
}

/// A migrated store database plus a pool and runtime to drive it.
pub struct StoreDatabase {
    pub runtime: Runtime,
    pub pool: DbPool,
    pub url: String,
    _database: TemporaryDatabase,
}

impl StoreDatabase {
    /// Run raw SQL as the connecting (superuser) login, bypassing RLS.
    pub fn execute_as_owner(&self, sql: &str) -> Result<(), String> {
        let mut client =
            Client::connect(self.url.as_str(), NoTls).map_err(|err| format_postgres_error(&err))?;
        client
            .batch_execute(sql)
            .map_err(|err| format_postgres_error(&err))
    }

    /// Count rows of `table` as the connecting login.
    pub fn count_as_owner(&self, table: &str) -> Result<i64, String> {
        let mut client =
            Client::connect(self.url.as_str(), NoTls).map_err(|err| format_postgres_error(&err))?;
        let row = client
            .query_one(format!("SELECT COUNT(*) FROM {table}").as_str(), &[])
            .map_err(|err| format_postgres_error(&err))?;
        Ok(row.get(0))
    }
}

/// Clone a fresh database from the template and open a small pool on it.
pub fn provision_store_database() -> Result<StoreDatabase, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = shared_cluster_handle().map_err(|err| err.to_string())?;
    let database = provision_template_database(cluster)?;
    let url = database.url().to_owned();

    let config = PoolConfig::new(url.as_str())
        .with_max_size(2)
        .with_min_idle(Some(1));
    let pool = runtime
        .block_on(async { DbPool::new(config).await })
        .map_err(|err| err.to_string())?;

    Ok(StoreDatabase {
        runtime,
        pool,
        url,
        _database: database,
    })
}
