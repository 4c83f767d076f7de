//! One embedded PostgreSQL cluster per test binary.
//!
//! `pg-embed-setup-unpriv` leaks the shared cluster guard so it lives for the
//! whole process; suites clone per-test databases from a migrated template.

use std::time::Duration;

use pg_embedded_setup_unpriv::{BootstrapResult, ClusterHandle};

const SHARED_CLUSTER_RETRIES: usize = 5;
const SHARED_CLUSTER_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Shared cluster handle, bootstrapping it on first use.
pub fn shared_cluster_handle() -> BootstrapResult<&'static ClusterHandle> {
    ensure_stable_password();
    expose_worker_binary();
    let mut attempt = 1;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(error) => {
                if attempt >= SHARED_CLUSTER_RETRIES {
                    return Err(error);
                }
                std::thread::sleep(SHARED_CLUSTER_RETRY_DELAY);
                attempt += 1;
            }
        }
    }
}

/// Pin `PG_PASSWORD` so a reused data directory keeps accepting logins
/// across test binaries.
fn ensure_stable_password() {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: runs before the library spawns threads; the shared cluster
        // singleton serialises bootstrap.
        unsafe {
            std::env::set_var("PG_PASSWORD", "woo_store_embedded_test");
        }
    }
}

/// Point the bootstrap at this package's `pg_worker`, which it stages and
/// runs when the suite executes as root. Cargo only exposes the binary path
/// at compile time.
fn expose_worker_binary() {
    if std::env::var_os("PG_EMBEDDED_WORKER").is_none()
        && std::env::var_os("CARGO_BIN_EXE_pg_worker").is_none()
    {
        // SAFETY: as for `ensure_stable_password`.
        unsafe {
            std::env::set_var("CARGO_BIN_EXE_pg_worker", env!("CARGO_BIN_EXE_pg_worker"));
        }
    }
}
