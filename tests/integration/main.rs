//! Integration test entry point
//!
//! Run with: MAXROWS_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! The proxy must already be running in front of a MySQL 8 server.
//!
//! Environment variables:
//! - MAXROWS_RUN_INTEGRATION_TESTS: Set to "1" to enable integration tests
//! - MAXROWS_TEST_PROXY_HOST: Proxy host (default: 127.0.0.1)
//! - MAXROWS_TEST_PROXY_PORT: Proxy port (default: 4006)
//! - MAXROWS_TEST_PROXY_USER: Proxy user (default: root)
//! - MAXROWS_TEST_PROXY_PASS: Proxy password (default: empty)
//! - MAXROWS_TEST_PROXY_DB: Database (default: test)
//! - MAXROWS_TEST_ROW_LIMIT: max_resultset_rows the proxy runs with (default: 100)

mod maxrows;

use mysql::{OptsBuilder, Pool, PooledConn};
use std::env;

/// Check if integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("MAXROWS_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!("Skipping integration test (set MAXROWS_RUN_INTEGRATION_TESTS=1 to run)");
            return;
        }
    };
}

/// Get proxy connection config from environment
pub fn get_proxy_config() -> ProxyTestConfig {
    ProxyTestConfig {
        host: env::var("MAXROWS_TEST_PROXY_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: env::var("MAXROWS_TEST_PROXY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4006),
        user: env::var("MAXROWS_TEST_PROXY_USER").unwrap_or_else(|_| "root".to_string()),
        password: env::var("MAXROWS_TEST_PROXY_PASS").unwrap_or_default(),
        database: env::var("MAXROWS_TEST_PROXY_DB").unwrap_or_else(|_| "test".to_string()),
    }
}

/// Row limit the running proxy was configured with
pub fn get_row_limit() -> u64 {
    env::var("MAXROWS_TEST_ROW_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

/// Proxy test configuration
#[derive(Debug, Clone)]
pub struct ProxyTestConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ProxyTestConfig {
    /// Create a connection pool to the proxy
    pub fn pool(&self) -> Pool {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(&self.host))
            .tcp_port(self.port)
            .user(Some(&self.user))
            .pass(Some(&self.password))
            .db_name(Some(&self.database));
        Pool::new(opts).expect("Failed to create connection pool")
    }

    /// Get a single connection to the proxy
    pub fn conn(&self) -> PooledConn {
        self.pool().get_conn().expect("Failed to get connection")
    }
}

/// A query returning exactly `rows` rows with a single integer column
pub fn sequence_query(rows: u64) -> String {
    format!(
        "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {}) \
         SELECT n FROM seq",
        rows
    )
}
