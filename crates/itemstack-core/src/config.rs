//! Storage configuration.

use std::env;

/// Storage facade configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Hosts used to discover the column-store cluster.
    pub contact_points: Vec<String>,
    /// Tenant used when the caller does not name one.
    pub default_tenant: String,
    /// Page size of `list_tables_page` when no limit is given.
    pub list_tables_page_size: usize,
}

impl StorageConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            contact_points: env::var("STORAGE_CONTACT_POINTS")
                .map(|v| parse_list(&v))
                .ok()
                .filter(|points| !points.is_empty())
                .unwrap_or(defaults.contact_points),
            default_tenant: env::var("STORAGE_DEFAULT_TENANT")
                .unwrap_or(defaults.default_tenant),
            list_tables_page_size: env_usize(
                "STORAGE_LIST_TABLES_PAGE_SIZE",
                defaults.list_tables_page_size,
            ),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            contact_points: vec!["localhost".to_owned()],
            default_tenant: "default_tenant".to_owned(),
            list_tables_page_size: 100,
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
