//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Checkout behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Upper bound for one call to the shipping cost resolver.
    pub shipping_quote_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            shipping_quote_timeout: Duration::from_secs(10),
        }
    }
}

impl CheckoutConfig {
    pub fn with_shipping_quote_timeout(mut self, timeout: Duration) -> Self {
        self.shipping_quote_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Process configuration. `database = None` selects the in-memory stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommerceConfig {
    pub database: Option<DatabaseConfig>,
    pub checkout: CheckoutConfig,
}

impl CommerceConfig {
    /// Read `USE_PERSISTENT_STORES`, `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`
    /// and `SHIPPING_QUOTE_TIMEOUT_MS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("SHIPPING_QUOTE_TIMEOUT_MS") {
            let ms: u64 = parse("SHIPPING_QUOTE_TIMEOUT_MS", &raw)?;
            config.checkout.shipping_quote_timeout = Duration::from_millis(ms);
        }

        let persistent = match lookup("USE_PERSISTENT_STORES") {
            Some(raw) => parse_bool("USE_PERSISTENT_STORES", &raw)?,
            None => false,
        };

        if persistent {
            let url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let mut database = DatabaseConfig::new(url);
            if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
                database.max_connections = parse("DATABASE_MAX_CONNECTIONS", &raw)?;
            }
            config.database = Some(database);
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_in_memory_with_ten_second_quote_timeout() {
        let config = CommerceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database, None);
        assert_eq!(config.checkout.shipping_quote_timeout, Duration::from_secs(10));
    }

    #[test]
    fn persistent_stores_require_database_url() {
        let err = CommerceConfig::from_lookup(lookup(&[("USE_PERSISTENT_STORES", "true")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn reads_database_and_timeout_settings() {
        let config = CommerceConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/storefront"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("SHIPPING_QUOTE_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/storefront");
        assert_eq!(database.max_connections, 25);
        assert_eq!(config.checkout.shipping_quote_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = CommerceConfig::from_lookup(lookup(&[("SHIPPING_QUOTE_TIMEOUT_MS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "SHIPPING_QUOTE_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );
    }
}
