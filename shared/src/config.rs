//! Process-wide configuration, read once at cold start

use std::env;

use crate::error::ConfigError;

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

/// Values injected into the token service and the store at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// HMAC secret used to sign and verify bearer tokens
    pub jwt_secret: String,

    /// DynamoDB table holding every entity
    pub table_name: String,

    /// Token lifetime in hours
    pub token_ttl_hours: i64,

    /// Cap on entries returned by the admin audit listing
    pub audit_query_limit: usize,
}

impl Config {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            table_name: "bookclub".to_string(),
            token_ttl_hours: 24,
            audit_query_limit: 500,
        }
    }

    /// Load from `JWT_SECRET`, `TABLE_NAME`, `TOKEN_TTL_HOURS` and `AUDIT_QUERY_LIMIT`
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let mut config = Self::new(jwt_secret);

        if let Ok(table_name) = env::var("TABLE_NAME") {
            config.table_name = table_name;
        }
        if let Ok(raw) = env::var("TOKEN_TTL_HOURS") {
            config.token_ttl_hours = parse_ttl_hours(&raw)?;
        }
        if let Ok(raw) = env::var("AUDIT_QUERY_LIMIT") {
            config.audit_query_limit = parse_positive("AUDIT_QUERY_LIMIT", &raw)?;
        }

        Ok(config)
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn with_token_ttl_hours(mut self, hours: i64) -> Self {
        self.token_ttl_hours = hours;
        self
    }

    pub fn with_audit_query_limit(mut self, limit: usize) -> Self {
        self.audit_query_limit = limit;
        self
    }
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_ttl_hours(raw: &str) -> Result<i64, ConfigError> {
    let hours = parse_positive("TOKEN_TTL_HOURS", raw)?;
    if hours > MAX_TOKEN_TTL_HOURS {
        return Err(ConfigError::Invalid {
            name: "TOKEN_TTL_HOURS",
            value: raw.to_string(),
        });
    }
    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::new("secret");
        assert_eq!(cfg.table_name, "bookclub");
        assert_eq!(cfg.token_ttl_hours, 24);
        assert_eq!(cfg.audit_query_limit, 500);
    }

    #[test]
    fn test_builder_overrides() {
        let cfg = Config::new("a")
            .with_jwt_secret("b")
            .with_table_name("bookclub-test")
            .with_token_ttl_hours(2)
            .with_audit_query_limit(10);
        assert_eq!(cfg.jwt_secret, "b");
        assert_eq!(cfg.table_name, "bookclub-test");
        assert_eq!(cfg.token_ttl_hours, 2);
        assert_eq!(cfg.audit_query_limit, 10);
    }

    #[test]
    fn test_parse_positive_rejects_zero_and_garbage() {
        assert!(parse_positive::<i64>("TOKEN_TTL_HOURS", "0").is_err());
        assert!(parse_positive::<i64>("TOKEN_TTL_HOURS", "-3").is_err());
        assert!(parse_positive::<usize>("AUDIT_QUERY_LIMIT", "lots").is_err());
        assert_eq!(parse_positive::<i64>("TOKEN_TTL_HOURS", " 12 ").unwrap(), 12);
    }

    #[test]
    fn test_token_ttl_is_bounded() {
        assert_eq!(parse_ttl_hours("8760").unwrap(), MAX_TOKEN_TTL_HOURS);
        assert!(matches!(
            parse_ttl_hours("8761"),
            Err(ConfigError::Invalid { name: "TOKEN_TTL_HOURS", .. })
        ));
        assert!(parse_ttl_hours("9223372036854775807").is_err());
        assert!(parse_ttl_hours("0").is_err());
    }
}
