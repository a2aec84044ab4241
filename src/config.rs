use {
    crate::domain::money::Currency,
    std::{net::SocketAddr, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub bind_addr: SocketAddr,
    pub currency: Currency,
    pub gateway_timeout: Duration,
    pub db_max_connections: u32,
    pub webhook_tolerance_secs: i64,
}

impl Config {
    /// Read the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let currency_raw = lookup("STORE_CURRENCY").unwrap_or_else(|| "usd".to_string());
        let currency = Currency::try_from(currency_raw.as_str()).map_err(|e| ConfigError::Invalid {
            name: "STORE_CURRENCY",
            value: currency_raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", "0.0.0.0:3000".parse().ok())?,
            currency,
            gateway_timeout: Duration::from_secs(parse_or(
                &lookup,
                "GATEWAY_TIMEOUT_SECS",
                Some(10),
            )?),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", Some(20))?,
            webhook_tolerance_secs: parse_or(&lookup, "WEBHOOK_TOLERANCE_SECS", Some(300))?,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/stayspace"),
        ("STRIPE_SECRET_KEY", "sk_test_x"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_x"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = Config::from_lookup(env(&REQUIRED)).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.currency, Currency::Usd);
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.db_max_connections, 20);
        assert_eq!(config.webhook_tolerance_secs, 300);
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = Config::from_lookup(env(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STRIPE_WEBHOOK_SECRET")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GATEWAY_TIMEOUT_SECS", "soon"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "GATEWAY_TIMEOUT_SECS", .. }));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STORE_CURRENCY", "btc"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE_CURRENCY", .. }));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([("BIND_ADDR", "127.0.0.1:8080"), ("STORE_CURRENCY", "EUR")]);
        let config = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.currency, Currency::Eur);
    }
}
