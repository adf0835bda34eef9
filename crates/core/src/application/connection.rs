// Connection Resolver
// Layers env overrides over the static snapshot over hard defaults, field by field.

use crate::domain::connection::{DEFAULT_DB, DEFAULT_HOST, DEFAULT_PORT};
use crate::domain::{ConnectionConfig, DomainError};
use crate::error::Result;
use crate::port::EnvSource;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const ENV_URL: &str = "PROCESSOR_REDIS_URL";
pub const ENV_HOST: &str = "PROCESSOR_REDIS_HOST";
pub const ENV_PORT: &str = "PROCESSOR_REDIS_PORT";
pub const ENV_PASSWORD: &str = "PROCESSOR_REDIS_PASSWORD";
pub const ENV_USERNAME: &str = "PROCESSOR_REDIS_USERNAME";
pub const ENV_DB: &str = "PROCESSOR_REDIS_DB";
pub const ENV_LAZY_CONNECT: &str = "PROCESSOR_REDIS_LAZY_CONNECT";
pub const ENV_CONNECT_TIMEOUT: &str = "PROCESSOR_REDIS_CONNECT_TIMEOUT";

/// Snapshot keys owned by the resolver; everything else is passthrough.
/// Both camelCase and snake_case spellings are accepted.
const KNOWN_KEYS: &[&str] = &[
    "url",
    "host",
    "port",
    "password",
    "username",
    "db",
    "lazyConnect",
    "lazy_connect",
    "connectTimeout",
    "connect_timeout",
];

/// Resolves the process connection from a static snapshot and an env source
pub struct ConnectionResolver {
    env: Arc<dyn EnvSource>,
}

impl ConnectionResolver {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    /// Resolve against the env state as it is right now
    pub fn resolve(&self, static_config: &Map<String, Value>) -> Result<ConnectionConfig> {
        resolve_connection(static_config, self.env.as_ref())
    }
}

/// Resolve a connection.
///
/// Env parse failures never error: the static value (or default) is used
/// instead. A static value of the wrong JSON type is a configuration error.
pub fn resolve_connection(
    static_config: &Map<String, Value>,
    env: &dyn EnvSource,
) -> Result<ConnectionConfig> {
    let url = env_string(env, ENV_URL).or(static_string(static_config, &["url"])?);

    let host = env_string(env, ENV_HOST)
        .or(static_string(static_config, &["host"])?)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match env_parsed::<u16>(env, ENV_PORT) {
        Some(port) => port,
        None => static_number(static_config, &["port"])?.unwrap_or(DEFAULT_PORT),
    };

    let password = env_string(env, ENV_PASSWORD)
        .or(static_string(static_config, &["password"])?)
        .unwrap_or_default();

    let username = env_string(env, ENV_USERNAME).or(static_string(static_config, &["username"])?);

    let db = match env_parsed::<i64>(env, ENV_DB) {
        Some(db) => db,
        None => static_number(static_config, &["db"])?.unwrap_or(DEFAULT_DB),
    };

    let lazy_connect = match env_bool(env, ENV_LAZY_CONNECT) {
        Some(flag) => Some(flag),
        None => static_bool(static_config, &["lazyConnect", "lazy_connect"])?,
    };

    let connect_timeout = match env_parsed::<u64>(env, ENV_CONNECT_TIMEOUT) {
        Some(timeout) => Some(timeout),
        None => static_number(static_config, &["connectTimeout", "connect_timeout"])?,
    };

    let extra = static_config
        .iter()
        .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(ConnectionConfig {
        url,
        host,
        port,
        password,
        username,
        db,
        lazy_connect,
        connect_timeout,
        extra,
    })
}

/// Env string value. Empty strings count as unset.
fn env_string(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(env: &dyn EnvSource, key: &str) -> Option<T> {
    let raw = env_string(env, key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(key = key, value = %raw, "Ignoring unparsable env override");
            None
        }
    }
}

/// Only the literals `true` and `false` override
fn env_bool(env: &dyn EnvSource, key: &str) -> Option<bool> {
    match env_string(env, key)?.as_str() {
        "true" => Some(true),
        "false" => Some(false),
        other => {
            debug!(key = key, value = %other, "Ignoring non-boolean env override");
            None
        }
    }
}

fn static_value<'a>(config: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a str, &'a Value)> {
    keys.iter().find_map(|key| {
        config
            .get_key_value(*key)
            .filter(|(_, value)| !value.is_null())
            .map(|(k, v)| (k.as_str(), v))
    })
}

fn static_string(config: &Map<String, Value>, keys: &[&str]) -> Result<Option<String>> {
    match static_value(config, keys) {
        None => Ok(None),
        Some((_, Value::String(s))) if s.is_empty() => Ok(None),
        Some((_, Value::String(s))) => Ok(Some(s.clone())),
        Some((key, other)) => Err(invalid(key, format!("expected a string, got {}", other))),
    }
}

fn static_number<T>(config: &Map<String, Value>, keys: &[&str]) -> Result<Option<T>>
where
    T: std::str::FromStr + TryFrom<i64> + TryFrom<u64>,
{
    let Some((key, value)) = static_value(config, keys) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| <T as TryFrom<u64>>::try_from(n).ok())
            .or_else(|| n.as_i64().and_then(|n| <T as TryFrom<i64>>::try_from(n).ok()))
            .or_else(|| n.as_f64().and_then(whole_float)),
        Value::String(s) => s.trim().parse::<T>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| invalid(key, format!("expected an integer, got {}", value)))
}

// `6380.0` is accepted, `6380.5` is not
fn whole_float<T>(f: f64) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    if f >= 0.0 && f < u64::MAX as f64 {
        <T as TryFrom<u64>>::try_from(f as u64).ok()
    } else if f < 0.0 && f >= i64::MIN as f64 {
        <T as TryFrom<i64>>::try_from(f as i64).ok()
    } else {
        None
    }
}

fn static_bool(config: &Map<String, Value>, keys: &[&str]) -> Result<Option<bool>> {
    match static_value(config, keys) {
        None => Ok(None),
        Some((_, Value::Bool(b))) => Ok(Some(*b)),
        Some((key, other)) => Err(invalid(key, format!("expected a boolean, got {}", other))),
    }
}

fn invalid(field: &str, reason: String) -> crate::error::AppError {
    DomainError::InvalidField {
        field: field.to_string(),
        reason,
    }
    .into()
}
