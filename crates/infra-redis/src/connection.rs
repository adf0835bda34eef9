// Redis Connection Setup

use processor_core::domain::ConnectionConfig;
use processor_core::port::BrokerError;
use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use std::time::Duration;
use tracing::debug;

/// Used when the connection config has no `connect_timeout`
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Helper to convert redis::RedisError into the port's error taxonomy
pub(crate) fn map_redis_error(err: redis::RedisError) -> BrokerError {
    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_io_error()
        || err.is_timeout()
    {
        BrokerError::Connection(err.to_string())
    } else {
        BrokerError::Command(err.to_string())
    }
}

/// Build client connection info. The URL form, when present, wins over every other field.
pub fn connection_info(config: &ConnectionConfig) -> Result<ConnectionInfo, BrokerError> {
    if let Some(url) = &config.url {
        return url
            .as_str()
            .into_connection_info()
            .map_err(|e| BrokerError::InvalidOption(format!("invalid redis url: {}", e)));
    }

    let password = if config.password.is_empty() {
        None
    } else {
        Some(config.password.clone())
    };
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            username: config.username.clone(),
            password,
            ..Default::default()
        },
    })
}

pub(crate) fn connect_timeout(config: &ConnectionConfig) -> Duration {
    config
        .connect_timeout
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

pub(crate) fn open_client(config: &ConnectionConfig) -> Result<redis::Client, BrokerError> {
    redis::Client::open(connection_info(config)?).map_err(map_redis_error)
}

/// Open a multiplexed connection, bounded by `timeout`
pub(crate) async fn connect(
    client: &redis::Client,
    timeout: Duration,
) -> Result<MultiplexedConnection, BrokerError> {
    match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
        Ok(result) => result.map_err(map_redis_error),
        Err(_) => Err(BrokerError::Connection(format!(
            "connection attempt timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Connect and PING once. Used at startup when lazy connect is disabled.
pub async fn verify_connection(config: &ConnectionConfig) -> Result<(), BrokerError> {
    let client = open_client(config)?;
    let mut conn = connect(&client, connect_timeout(config)).await?;
    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(map_redis_error)?;
    debug!(target = %config.redacted(), reply = %pong, "Redis connection verified");
    Ok(())
}
