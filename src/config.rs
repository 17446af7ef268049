// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Connection Configuration
//!
//! This module holds the already-parsed configuration consumed by connection
//! resolution. The structure derives `Deserialize` so the hosting application can
//! bind it from any structured source, and it can also be bound from `RABBITMQ_*`
//! environment variables.
//!
//! Three fields address the broker: `endpoints`, `host_names` and `host`. They may
//! overlap freely, the precedence between them is applied by
//! [`resolve_connection`](crate::connection::resolve_connection).

use crate::errors::AmqpError;
use serde::Deserialize;
use std::{str::FromStr, time::Duration};
use tracing::error;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_USER: &str = "guest";
pub const DEFAULT_PASSWORD: &str = "guest";
pub const DEFAULT_VHOST: &str = "/";
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEARTBEAT_SECS: u16 = 60;

/// A single `(host, port)` broker address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = AmqpError;

    /// Parses `host:port`. A bare `host` takes the default AMQP port.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|err| {
                    error!(error = err.to_string(), endpoint = value, "invalid endpoint port");
                    AmqpError::InvalidConfiguration(value.to_owned())
                })?;
                (host, port)
            }
            None => (value, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(AmqpError::InvalidConfiguration(value.to_owned()));
        }

        Ok(Endpoint::new(host, port))
    }
}

/// Connection settings for RabbitMQ.
///
/// Every field has a default, so partial input deserializes to a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub automatic_recovery: bool,
    pub topology_recovery: bool,
    pub connection_timeout_ms: u64,
    /// Heartbeat interval in seconds, `0` disables heartbeats.
    pub heartbeat: u16,
    pub client_provided_name: Option<String>,
    pub host_names: Option<Vec<String>>,
    pub endpoints: Option<Vec<Endpoint>>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_owned(),
            password: DEFAULT_PASSWORD.to_owned(),
            vhost: DEFAULT_VHOST.to_owned(),
            automatic_recovery: true,
            topology_recovery: true,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            heartbeat: DEFAULT_HEARTBEAT_SECS,
            client_provided_name: None,
            host_names: None,
            endpoints: None,
        }
    }
}

impl ConnectionConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Binds the configuration from `RABBITMQ_*` environment variables.
    ///
    /// Unset variables keep their defaults. List variables are comma separated:
    /// `RABBITMQ_HOST_NAMES=h1,h2` and `RABBITMQ_ENDPOINTS=h1:5672,h2:5673`.
    pub fn from_env() -> Result<Self, AmqpError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Binds the configuration from an arbitrary key lookup using the same keys as
    /// [`ConnectionConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AmqpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ConnectionConfig::default();

        if let Some(host) = lookup("RABBITMQ_HOST") {
            cfg.host = host;
        }
        if let Some(port) = lookup("RABBITMQ_PORT") {
            cfg.port = parse_value("RABBITMQ_PORT", &port)?;
        }
        if let Some(user) = lookup("RABBITMQ_USER") {
            cfg.user = user;
        }
        if let Some(password) = lookup("RABBITMQ_PASSWORD") {
            cfg.password = password;
        }
        if let Some(vhost) = lookup("RABBITMQ_VHOST") {
            cfg.vhost = vhost;
        }
        if let Some(value) = lookup("RABBITMQ_AUTOMATIC_RECOVERY") {
            cfg.automatic_recovery = parse_value("RABBITMQ_AUTOMATIC_RECOVERY", &value)?;
        }
        if let Some(value) = lookup("RABBITMQ_TOPOLOGY_RECOVERY") {
            cfg.topology_recovery = parse_value("RABBITMQ_TOPOLOGY_RECOVERY", &value)?;
        }
        if let Some(value) = lookup("RABBITMQ_CONNECTION_TIMEOUT_MS") {
            cfg.connection_timeout_ms = parse_value("RABBITMQ_CONNECTION_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("RABBITMQ_HEARTBEAT") {
            cfg.heartbeat = parse_value("RABBITMQ_HEARTBEAT", &value)?;
        }

        cfg.client_provided_name = lookup("RABBITMQ_CLIENT_PROVIDED_NAME");

        cfg.host_names = lookup("RABBITMQ_HOST_NAMES").map(|value| {
            split_list(&value)
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>()
        });

        if let Some(value) = lookup("RABBITMQ_ENDPOINTS") {
            cfg.endpoints = Some(
                split_list(&value)
                    .map(Endpoint::from_str)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }

        Ok(cfg)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, AmqpError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|err| {
        error!(error = err.to_string(), key = key, "invalid configuration value");
        AmqpError::InvalidConfiguration(key.to_owned())
    })
}
