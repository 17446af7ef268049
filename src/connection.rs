// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connection Resolution
//!
//! This module turns a [`ConnectionConfig`] into exactly one connection strategy and
//! opens it. The configuration may carry an endpoint list, a host-name list and a
//! single host at the same time. That overlap is never an error, the first matching
//! rule wins:
//!
//! 1. a non-empty endpoint list, every other addressing field is ignored;
//! 2. a client-provided name, with the host-name list when it is non-empty or the
//!    single host otherwise;
//! 3. no client-provided name, with the host-name list when it is non-empty or the
//!    single host otherwise.
//!
//! Resolution is a pure function. Opening the connection walks the resolved
//! addresses in order and surfaces the failure of the last one. Retrying and
//! reconnecting belong to the caller and to the broker client.

use crate::{
    config::{ConnectionConfig, Endpoint},
    errors::AmqpError,
};
use async_trait::async_trait;
use lapin::{
    protocol::{AMQPErrorKind, AMQPSoftError},
    types::LongString,
    uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo},
    Connection, ConnectionProperties,
};
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

/// The host-addressing mechanism selected for a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Explicit `(host, port)` pairs, tried in order.
    Endpoints(Vec<Endpoint>),
    /// Ordered host names sharing the configured port, with a session name.
    NamedHostList {
        hosts: Vec<String>,
        client_name: String,
    },
    /// The single configured host, with a session name.
    NamedHost { host: String, client_name: String },
    /// Ordered host names sharing the configured port.
    HostList(Vec<String>),
    /// The single configured host.
    Host(String),
}

/// A resolved connection: the selected strategy plus the scalar settings that every
/// strategy forwards unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub strategy: ConnectionStrategy,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub automatic_recovery: bool,
    pub topology_recovery: bool,
    pub connection_timeout: Duration,
    pub heartbeat: u16,
}

/// Selects the connection strategy for `config`.
///
/// # Parameters
/// * `config` - The parsed connection settings, `None` when RabbitMQ is not configured
///
/// # Returns
/// The descriptor of the selected strategy, or `None` when no configuration is given,
/// which callers treat as the broker integration being disabled
pub fn resolve_connection(config: Option<&ConnectionConfig>) -> Option<ConnectionDescriptor> {
    let cfg = config?;

    let endpoints = cfg.endpoints.as_ref().filter(|endpoints| !endpoints.is_empty());
    let host_names = cfg.host_names.as_ref().filter(|hosts| !hosts.is_empty());
    let client_name = cfg
        .client_provided_name
        .as_ref()
        .filter(|name| !name.is_empty());

    let strategy = match (endpoints, client_name, host_names) {
        (Some(endpoints), _, _) => ConnectionStrategy::Endpoints(endpoints.clone()),
        (None, Some(name), Some(hosts)) => ConnectionStrategy::NamedHostList {
            hosts: hosts.clone(),
            client_name: name.clone(),
        },
        (None, Some(name), None) => ConnectionStrategy::NamedHost {
            host: cfg.host.clone(),
            client_name: name.clone(),
        },
        (None, None, Some(hosts)) => ConnectionStrategy::HostList(hosts.clone()),
        (None, None, None) => ConnectionStrategy::Host(cfg.host.clone()),
    };

    Some(ConnectionDescriptor {
        strategy,
        port: cfg.port,
        user: cfg.user.clone(),
        password: cfg.password.clone(),
        vhost: cfg.vhost.clone(),
        automatic_recovery: cfg.automatic_recovery,
        topology_recovery: cfg.topology_recovery,
        connection_timeout: cfg.connection_timeout(),
        heartbeat: cfg.heartbeat,
    })
}

impl ConnectionDescriptor {
    /// The name attached to the session, only set by the named strategies.
    pub fn client_name(&self) -> Option<&str> {
        match &self.strategy {
            ConnectionStrategy::NamedHostList { client_name, .. }
            | ConnectionStrategy::NamedHost { client_name, .. } => Some(client_name.as_str()),
            _ => None,
        }
    }

    /// The ordered addresses a connect attempt walks through.
    pub fn addresses(&self) -> Vec<Endpoint> {
        match &self.strategy {
            ConnectionStrategy::Endpoints(endpoints) => endpoints.clone(),
            ConnectionStrategy::NamedHostList { hosts, .. } | ConnectionStrategy::HostList(hosts) => {
                hosts
                    .iter()
                    .map(|host| Endpoint::new(host.clone(), self.port))
                    .collect()
            }
            ConnectionStrategy::NamedHost { host, .. } | ConnectionStrategy::Host(host) => {
                vec![Endpoint::new(host.clone(), self.port)]
            }
        }
    }

    /// Builds the AMQP URI for one address.
    ///
    /// Heartbeat and connection timeout travel in the query part, where the broker
    /// client reads them. No string is rendered, so credentials, virtual host and
    /// IPv6 hosts reach the client untouched.
    pub fn uri(&self, endpoint: &Endpoint) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
            vhost: self.vhost.clone(),
            query: AMQPQueryString {
                heartbeat: Some(self.heartbeat),
                connection_timeout: Some(self.connection_timeout.as_millis() as u64),
                ..AMQPQueryString::default()
            },
        }
    }
}

/// Opens a single broker address.
///
/// [`LapinConnector`] is the production implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send;

    async fn open(
        &self,
        uri: AMQPUri,
        client_name: Option<&str>,
    ) -> Result<Self::Connection, lapin::Error>;
}

/// [`Connector`] backed by `lapin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LapinConnector;

#[async_trait]
impl Connector for LapinConnector {
    type Connection = Connection;

    async fn open(
        &self,
        uri: AMQPUri,
        client_name: Option<&str>,
    ) -> Result<Connection, lapin::Error> {
        let mut options = ConnectionProperties::default();
        if let Some(name) = client_name {
            options = options.with_connection_name(LongString::from(name));
        }

        Connection::connect_uri(uri, options).await
    }
}

/// Opens the resolved connection with `lapin`.
///
/// # Parameters
/// * `descriptor` - The descriptor returned by [`resolve_connection`]
///
/// # Returns
/// The shared connection, or the classified failure of the last address attempted
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Arc<Connection>, AmqpError> {
    connect_with(descriptor, &LapinConnector).await.map(Arc::new)
}

/// Opens the resolved connection with the given connector.
///
/// Addresses are attempted in order and the first one that opens wins. When every
/// address fails the classified error of the last attempt is returned. Each attempt
/// is bounded by the configured connection timeout, a zero timeout leaves it
/// unbounded.
///
/// # Parameters
/// * `descriptor` - The descriptor returned by [`resolve_connection`]
/// * `connector` - Opens one address, [`LapinConnector`] outside of tests
///
/// # Returns
/// The first connection that opens, or the classified failure of the last address:
/// `ConnectionRefused`, `AuthenticationFailure`, `ConnectionTimeout`, `DnsFailure` or
/// `ConnectionError`
pub async fn connect_with<C>(
    descriptor: &ConnectionDescriptor,
    connector: &C,
) -> Result<C::Connection, AmqpError>
where
    C: Connector,
{
    if descriptor.automatic_recovery || descriptor.topology_recovery {
        debug!(
            automatic_recovery = descriptor.automatic_recovery,
            topology_recovery = descriptor.topology_recovery,
            "recovery is delegated to the broker client"
        );
    }

    let client_name = descriptor.client_name();
    let mut last_error = None;

    for endpoint in descriptor.addresses() {
        let address = endpoint.to_string();
        let uri = descriptor.uri(&endpoint);

        debug!(address = address.as_str(), "creating amqp connection...");

        let attempt = connector.open(uri, client_name);
        let result = if descriptor.connection_timeout.is_zero() {
            attempt.await.map_err(|err| classify(&err, &address))
        } else {
            match tokio::time::timeout(descriptor.connection_timeout, attempt).await {
                Ok(result) => result.map_err(|err| classify(&err, &address)),
                Err(_) => Err(AmqpError::ConnectionTimeout(address.clone())),
            }
        };

        match result {
            Ok(conn) => {
                debug!(address = address.as_str(), "amqp connected");
                return Ok(conn);
            }
            Err(err) => {
                warn!(error = err.to_string(), address = address.as_str(), "failure to connect");
                last_error = Some(err);
            }
        }
    }

    let err = last_error.unwrap_or(AmqpError::InternalError);
    error!(error = err.to_string(), "no broker address could be opened");
    Err(err)
}

/// Maps a transport error onto the connect failure classes.
///
/// I/O kinds and AMQP reply codes are matched first. Name resolution failures only
/// surface as I/O error text, so they are recognized from the message.
pub(crate) fn classify(err: &lapin::Error, address: &str) -> AmqpError {
    let address = address.to_owned();

    match err {
        lapin::Error::IOError(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionRefused => AmqpError::ConnectionRefused(address),
            io::ErrorKind::TimedOut => AmqpError::ConnectionTimeout(address),
            _ if is_dns_failure(&io_err.to_string()) => AmqpError::DnsFailure(address),
            _ => AmqpError::ConnectionError(address),
        },
        lapin::Error::ProtocolError(amqp_err)
            if matches!(
                amqp_err.kind(),
                AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED)
            ) =>
        {
            AmqpError::AuthenticationFailure(address)
        }
        other if is_dns_failure(&other.to_string()) => AmqpError::DnsFailure(address),
        _ => AmqpError::ConnectionError(address),
    }
}

fn is_dns_failure(text: &str) -> bool {
    let text = text.to_lowercase();

    text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("nodename nor servname")
        || text.contains("no such host")
        || text.contains("temporary failure in name resolution")
}
