// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the RabbitMQ Bootstrap Layer
//!
//! This module provides the error type shared by connection resolution and the
//! registration registry. Registry errors are raised synchronously during setup,
//! connection errors are raised by the connect step and keep the failure class
//! reported by the transport.

use thiserror::Error;

/// Represents errors that can occur while wiring an application to RabbitMQ.
///
/// Registration variants abort the registration call that raised them.
/// Connection variants are surfaced unchanged from the transport and are never
/// retried by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// An exchange with the same case-insensitive name was already declared
    #[error("exchange `{0}` was already declared")]
    DuplicateExchange(String),

    /// Exchange names must not be empty
    #[error("invalid exchange name `{0}`")]
    InvalidExchangeName(String),

    /// A handler was registered without any routing key
    #[error("handler `{0}` was registered without routing keys")]
    MissingRoutingKeys(String),

    /// The broker actively refused the TCP connection
    #[error("connection refused by `{0}`")]
    ConnectionRefused(String),

    /// The broker rejected the supplied credentials
    #[error("authentication failure on `{0}`")]
    AuthenticationFailure(String),

    /// The connection attempt did not complete within the configured timeout
    #[error("connection to `{0}` timed out")]
    ConnectionTimeout(String),

    /// The broker host name could not be resolved
    #[error("failure to resolve host `{0}`")]
    DnsFailure(String),

    /// Any other failure while establishing a connection
    #[error("failure to connect to `{0}`")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// A message handler failed to process a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// A configuration value could not be bound
    #[error("invalid configuration `{0}`")]
    InvalidConfiguration(String),
}

impl AmqpError {
    /// Returns true for the errors raised by the connect step.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            AmqpError::ConnectionRefused(_)
                | AmqpError::AuthenticationFailure(_)
                | AmqpError::ConnectionTimeout(_)
                | AmqpError::DnsFailure(_)
                | AmqpError::ConnectionError(_)
        )
    }
}
