// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module resolves the configured connection strategy, opens the connection and
//! creates a channel on it for the session layer.

use crate::{
    config::ConnectionConfig,
    connection::{connect, resolve_connection},
    errors::AmqpError,
};
use lapin::{Channel, Connection};
use std::sync::Arc;
use tracing::{debug, error};

/// Creates a new AMQP channel for communication with RabbitMQ.
///
/// The connection is opened with the strategy selected by
/// [`resolve_connection`], then a channel is created on it. Both are wrapped in
/// `Arc` for sharing between tasks.
///
/// # Returns
/// * `Ok(None)` - no configuration was given, the broker integration is disabled
/// * `Ok(Some((connection, channel)))` - the connection and its channel
/// * `Err(AmqpError)` - the connect failure as classified by the connect step, or
///   `ChannelError` when the channel could not be created
///
/// # Example
/// ```ignore
/// let Some((conn, channel)) = new_amqp_channel(Some(&config)).await? else {
///     return Ok(());
/// };
/// ```
pub async fn new_amqp_channel(
    cfg: Option<&ConnectionConfig>,
) -> Result<Option<(Arc<Connection>, Arc<Channel>)>, AmqpError> {
    let Some(descriptor) = resolve_connection(cfg) else {
        debug!("no rabbitmq configuration, skipping connection");
        return Ok(None);
    };

    debug!(strategy = ?descriptor.strategy, "creating amqp connection...");
    let conn = connect(&descriptor).await?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok(Some((conn, Arc::new(c))))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError {})
        }
    }
}
