// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions for RabbitMQ
//!
//! This module provides the exchange definition registered during setup. A definition
//! is a name plus the broker-level options bundle (kind, durability, auto-delete and
//! so on). The options are never interpreted here, they are copied verbatim into the
//! exchange declaration sent to the broker.

use crate::errors::AmqpError;
use async_trait::async_trait;
use lapin::{
    options::ExchangeDeclareOptions,
    types::{AMQPValue, FieldTable, LongString, ShortString},
    Channel,
};
#[cfg(test)]
use mockall::automock;
use std::collections::BTreeMap;

/// Constant for the header field used to specify the delayed exchange type
pub const AMQP_HEADERS_DELAYED_EXCHANGE_TYPE: &str = "x-delayed-type";

/// Represents the types of exchanges available in RabbitMQ.
///
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
/// - XMessageDelayed: Extension for delayed message delivery (plugin required)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExchangeKind {
    #[default]
    Direct,
    Fanout,
    Topic,
    Headers,
    XMessageDelayed,
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::XMessageDelayed => {
                lapin::ExchangeKind::Custom("x-delayed-message".to_owned())
            }
        }
    }
}

/// Definition of a RabbitMQ exchange with its configuration parameters.
///
/// Built with the builder methods below and handed to
/// [`Registry::declare_exchange`](crate::registry::Registry::declare_exchange), which
/// owns it for the rest of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) delete: bool,
    pub(crate) durable: bool,
    pub(crate) passive: bool,
    pub(crate) internal: bool,
    pub(crate) no_wait: bool,
    pub(crate) params: BTreeMap<ShortString, AMQPValue>,
}

impl ExchangeDefinition {
    /// Creates a new exchange definition with the given name.
    ///
    /// By default, the exchange is created as a Direct exchange with default parameters.
    pub fn new(name: impl Into<String>) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.into(),
            kind: ExchangeKind::Direct,
            delete: false,
            durable: false,
            passive: false,
            internal: false,
            no_wait: false,
            params: BTreeMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exchange_kind(&self) -> &ExchangeKind {
        &self.kind
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn is_auto_delete(&self) -> bool {
        self.delete
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn direct(mut self) -> Self {
        self.kind = ExchangeKind::Direct;
        self
    }

    pub fn fanout(mut self) -> Self {
        self.kind = ExchangeKind::Fanout;
        self
    }

    pub fn topic(mut self) -> Self {
        self.kind = ExchangeKind::Topic;
        self
    }

    /// Creates a delayed direct exchange.
    ///
    /// This requires the x-delayed-message plugin to be installed on the RabbitMQ server.
    pub fn direct_delayed(self) -> Self {
        self.delayed("direct")
    }

    /// Creates a delayed fanout exchange.
    ///
    /// This requires the x-delayed-message plugin to be installed on the RabbitMQ server.
    pub fn fanout_delayed(self) -> Self {
        self.delayed("fanout")
    }

    fn delayed(mut self, routing: &str) -> Self {
        self.kind = ExchangeKind::XMessageDelayed;
        self.params.insert(
            ShortString::from(AMQP_HEADERS_DELAYED_EXCHANGE_TYPE),
            AMQPValue::LongString(LongString::from(routing)),
        );
        self
    }

    /// Replaces the exchange arguments.
    pub fn params(mut self, params: BTreeMap<ShortString, AMQPValue>) -> Self {
        self.params = params;
        self
    }

    /// Adds a single argument to the exchange.
    pub fn param(mut self, key: ShortString, value: AMQPValue) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Sets the exchange to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the exchange passive, checking for existence without creating it.
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Makes the exchange internal, preventing direct publishing.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }

    /// Name used for uniqueness checks.
    pub(crate) fn normalized_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub(crate) fn validate(&self) -> Result<(), AmqpError> {
        if self.name.trim().is_empty() {
            return Err(AmqpError::InvalidExchangeName(self.name.clone()));
        }

        Ok(())
    }

    pub(crate) fn declare_options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: self.passive,
            durable: self.durable,
            auto_delete: self.delete,
            internal: self.internal,
            nowait: self.no_wait,
        }
    }

    pub(crate) fn arguments(&self) -> FieldTable {
        FieldTable::from(self.params.clone())
    }
}

/// Declares one exchange on the broker.
///
/// Implemented by `lapin::Channel`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExchangeDeclarer: Send + Sync {
    async fn declare(&self, def: &ExchangeDefinition) -> Result<(), lapin::Error>;
}

#[async_trait]
impl ExchangeDeclarer for Channel {
    async fn declare(&self, def: &ExchangeDefinition) -> Result<(), lapin::Error> {
        self.exchange_declare(
            def.name(),
            def.exchange_kind().into(),
            def.declare_options(),
            def.arguments(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_copies_options() {
        let def = ExchangeDefinition::new("Orders").topic().durable().delete();
        let options = def.declare_options();

        assert_eq!(def.name(), "Orders");
        assert_eq!(def.exchange_kind(), &ExchangeKind::Topic);
        assert!(options.durable);
        assert!(options.auto_delete);
        assert!(!options.passive);
        assert!(!options.internal);
        assert!(!options.nowait);
    }

    #[test]
    fn delayed_exchange_sets_plugin_kind_and_argument() {
        let def = ExchangeDefinition::new("delayed").fanout_delayed();

        assert_eq!(def.exchange_kind(), &ExchangeKind::XMessageDelayed);
        assert_eq!(
            def.params
                .get(&ShortString::from(AMQP_HEADERS_DELAYED_EXCHANGE_TYPE)),
            Some(&AMQPValue::LongString(LongString::from("fanout")))
        );
        assert!(matches!(
            lapin::ExchangeKind::from(def.exchange_kind()),
            lapin::ExchangeKind::Custom(kind) if kind == "x-delayed-message"
        ));
    }

    #[test]
    fn normalizes_and_validates_names() {
        assert_eq!(ExchangeDefinition::new("OrDers").normalized_name(), "orders");
        assert_eq!(
            ExchangeDefinition::new("  ").validate(),
            Err(AmqpError::InvalidExchangeName("  ".to_owned()))
        );
        assert!(ExchangeDefinition::new("orders").validate().is_ok());
    }
}
