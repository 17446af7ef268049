// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handlers and Routing-Key Bindings
//!
//! This module defines the handler contract implemented by application code and the
//! values the registry uses to bind handler types to routing keys. The registry only
//! stores handler *types*; instantiating and invoking them is the job of the dispatch
//! loop that reads the registry.

use crate::errors::AmqpError;
use async_trait::async_trait;
use std::{
    any::{type_name, TypeId},
    fmt,
    hash::{Hash, Hasher},
};

/// A message delivered to a [`ConsumerHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerMessage {
    pub exchange: String,
    pub routing_key: String,
    pub data: Vec<u8>,
}

impl ConsumerMessage {
    pub fn new(exchange: &str, routing_key: &str, data: &[u8]) -> Self {
        ConsumerMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            data: data.to_vec(),
        }
    }
}

/// Contract for the concrete implementations that process messages.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError>;
}

/// Identifies a concrete [`ConsumerHandler`] implementation.
///
/// Two identifiers are equal when they name the same Rust type.
#[derive(Clone, Copy)]
pub struct HandlerType {
    id: TypeId,
    name: &'static str,
}

impl HandlerType {
    pub fn of<H>() -> Self
    where
        H: ConsumerHandler + 'static,
    {
        HandlerType {
            id: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    pub fn is<H>(&self) -> bool
    where
        H: ConsumerHandler + 'static,
    {
        self.id == TypeId::of::<H>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for HandlerType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HandlerType {}

impl Hash for HandlerType {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.id.hash(state);
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerType").field(&self.name).finish()
    }
}

impl fmt::Display for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One routing key or an ordered set of routing keys.
///
/// Order and duplicates are kept exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingKeys(Vec<String>);

impl RoutingKeys {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for RoutingKeys {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<&str> for RoutingKeys {
    fn from(key: &str) -> Self {
        RoutingKeys(vec![key.to_owned()])
    }
}

impl From<String> for RoutingKeys {
    fn from(key: String) -> Self {
        RoutingKeys(vec![key])
    }
}

impl From<&String> for RoutingKeys {
    fn from(key: &String) -> Self {
        RoutingKeys(vec![key.clone()])
    }
}

impl From<Vec<String>> for RoutingKeys {
    fn from(keys: Vec<String>) -> Self {
        RoutingKeys(keys)
    }
}

impl From<Vec<&str>> for RoutingKeys {
    fn from(keys: Vec<&str>) -> Self {
        RoutingKeys(keys.into_iter().map(ToOwned::to_owned).collect())
    }
}

impl From<&[&str]> for RoutingKeys {
    fn from(keys: &[&str]) -> Self {
        RoutingKeys(keys.iter().map(|key| (*key).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RoutingKeys {
    fn from(keys: [&str; N]) -> Self {
        RoutingKeys(keys.iter().map(|key| (*key).to_owned()).collect())
    }
}

/// An edge between a handler type and the routing keys it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBinding {
    pub(crate) handler: HandlerType,
    pub(crate) routing_keys: Vec<String>,
}

impl HandlerBinding {
    pub fn handler(&self) -> HandlerType {
        self.handler
    }

    pub fn routing_keys(&self) -> &[String] {
        &self.routing_keys
    }
}
