// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Registration Registry
//!
//! This module collects the exchanges and handler bindings declared during process
//! setup. Invalid or duplicate declarations are rejected by the call that makes them,
//! so misconfiguration stops startup before any message is delivered.
//!
//! The registry holds:
//! - the declared exchanges, unique by case-insensitive name, in declaration order
//! - the ordered edge list of handler bindings
//! - the routing key → handler types table built from those edges
//!
//! Mutation needs `&mut Registry`. Once setup is done the registry can be shared
//! behind an `Arc` and read concurrently by any number of dispatch workers.

use crate::{
    errors::AmqpError,
    exchange::{ExchangeDeclarer, ExchangeDefinition},
    handler::{ConsumerHandler, HandlerBinding, HandlerType, RoutingKeys},
};
use std::collections::HashMap;
use tracing::{debug, error};

#[derive(Debug, Default)]
pub struct Registry {
    exchanges: Vec<ExchangeDefinition>,
    exchanges_index: HashMap<String, usize>,
    bindings: Vec<HandlerBinding>,
    routes: HashMap<String, Vec<HandlerType>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Declares an exchange.
    ///
    /// The first declaration of a name wins. Any later declaration of the same name,
    /// compared case-insensitively, fails with `DuplicateExchange` whatever its
    /// options are.
    ///
    /// # Parameters
    /// * `def` - The exchange definition, owned by the registry from now on
    ///
    /// # Returns
    /// The registry for chaining, `InvalidExchangeName` for a blank name or
    /// `DuplicateExchange` when the name is already taken
    pub fn declare_exchange(
        &mut self,
        def: ExchangeDefinition,
    ) -> Result<&mut Self, AmqpError> {
        def.validate()?;

        let key = def.normalized_name();
        if let Some(index) = self.exchanges_index.get(&key) {
            error!(
                name = def.name(),
                declared = self.exchanges[*index].name(),
                "exchange was already declared"
            );
            return Err(AmqpError::DuplicateExchange(def.name));
        }

        debug!("exchange: {} was registered", def.name());
        self.exchanges_index.insert(key, self.exchanges.len());
        self.exchanges.push(def);

        Ok(self)
    }

    /// Binds the handler type `H` to one routing key or an ordered set of keys.
    ///
    /// Registering a set behaves exactly like registering each key in turn. Pairs are
    /// never deduplicated: binding the same handler to the same key twice yields two
    /// dispatch entries.
    ///
    /// # Parameters
    /// * `routing_keys` - A single key or an ordered set of keys
    ///
    /// # Returns
    /// The registry for chaining or `MissingRoutingKeys` when the set is empty
    pub fn register_handler<H>(
        &mut self,
        routing_keys: impl Into<RoutingKeys>,
    ) -> Result<&mut Self, AmqpError>
    where
        H: ConsumerHandler + 'static,
    {
        self.register_handler_type(HandlerType::of::<H>(), routing_keys)
    }

    /// Same as [`Registry::register_handler`] for an already built handler type.
    pub fn register_handler_type(
        &mut self,
        handler: HandlerType,
        routing_keys: impl Into<RoutingKeys>,
    ) -> Result<&mut Self, AmqpError> {
        let routing_keys = routing_keys.into();
        if routing_keys.is_empty() {
            error!(handler = handler.name(), "handler without routing keys");
            return Err(AmqpError::MissingRoutingKeys(handler.name().to_owned()));
        }

        for key in routing_keys.as_slice() {
            debug!("handler: {} bound to the key: {}", handler, key);
            self.routes.entry(key.clone()).or_default().push(handler);
        }

        self.bindings.push(HandlerBinding {
            handler,
            routing_keys: routing_keys.into_iter().collect(),
        });

        Ok(self)
    }

    /// Handler types bound to `routing_key`, in registration order.
    ///
    /// # Parameters
    /// * `routing_key` - Routing key of the delivered message
    ///
    /// # Returns
    /// The bound handler types, duplicates included; an empty slice for unbound keys
    pub fn resolve_handlers(&self, routing_key: &str) -> &[HandlerType] {
        self.routes
            .get(routing_key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Declared exchanges, in declaration order.
    pub fn list_exchanges(&self) -> &[ExchangeDefinition] {
        &self.exchanges
    }

    /// Looks an exchange up by case-insensitive name.
    ///
    /// # Returns
    /// The definition as first declared, or None
    pub fn exchange(&self, name: &str) -> Option<&ExchangeDefinition> {
        self.exchanges_index
            .get(&name.to_lowercase())
            .map(|index| &self.exchanges[*index])
    }

    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    pub fn routing_keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Declares every registered exchange on the broker, in declaration order.
    ///
    /// # Parameters
    /// * `declarer` - Where the exchanges are declared, usually a `lapin::Channel`
    ///
    /// # Returns
    /// Ok(()) on success or `DeclareExchangeError` naming the first exchange that
    /// failed; the exchanges after it are not declared
    pub async fn install_exchanges<D>(&self, declarer: &D) -> Result<(), AmqpError>
    where
        D: ExchangeDeclarer + ?Sized,
    {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name());

            match declarer.declare(exch).await {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name(),
                        "error to declare the exchange"
                    );
                    Err(AmqpError::DeclareExchangeError(exch.name().to_owned()))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exchange::MockExchangeDeclarer,
        handler::tests::{MockOrderCreated as H1, MockOrderShipped as H2},
    };
    use mockall::Sequence;
    use std::{io, sync::Arc, thread};

    fn h1() -> HandlerType {
        HandlerType::of::<H1>()
    }

    fn h2() -> HandlerType {
        HandlerType::of::<H2>()
    }

    #[test]
    fn duplicate_exchange_names_collide_case_insensitively() {
        let mut registry = Registry::new();
        registry
            .declare_exchange(ExchangeDefinition::new("Orders").durable())
            .unwrap();

        let err = registry
            .declare_exchange(ExchangeDefinition::new("orders").fanout())
            .unwrap_err();

        assert_eq!(err, AmqpError::DuplicateExchange("orders".to_owned()));
        assert_eq!(registry.list_exchanges().len(), 1);
        assert!(registry.list_exchanges()[0].is_durable());
    }

    #[test]
    fn duplicate_exchange_is_rejected_even_with_identical_options() {
        let mut registry = Registry::new();
        registry
            .declare_exchange(ExchangeDefinition::new("orders"))
            .unwrap();

        assert_eq!(
            registry
                .declare_exchange(ExchangeDefinition::new("orders"))
                .unwrap_err(),
            AmqpError::DuplicateExchange("orders".to_owned())
        );
    }

    #[test]
    fn blank_exchange_names_are_rejected() {
        let mut registry = Registry::new();

        assert_eq!(
            registry
                .declare_exchange(ExchangeDefinition::new(""))
                .unwrap_err(),
            AmqpError::InvalidExchangeName(String::new())
        );
        assert!(registry.list_exchanges().is_empty());
    }

    #[test]
    fn exchanges_are_listed_in_declaration_order() {
        let mut registry = Registry::new();
        registry
            .declare_exchange(ExchangeDefinition::new("payments"))
            .unwrap()
            .declare_exchange(ExchangeDefinition::new("Orders").topic())
            .unwrap();

        let names: Vec<&str> = registry.list_exchanges().iter().map(|e| e.name()).collect();

        assert_eq!(names, vec!["payments", "Orders"]);
        assert_eq!(registry.exchange("ORDERS").map(|e| e.name()), Some("Orders"));
        assert!(registry.exchange("shipping").is_none());
    }

    #[test]
    fn handlers_fan_out_in_registration_order() {
        let mut registry = Registry::new();
        registry
            .register_handler::<H1>(["a", "b"])
            .unwrap()
            .register_handler::<H2>("a")
            .unwrap();

        assert_eq!(registry.resolve_handlers("a"), [h1(), h2()]);
        assert_eq!(registry.resolve_handlers("b"), [h1()]);
    }

    #[test]
    fn repeated_bindings_are_preserved() {
        let mut registry = Registry::new();
        registry.register_handler::<H1>("a").unwrap();
        registry.register_handler::<H1>("a").unwrap();

        assert_eq!(registry.resolve_handlers("a"), [h1(), h1()]);
        assert_eq!(registry.bindings().len(), 2);
    }

    #[test]
    fn key_set_behaves_like_one_call_per_key() {
        let mut from_set = Registry::new();
        from_set
            .register_handler::<H1>(vec!["a", "b", "a"])
            .unwrap();

        let mut one_by_one = Registry::new();
        for key in ["a", "b", "a"] {
            one_by_one.register_handler::<H1>(key).unwrap();
        }

        for key in ["a", "b"] {
            assert_eq!(from_set.resolve_handlers(key), one_by_one.resolve_handlers(key));
        }
        assert_eq!(from_set.resolve_handlers("a"), [h1(), h1()]);
        assert_eq!(
            from_set.bindings()[0].routing_keys(),
            ["a".to_owned(), "b".to_owned(), "a".to_owned()]
        );
    }

    #[test]
    fn unknown_routing_key_resolves_to_nothing() {
        let registry = Registry::new();

        assert!(registry.resolve_handlers("unknown").is_empty());
    }

    #[test]
    fn empty_key_set_is_rejected() {
        let mut registry = Registry::new();

        let err = registry
            .register_handler::<H1>(Vec::<String>::new())
            .unwrap_err();

        assert_eq!(err, AmqpError::MissingRoutingKeys(h1().name().to_owned()));
        assert!(registry.bindings().is_empty());
        assert_eq!(registry.routing_keys().count(), 0);
    }

    #[test]
    fn finished_registry_is_readable_from_many_threads() {
        let mut registry = Registry::new();
        registry
            .declare_exchange(ExchangeDefinition::new("orders"))
            .unwrap()
            .register_handler::<H1>("order.created")
            .unwrap();
        let registry = Arc::new(registry);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (
                        registry.resolve_handlers("order.created").to_vec(),
                        registry.list_exchanges().len(),
                    )
                })
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), (vec![h1()], 1));
        }
    }

    fn orders_and_payments() -> Registry {
        let mut registry = Registry::new();
        registry
            .declare_exchange(ExchangeDefinition::new("orders").durable())
            .unwrap()
            .declare_exchange(ExchangeDefinition::new("payments").fanout())
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn installs_exchanges_in_declaration_order() {
        let registry = orders_and_payments();
        let mut declarer = MockExchangeDeclarer::new();
        let mut seq = Sequence::new();
        declarer
            .expect_declare()
            .withf(|def| def.name() == "orders" && def.is_durable())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        declarer
            .expect_declare()
            .withf(|def| def.name() == "payments")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert_eq!(registry.install_exchanges(&declarer).await, Ok(()));
    }

    #[tokio::test]
    async fn install_stops_at_the_first_declare_failure() {
        let registry = orders_and_payments();
        let mut declarer = MockExchangeDeclarer::new();
        declarer
            .expect_declare()
            .withf(|def| def.name() == "orders")
            .times(1)
            .returning(|_| {
                Err(lapin::Error::IOError(Arc::new(io::Error::from(
                    io::ErrorKind::BrokenPipe,
                ))))
            });
        declarer
            .expect_declare()
            .withf(|def| def.name() == "payments")
            .never();

        assert_eq!(
            registry.install_exchanges(&declarer).await,
            Err(AmqpError::DeclareExchangeError("orders".to_owned()))
        );
    }
}
