// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

pub mod channel;
pub mod config;
pub mod connection;
pub mod errors;
pub mod exchange;
pub mod handler;
pub mod registry;
