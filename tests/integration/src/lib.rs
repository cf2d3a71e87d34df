//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process mock gateway (REST + WebSocket) and
//! frame builders for end-to-end tests of the bot.

pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
