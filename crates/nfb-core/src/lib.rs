//! Core domain + application logic for the non-follower checker bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and Instagram live
//! behind ports (traits) implemented in adapter crates.

pub mod activity;
pub mod cipher;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod resolver;
pub mod tasks;

pub use errors::{Error, Result};
