//! Core domain + application logic for the profile scan bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Instagram
//! scraping backend live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod registry;
pub mod remote;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{Error, Result};
