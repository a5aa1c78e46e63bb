//! Core domain + application logic for the subscription-gated assistant bot.
//!
//! This crate is intentionally framework-agnostic. Telegram / Gemini /
//! Replicate / extraction live behind ports (traits) implemented in adapter
//! crates.

pub mod chunker;
pub mod config;
pub mod domain;
pub mod errors;
pub mod i18n;
pub mod keypool;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod orchestrator;
pub mod ports;
pub mod receipts;
pub mod store;
pub mod triggers;

pub use errors::{Error, Result};
