//! Core domain + application logic for the rental-group Telegram bot.
//!
//! This crate is framework-agnostic. Telegram and the OpenAI completion API
//! live behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod security;
pub mod service;
pub mod watch;

pub use errors::{Error, Result};
