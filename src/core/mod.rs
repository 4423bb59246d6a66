//! Core application modules
//!
//! This module contains configuration, constants, logging, the shared HTTP
//! client, and the vendor clients behind the `LlmApi` trait.

pub mod client;
pub mod config;
pub mod constants;
pub mod logging;
pub mod model_manager;
pub mod provider;
pub mod providers;
