//! # courier-core
//!
//! Core types, configuration, event registry, and error handling for courier.

pub mod config;
pub mod error;
pub mod events;
pub mod types;
