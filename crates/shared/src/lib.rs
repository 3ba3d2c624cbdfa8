//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Typed integer IDs for type-safe entity references
//! - Minor-unit money conversion (no floats)
//! - Application-wide error categories
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
