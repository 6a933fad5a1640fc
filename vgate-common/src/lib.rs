//! # VGate Common Library
//!
//! Shared code for the vehicle gate services:
//! - Database initialization and settings storage
//! - Gate event types and the event bus
//! - Configuration loading (root folder, TOML bootstrap file)
//! - SSE and timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, GateEvent};
