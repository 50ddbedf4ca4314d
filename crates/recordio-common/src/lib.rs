//! RecordIO Common - Shared types and utilities
//!
//! This crate provides the record data model, error definitions, request
//! context, and checksum utilities used across all RecordIO components.

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use config::Config;
pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result};
pub use types::*;
