//! # Songmap Common Library
//!
//! Shared code for the songmap services:
//! - Error type and result alias
//! - Configuration file model and root folder resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
