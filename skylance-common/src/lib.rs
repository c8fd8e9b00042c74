//! # SkyLance Common Library
//!
//! Shared code for the SkyLance prediction services:
//! - Error type used across crates
//! - Bootstrap configuration loading (TOML + environment)
//! - Store connection setup
//! - Target table schema verification

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
