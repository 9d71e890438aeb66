//! Configuration module for castcode
//!
//! Handles loading configuration from TOML files and environment variable overrides,
//! and defines the encoding profiles shared by the coordinator and the GPU workers.

pub mod config;

pub use config::*;
