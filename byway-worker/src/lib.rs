//! # ByWay Worker Library
//!
//! Background jobs that run beside the API server.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `sweeper`: daily purge of read notifications past retention

pub mod config;
pub mod sweeper;
