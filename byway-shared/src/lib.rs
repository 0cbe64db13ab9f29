//! # ByWay Shared Library
//!
//! Domain types, persistence and third-party integrations shared by the
//! ByWay API server and the background worker.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, tokens, role checks
//! - `db`: connection pool and migrations
//! - `models`: users, courses, orders, notifications, layouts, analytics
//! - `redis`: Redis connection management
//! - `integrations`: email, media hosting, payments, video OTP, live notifications

pub mod auth;
pub mod db;
pub mod integrations;
pub mod models;
pub mod redis;

/// Current version of the ByWay shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
