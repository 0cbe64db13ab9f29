//! # ByWay API Server Library
//!
//! The HTTP layer of the ByWay e-learning backend.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: environment configuration
//! - `cookies`: session and activation cookies
//! - `error`: error envelope and status mapping
//! - `extract`: JSON and multipart extractors
//! - `middleware`: rate limit, demo protection, consent, authentication
//! - `response`: success envelope
//! - `routes`: handlers per resource

pub mod app;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
