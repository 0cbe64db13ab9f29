/// Redis connectivity
///
/// Only the connection wrapper lives here; the rate-limit script that uses
/// it is in the API crate.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
