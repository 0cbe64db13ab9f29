/// Database layer for ByWay
///
/// - `pool`: PostgreSQL connection pool with health checks and startup retry
/// - `migrations`: embedded migration runner
///
/// Models and their queries are in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
