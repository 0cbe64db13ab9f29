/// Per-client rate limiting
///
/// Token bucket held in Redis and updated atomically by a Lua script, so
/// several API instances share one budget per client IP. The default budget
/// is 100 requests per 15 minutes, refilled continuously.
///
/// # Storage
///
/// Keys: `ratelimit:ip:{addr}`, expiring one window after the last request.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: tokens left
/// - `X-RateLimit-Reset`: Unix timestamp when the bucket is full again
/// - `Retry-After`: seconds to wait (429 only)
///
/// Without Redis the middleware passes every request through untouched. A
/// Redis failure is logged and the request is let through.

use crate::{app::AppState, config::RateLimitConfig, error::ApiError};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use byway_shared::redis::RedisClient;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

const BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, ttl)
    return {1, math.floor(tokens), math.ceil((capacity - tokens) / refill_rate)}
else
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Bucket parameters derived from the configured budget
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub bucket_capacity: u32,

    /// Tokens per second
    pub refill_rate: f64,

    /// Key expiry
    pub window_secs: u64,
}

impl RateLimit {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let window_secs = config.window_secs.max(1);
        RateLimit {
            bucket_capacity: config.max_requests,
            refill_rate: config.max_requests as f64 / window_secs as f64,
            window_secs,
        }
    }
}

/// Outcome of one bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub ok: bool,
    pub remaining: u32,

    /// Seconds until a token (when refused) or a full bucket (when allowed)
    pub reset_after: u64,
}

impl RateLimitResult {
    fn from_script(values: &[i64]) -> Option<Self> {
        match values {
            [ok, remaining, reset_after] => Some(RateLimitResult {
                ok: *ok == 1,
                remaining: (*remaining).max(0) as u32,
                reset_after: (*reset_after).max(0) as u64,
            }),
            _ => None,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Client address used as the bucket key
///
/// The socket peer, unless `trusted_hops` proxies sit in front of the
/// server: each of them appends the address it saw to `X-Forwarded-For`, so
/// the client is the entry `trusted_hops` places from the right. Entries
/// further left are client supplied and never used.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer = peer.map(|p| p.ip().to_string());
    if trusted_hops == 0 {
        return peer.unwrap_or_else(|| "unknown".to_string());
    }

    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    hops.get(hops.len().saturating_sub(trusted_hops))
        .map(|addr| addr.to_string())
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(request).await);
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(
        request.headers(),
        peer,
        state.config.rate_limit.trusted_proxy_hops,
    );
    let limit = RateLimit::from_config(&state.config.rate_limit);

    let result = match check_rate_limit_redis(redis, &client, limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, client = %client, "Rate limit check failed, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !result.ok {
        tracing::debug!(client = %client, retry_after = result.reset_after, "Rate limit exceeded");
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.bucket_capacity));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from(unix_now() + result.reset_after),
    );

    Ok(response)
}

async fn check_rate_limit_redis(
    redis: &RedisClient,
    client: &str,
    limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let mut conn = redis.get_connection();
    let key = format!("ratelimit:ip:{}", client);

    let script = redis::Script::new(BUCKET_SCRIPT);
    let mut invocation = script.key(&key);
    invocation
        .arg(limit.bucket_capacity)
        .arg(limit.refill_rate)
        .arg(unix_now())
        .arg(limit.window_secs);

    let values: Vec<i64> =
        tokio::time::timeout(redis.command_timeout(), invocation.invoke_async(&mut conn))
            .await
            .map_err(|_| {
                redis::RedisError::from((redis::ErrorKind::IoError, "Rate limit check timed out"))
            })??;

    RateLimitResult::from_script(&values).ok_or_else(|| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "Unexpected rate limit script reply",
        ))
    })
}

fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.reset_after,
        message: format!(
            "Too many requests from this IP, please try again in {} seconds",
            result.reset_after
        ),
    }
}
