/// Configuration management for the API server
///
/// Loaded once at startup from environment variables (and `.env` when
/// present). Missing secrets fail fast with a descriptive error.
///
/// # Environment Variables
///
/// - `APP_ENV`: `production`, `development` (default) or `test`
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `PORT`: Port to bind to (default: 8000)
/// - `CLIENT_ORIGINS`: Comma separated list of allowed browser origins
/// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`
/// - `REDIS_URL`: enables rate limiting when set
/// - `ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET`, `ACTIVATION_SECRET` (required)
/// - `ACCESS_TOKEN_EXPIRE` (minutes, default 59), `REFRESH_TOKEN_EXPIRE` (days, default 7)
/// - `LOGGED_IN_TOKEN`: value of the client-readable `_can_logged_in` cookie
/// - `RATE_LIMIT_MAX` (default 100), `RATE_LIMIT_WINDOW_SECS` (default 900)
/// - `TRUSTED_PROXY_HOPS`: proxies whose `X-Forwarded-For` entries are trusted (default 0)
/// - SMTP, Cloudinary, Stripe and VdoCipher credentials, see their configs
///
/// # Example
///
/// ```no_run
/// use byway_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use byway_shared::auth::jwt::SessionKeys;
use byway_shared::integrations::{CloudinaryConfig, SmtpConfig, StripeConfig, VdoCipherConfig};
use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Origin always allowed outside production
pub const DEV_CLIENT_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => anyhow::bail!("APP_ENV has unknown value: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub tokens: TokenConfig,
    pub rate_limit: RateLimitConfig,

    /// Rate limiting is disabled when unset
    pub redis_url: Option<String>,

    pub smtp: SmtpConfig,
    pub cloudinary: CloudinaryConfig,
    pub stripe: StripeConfig,
    pub vdocipher: VdoCipherConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
}

impl ApiConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub activation_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub logged_in_token: String,
}

impl TokenConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days)
    }

    pub fn session_keys(&self) -> SessionKeys {
        SessionKeys {
            access_secret: self.access_secret.clone(),
            refresh_secret: self.refresh_secret.clone(),
            access_ttl: self.access_ttl(),
            refresh_ttl: self.refresh_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per window and per client IP
    pub max_requests: u32,

    pub window_secs: u64,

    /// Reverse proxies in front of the server; `X-Forwarded-For` is ignored
    /// when zero
    pub trusted_proxy_hops: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 15 * 60,
            trusted_proxy_hops: 0,
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} environment variable is required", key))
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        Err(_) => Ok(default),
    }
}

/// Parses `CLIENT_ORIGINS` and adds the dev origin outside production
pub fn cors_origins(raw: Option<&str>, environment: Environment) -> Vec<String> {
    let mut origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if environment != Environment::Production && !origins.iter().any(|o| o == DEV_CLIENT_ORIGIN) {
        origins.push(DEV_CLIENT_ORIGIN.to_string());
    }

    origins
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value can't
    /// be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let environment: Environment = parsed_or("APP_ENV", Environment::Development)?;
        let client_origins = env::var("CLIENT_ORIGINS").ok();

        let api = ApiConfig {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_or("PORT", 8000)?,
            environment,
            cors_origins: cors_origins(client_origins.as_deref(), environment),
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parsed_or("DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let tokens = TokenConfig {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            activation_secret: required("ACTIVATION_SECRET")?,
            access_ttl_minutes: parsed_or("ACCESS_TOKEN_EXPIRE", 59)?,
            refresh_ttl_days: parsed_or("REFRESH_TOKEN_EXPIRE", 7)?,
            logged_in_token: env::var("LOGGED_IN_TOKEN").unwrap_or_else(|_| "true".to_string()),
        };

        if tokens.access_ttl_minutes <= 0 || tokens.refresh_ttl_days <= 0 {
            anyhow::bail!("ACCESS_TOKEN_EXPIRE and REFRESH_TOKEN_EXPIRE must be positive");
        }

        let rate_limit = RateLimitConfig {
            max_requests: parsed_or("RATE_LIMIT_MAX", 100)?,
            window_secs: parsed_or("RATE_LIMIT_WINDOW_SECS", 900)?,
            trusted_proxy_hops: parsed_or("TRUSTED_PROXY_HOPS", 0)?,
        };

        if rate_limit.max_requests == 0 || rate_limit.window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_MAX and RATE_LIMIT_WINDOW_SECS must be positive");
        }

        Ok(Self {
            api,
            database,
            tokens,
            rate_limit,
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            smtp: SmtpConfig::from_env()?,
            cloudinary: CloudinaryConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            vdocipher: VdoCipherConfig::from_env()?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_cors_origins_adds_dev_origin_outside_production() {
        let origins = cors_origins(
            Some("https://byway.dev/, https://admin.byway.dev"),
            Environment::Development,
        );
        assert_eq!(
            origins,
            vec!["https://byway.dev", "https://admin.byway.dev", DEV_CLIENT_ORIGIN]
        );

        let origins = cors_origins(Some("https://byway.dev"), Environment::Production);
        assert_eq!(origins, vec!["https://byway.dev"]);

        assert!(cors_origins(None, Environment::Production).is_empty());
    }

    #[test]
    fn test_token_ttls() {
        let tokens = TokenConfig {
            access_secret: "a".into(),
            refresh_secret: "r".into(),
            activation_secret: "x".into(),
            access_ttl_minutes: 59,
            refresh_ttl_days: 7,
            logged_in_token: "true".into(),
        };

        assert_eq!(tokens.access_ttl(), Duration::minutes(59));
        assert_eq!(tokens.session_keys().refresh_ttl, Duration::days(7));
    }

    #[test]
    fn test_rate_limit_defaults() {
        let limit = RateLimitConfig::default();
        assert_eq!(limit.max_requests, 100);
        assert_eq!(limit.window_secs, 900);
        assert_eq!(limit.trusted_proxy_hops, 0);
    }
}
