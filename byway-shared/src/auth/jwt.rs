/// JWT token generation and validation module
///
/// Three token kinds are issued, each signed with its own secret:
///
/// - **Access Token**: short-lived session token (default 59 minutes)
/// - **Refresh Token**: long-lived session token (default 7 days)
/// - **Activation Token**: carries a pending registration and a 4-digit code (5 minutes)
///
/// All tokens use HS256 and the `byway` issuer. Validation checks the
/// signature, `exp` and `nbf` with no clock leeway, and the issuer.
///
/// # Example
///
/// ```
/// use byway_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
///
/// let claims = Claims::new(user_id, TokenType::Access, Duration::minutes(59));
/// let token = create_token(&claims, "access-secret")?;
///
/// let validated = validate_access_token(&token, "access-secret")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Issuer stamped on every token
pub const ISSUER: &str = "byway";

/// Lifetime of an activation token
pub const ACTIVATION_TTL_MINUTES: i64 = 5;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid token format
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer { expected: String, actual: String },
}

/// Session token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token, sent on every authenticated request
    Access,

    /// Refresh token, exchanged for a fresh session
    Refresh,
}

impl TokenType {
    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Session token claims
///
/// # Standard Claims
///
/// - `sub`: Subject (user ID)
/// - `iss`: Issuer (always "byway")
/// - `iat`: Issued at timestamp
/// - `exp`: Expiration timestamp
/// - `nbf`: Not before timestamp
///
/// # Custom Claims
///
/// - `token_type`: Access or refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always "byway"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type (custom claim)
    pub token_type: TokenType,
}

impl Claims {
    /// Creates session claims that expire after `expires_in`
    ///
    /// A negative duration produces claims that are already expired,
    /// which is handy in tests.
    pub fn new(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

}

/// Registration data held inside an activation token until the code is confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Activation token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationClaims {
    /// Issuer - Always "byway"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Registration waiting for confirmation
    pub user: PendingUser,

    /// 4-digit code mailed to the user
    pub activation_code: String,
}

impl ActivationClaims {
    /// Creates activation claims with the standard 5 minute lifetime
    pub fn new(user: PendingUser, activation_code: String) -> Self {
        Self::with_expiration(user, activation_code, Duration::minutes(ACTIVATION_TTL_MINUTES))
    }

    /// Creates activation claims with a custom lifetime
    pub fn with_expiration(user: PendingUser, activation_code: String, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            user,
            activation_code,
        }
    }
}

/// Generates a random activation code in `1000..=9999`
pub fn generate_activation_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Creates a JWT token from claims
///
/// Signs the token using HS256 (HMAC-SHA256) with the provided secret.
///
/// # Errors
///
/// Returns `JwtError::CreateError` if token creation fails
pub fn create_token<T: Serialize>(claims: &T, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims of any shape
///
/// Verifies:
/// - Signature is valid
/// - Token hasn't expired
/// - Issuer is "byway"
/// - Token is not used before nbf time
///
/// # Errors
///
/// - `JwtError::Expired` when `exp` has passed
/// - `JwtError::InvalidIssuer` when the issuer doesn't match
/// - `JwtError::InvalidFormat` when the token cannot be parsed
/// - `JwtError::ValidationError` for any other failure (bad signature, etc.)
pub fn validate_token<T>(token: &str, secret: &str) -> Result<T, JwtError>
where
    T: DeserializeOwned + Clone,
{
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<T>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
            actual: "unknown".to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_) => JwtError::InvalidFormat(e.to_string()),
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_session_token(
    token: &str,
    secret: &str,
    expected: TokenType,
) -> Result<Claims, JwtError> {
    let claims: Claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::ValidationError(format!(
            "Expected {} token, got {} token",
            expected.as_str(),
            claims.token_type.as_str()
        )));
    }

    Ok(claims)
}

/// Validates token and checks it's an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_session_token(token, secret, TokenType::Access)
}

/// Validates token and checks it's a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_session_token(token, secret, TokenType::Refresh)
}

/// Validates an activation token and returns the pending registration
pub fn validate_activation_token(token: &str, secret: &str) -> Result<ActivationClaims, JwtError> {
    validate_token(token, secret)
}

/// Secrets and lifetimes used to sign a session
#[derive(Debug, Clone)]
pub struct SessionKeys {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,

    /// When the access token stops being accepted
    pub access_expires_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Access token expiry in milliseconds since the Unix epoch
    pub fn expires_at_millis(&self) -> i64 {
        self.access_expires_at.timestamp_millis()
    }
}

/// Issues a new access/refresh pair for a user
///
/// Used on login, social sign-in and refresh token rotation.
pub fn issue_session(user_id: Uuid, keys: &SessionKeys) -> Result<SessionTokens, JwtError> {
    let access = Claims::new(user_id, TokenType::Access, keys.access_ttl);
    let refresh = Claims::new(user_id, TokenType::Refresh, keys.refresh_ttl);

    let access_expires_at = Utc
        .timestamp_opt(access.exp, 0)
        .single()
        .ok_or_else(|| JwtError::CreateError("Access expiry out of range".to_string()))?;

    Ok(SessionTokens {
        access_token: create_token(&access, &keys.access_secret)?,
        refresh_token: create_token(&refresh, &keys.refresh_secret)?,
        access_expires_at,
    })
}
