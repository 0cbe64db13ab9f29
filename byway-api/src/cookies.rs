/// Session and activation cookies
///
/// All cookies use `Path=/`. In production they are `Secure; SameSite=None`
/// so a separately hosted frontend can send them; elsewhere they are
/// `SameSite=Lax` without `Secure`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use byway_shared::auth::jwt::SessionTokens;
use time::Duration;

use crate::config::{Config, TokenConfig};

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const LOGGED_IN: &str = "_can_logged_in";
pub const ACTIVATION_TOKEN: &str = "activation_Token";

/// Lifetime of the activation cookie; shorter than the token it carries
pub const ACTIVATION_COOKIE_MINUTES: i64 = 4;

fn build(
    name: &'static str,
    value: String,
    max_age: Duration,
    http_only: bool,
    production: bool,
) -> Cookie<'static> {
    let builder = Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .max_age(max_age);

    if production {
        builder.secure(true).same_site(SameSite::None).build()
    } else {
        builder.same_site(SameSite::Lax).build()
    }
}

fn access_max_age(tokens: &TokenConfig) -> Duration {
    Duration::minutes(tokens.access_ttl_minutes)
}

fn refresh_max_age(tokens: &TokenConfig) -> Duration {
    Duration::days(tokens.refresh_ttl_days)
}

/// Adds the access, refresh and logged-in cookies
pub fn set_session(jar: CookieJar, session: &SessionTokens, config: &Config) -> CookieJar {
    let production = config.api.is_production();
    let tokens = &config.tokens;

    jar.add(build(
        ACCESS_TOKEN,
        session.access_token.clone(),
        access_max_age(tokens),
        true,
        production,
    ))
    .add(build(
        REFRESH_TOKEN,
        session.refresh_token.clone(),
        refresh_max_age(tokens),
        true,
        production,
    ))
    .add(build(
        LOGGED_IN,
        tokens.logged_in_token.clone(),
        refresh_max_age(tokens),
        false,
        production,
    ))
}

/// Overwrites the three session cookies with expired empty values
pub fn clear_session(jar: CookieJar, config: &Config) -> CookieJar {
    let production = config.api.is_production();

    jar.add(build(ACCESS_TOKEN, String::new(), Duration::ZERO, true, production))
        .add(build(REFRESH_TOKEN, String::new(), Duration::ZERO, true, production))
        .add(build(LOGGED_IN, String::new(), Duration::ZERO, false, production))
}

pub fn set_activation(jar: CookieJar, token: String, config: &Config) -> CookieJar {
    jar.add(build(
        ACTIVATION_TOKEN,
        token,
        Duration::minutes(ACTIVATION_COOKIE_MINUTES),
        true,
        config.api.is_production(),
    ))
}

pub fn clear_activation(jar: CookieJar, config: &Config) -> CookieJar {
    jar.add(build(
        ACTIVATION_TOKEN,
        String::new(),
        Duration::ZERO,
        true,
        config.api.is_production(),
    ))
}

/// Non-empty value of a cookie
pub fn read(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_cookie_attributes() {
        let cookie = build(ACCESS_TOKEN, "t".into(), Duration::minutes(59), true, true);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(59)));
    }

    #[test]
    fn test_development_cookie_attributes() {
        let cookie = build(LOGGED_IN, "true".into(), Duration::days(7), false, false);
        assert_ne!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(false));
    }

    #[test]
    fn test_read_ignores_empty_values() {
        let jar = CookieJar::new()
            .add(Cookie::new(ACCESS_TOKEN, ""))
            .add(Cookie::new(REFRESH_TOKEN, "abc"));

        assert_eq!(read(&jar, ACCESS_TOKEN), None);
        assert_eq!(read(&jar, REFRESH_TOKEN), Some("abc".to_string()));
        assert_eq!(read(&jar, ACTIVATION_TOKEN), None);
    }
}
