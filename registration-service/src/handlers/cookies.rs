use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

pub const SESSION_COOKIE_NAME: &str = "session_id";
pub const CSRF_COOKIE_NAME: &str = "csrf_token";

fn expiry(expires_at: Option<DateTime<Utc>>) -> Option<OffsetDateTime> {
    expires_at.and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok())
}

/// Session cookie: never readable by scripts, same-site only.
pub(super) fn session_cookie(
    session_id: &str,
    expires_at: Option<DateTime<Utc>>,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .build();
    if let Some(at) = expiry(expires_at) {
        cookie.set_expires(at);
    }
    cookie
}

/// CSRF cookie: readable by scripts so they can echo it in a header.
pub(super) fn csrf_cookie(
    token: &str,
    expires_at: Option<DateTime<Utc>>,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((CSRF_COOKIE_NAME, token.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .build();
    if let Some(at) = expiry(expires_at) {
        cookie.set_expires(at);
    }
    cookie
}

/// Session id from the request cookies, if present and non-empty.
pub(super) fn get_session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
}

pub(super) fn get_csrf_token(jar: &CookieJar) -> Option<String> {
    jar.get(CSRF_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
}
