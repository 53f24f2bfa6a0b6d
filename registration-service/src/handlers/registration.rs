//! Registration flow handlers.
//!
//! - POST /registrationFlows starts a flow under a fresh anonymous session
//! - POST /registrationFlows/complete provisions the identity and swaps the
//!   session for an authenticated one

use axum::{
    extract::State,
    http::{
        header::{ETAG, USER_AGENT},
        HeaderMap, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use std::net::IpAddr;
use subtle::ConstantTimeEq;

use super::cookies;
use crate::dtos::{
    CompleteRegistrationFlowRequest, CompleteRegistrationFlowResponse, IdentityResponse,
    RegistrationFlowResponse,
};
use crate::models::{RegistrationDraft, Session};
use crate::services::RegistrationError;
use crate::utils::{CsrfToken, Password, ValidatedJson};
use crate::AppState;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Caller address and user agent, both required.
fn client_context(headers: &HeaderMap) -> Result<(IpAddr, String), AppError> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::MissingHeader("User-Agent".to_string()))?;

    let forwarded_for = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::MissingHeader("X-Forwarded-For".to_string()))?;

    let ip_address = forwarded_for.parse::<IpAddr>().map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!(
            "X-Forwarded-For does not hold a valid IP address"
        ))
    })?;

    Ok((ip_address, user_agent.to_string()))
}

/// Double-submit check: the header must echo the cookie, and the token must
/// carry a valid MAC for this session.
fn verify_csrf(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
    session_id: &str,
) -> Result<(), RegistrationError> {
    let header_token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| RegistrationError::unauthenticated("missing csrf header"))?;
    let cookie_token = cookies::get_csrf_token(jar)
        .ok_or_else(|| RegistrationError::unauthenticated("missing csrf cookie"))?;

    let echoed: bool = header_token.as_bytes().ct_eq(cookie_token.as_bytes()).into();
    if !echoed {
        return Err(RegistrationError::unauthenticated("csrf token mismatch"));
    }

    let token = CsrfToken::decode(header_token)?;
    if !state.csrf.verify_for_session(session_id, &token) {
        return Err(RegistrationError::unauthenticated("invalid csrf token"));
    }
    Ok(())
}

/// Attach the session and CSRF cookies for `session`, returning the
/// encoded CSRF token.
fn issue_cookies(
    state: &AppState,
    jar: CookieJar,
    session: &Session,
) -> Result<(CookieJar, String), RegistrationError> {
    let csrf_token = state.csrf.get_token(session)?.encode();
    let secure = state.config.cookie_secure;

    let jar = jar
        .add(cookies::session_cookie(&session.id, session.expires_at, secure))
        .add(cookies::csrf_cookie(&csrf_token, session.expires_at, secure));
    Ok((jar, csrf_token))
}

/// Start a registration flow.
///
/// POST /registrationFlows
#[tracing::instrument(skip(state, headers, jar))]
pub async fn create_registration_flow(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let (ip_address, user_agent) = client_context(&headers)?;

    let (flow, session) = state
        .registration
        .create_registration_flow(ip_address, &user_agent)
        .await?;

    let (jar, csrf_token) = issue_cookies(&state, jar, &session)?;
    let body = RegistrationFlowResponse::new(&flow, csrf_token).map_err(RegistrationError::from)?;
    let etag = body.etag.clone();

    Ok((StatusCode::CREATED, [(ETAG, etag)], jar, Json(body)))
}

/// Complete a registration flow.
///
/// POST /registrationFlows/complete
#[tracing::instrument(skip(state, headers, jar, req), fields(flow_name = %req.name))]
pub async fn complete_registration_flow(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<CompleteRegistrationFlowRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (ip_address, user_agent) = client_context(&headers)?;

    let session_id = cookies::get_session_id(&jar)
        .ok_or_else(|| RegistrationError::unauthenticated("missing session cookie"))?;
    verify_csrf(&state, &headers, &jar, &session_id)?;

    let draft = RegistrationDraft {
        session_id,
        password: Password::new(req.password),
        email: req.traits.email,
        timezone: req.traits.timezone,
    };

    let session = state
        .registration
        .complete_registration_flow(draft, &req.name, ip_address, &user_agent)
        .await?;

    let identity = session.identity.clone().ok_or_else(|| {
        RegistrationError::Internal(anyhow::anyhow!("upgraded session has no identity"))
    })?;
    let identity = IdentityResponse::try_from(identity.as_ref()).map_err(RegistrationError::from)?;
    let etag = identity.etag.clone();

    let (jar, _) = issue_cookies(&state, jar, &session)?;

    Ok((
        StatusCode::OK,
        [(ETAG, etag)],
        jar,
        Json(CompleteRegistrationFlowResponse { identity }),
    ))
}
