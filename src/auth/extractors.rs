use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use tracing::debug;

use crate::auth::repo::User;
use crate::auth::session::{Session, SessionKeys, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Resolve the caller's identity from the session cookie.
///
/// Fails soft to `None` for a missing, malformed, or tampered cookie. A valid
/// cookie whose user id no longer exists in the store also resolves to `None`
/// so stale sessions cannot outlive their user.
pub async fn resolve_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<Session>, ApiError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let keys = SessionKeys::from_ref(state);
    let Some(session) = keys.open(cookie.value()) else {
        debug!("session cookie rejected as malformed or tampered");
        return Ok(None);
    };
    if !User::exists(&state.db, &session.id).await? {
        debug!(user_id = %session.id, "session references a missing user");
        return Ok(None);
    }
    Ok(Some(session))
}

/// Extracts the authenticated caller, rejecting the request otherwise.
pub struct CurrentUser(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        match resolve_session(state, &jar).await? {
            Some(session) => Ok(CurrentUser(session)),
            None => Err(ApiError::Unauthenticated),
        }
    }
}
