use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{LoginRequest, RegisterRequest},
    extractors::resolve_session,
    password::{hash_password, verify_password},
    repo::{is_unique_violation, new_user_id, User},
    session::{self, Session, SessionKeys},
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(current_session))
}

fn validate_registration(username: &str, password: &str) -> Result<(), ApiError> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]{3,32}$").unwrap();
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::Validation(
            "Username must be 3-32 characters: letters, digits, '.', '_' or '-'".into(),
        ));
    }
    if password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<Session>), ApiError> {
    validate_registration(&payload.username, &payload.password)?;

    let password_hash = hash_password(&payload.password)?;

    // Single conditional insert; the UNIQUE constraint is the duplicate check.
    let user = match User::create(
        &state.db,
        &new_user_id(),
        &payload.username,
        &password_hash,
    )
    .await
    {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            warn!(username = %payload.username, "username already registered");
            return Err(ApiError::DuplicateUser);
        }
        Err(e) => return Err(e.into()),
    };

    let session = Session {
        id: user.id,
        username: user.username,
    };
    let keys = SessionKeys::from_ref(&state);
    let cookie = keys.issue_cookie(&session)?;

    info!(user_id = %session.id, username = %session.username, "user registered");
    Ok((StatusCode::CREATED, jar.add(cookie), Json(session)))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<Session>), ApiError> {
    // Unknown username and wrong password collapse into the same error so the
    // response never reveals which half was wrong.
    let user = match User::find_by_username(&state.db, &payload.username).await? {
        Some(user) => user,
        None => {
            warn!(username = %payload.username, "login with unknown username");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let session = Session {
        id: user.id,
        username: user.username,
    };
    let keys = SessionKeys::from_ref(&state);
    let cookie = keys.issue_cookie(&session)?;

    info!(user_id = %session.id, username = %session.username, "user logged in");
    Ok((jar.add(cookie), Json(session)))
}

/// Idempotent: revoking with no active session is still a 204.
#[instrument(skip(jar))]
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.remove(session::removal_cookie()), StatusCode::NO_CONTENT)
}

/// Fail-soft identity lookup: `null` rather than an error when anonymous.
#[instrument(skip(state, jar))]
pub async fn current_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Option<Session>>, ApiError> {
    Ok(Json(resolve_session(&state, &jar).await?))
}
