use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::Duration;
use tracing::debug;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

/// Session cookie lifetime: one week.
const SESSION_TTL: Duration = Duration::days(7);

/// Identity payload carried by the session cookie. There is no server-side
/// session table; the cookie alone reconstructs the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub username: String,
}

/// Seals and opens session cookie values.
///
/// The cookie value is `base64url(json).hex(hmac-sha256(base64url(json)))`,
/// so a tampered payload fails signature verification before it is parsed.
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let session = &state.config.session;
        Self {
            secret: session.secret.clone(),
            secure: session.secure_cookies,
        }
    }
}

impl SessionKeys {
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size")
    }

    pub fn seal(&self, session: &Session) -> anyhow::Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session)?);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Fails soft: any malformed, truncated, or tampered value is `None`.
    pub fn open(&self, value: &str) -> Option<Session> {
        let (payload, signature) = value.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        // verify_slice is constant-time
        mac.verify_slice(&signature).ok()?;
        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    pub fn issue_cookie(&self, session: &Session) -> anyhow::Result<Cookie<'static>> {
        let value = self.seal(session)?;
        debug!(user_id = %session.id, "session cookie issued");
        Ok(Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(SESSION_TTL)
            .build())
    }
}

/// Expired cookie with the same name and path, used to revoke the session.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys {
            secret: "test-session-secret".into(),
            secure: false,
        }
    }

    fn session() -> Session {
        Session {
            id: "user_f3a1".into(),
            username: "alice".into(),
        }
    }

    #[test]
    fn seal_and_open_roundtrip() {
        let keys = keys();
        let sealed = keys.seal(&session()).expect("seal");
        let opened = keys.open(&sealed).expect("open sealed value");
        assert_eq!(opened, session());
    }

    #[test]
    fn open_rejects_tampered_payload() {
        let keys = keys();
        let sealed = keys.seal(&session()).expect("seal");
        let (payload, signature) = sealed.split_once('.').unwrap();
        let forged = Session {
            id: "user_f3a1".into(),
            username: "mallory".into(),
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        assert_ne!(payload, forged_payload);
        assert!(keys.open(&format!("{forged_payload}.{signature}")).is_none());
    }

    #[test]
    fn open_rejects_foreign_key() {
        let sealed = keys().seal(&session()).expect("seal");
        let other = SessionKeys {
            secret: "a-different-secret".into(),
            secure: false,
        };
        assert!(other.open(&sealed).is_none());
    }

    #[test]
    fn open_fails_soft_on_garbage() {
        let keys = keys();
        assert!(keys.open("").is_none());
        assert!(keys.open("no-dot-here").is_none());
        assert!(keys.open("payload.not-hex").is_none());
        assert!(keys.open("!!!.abcdef").is_none());
    }

    #[test]
    fn cookie_attributes() {
        let keys = keys();
        let cookie = keys.issue_cookie(&session()).expect("issue");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(604800)));
    }

    #[test]
    fn secure_flag_follows_config() {
        let keys = SessionKeys {
            secret: "s".into(),
            secure: true,
        };
        let cookie = keys.issue_cookie(&session()).expect("issue");
        assert_eq!(cookie.secure(), Some(true));
    }
}
