//! Anonymous per-device identity carried in a signed cookie.
//!
//! The cookie value is `<user_id>:<hex hmac-sha256(user_id)>`. Requests
//! without a valid cookie get a fresh UUIDv4 identity and a `Set-Cookie`
//! for it on the response.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_COOKIE_NAME: &str = "SHORTENER_UID";
pub const DEFAULT_COOKIE_SECRET: &str = "secret";
pub const COOKIE_MAX_AGE: time::Duration = time::Duration::hours(24);

/// The caller's identity, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signs and verifies identity cookies.
#[derive(Clone)]
pub struct Identity {
    cookie_name: String,
    mac: HmacSha256,
}

impl Identity {
    pub fn new(cookie_name: impl Into<String>, secret: &str) -> Result<Self, InvalidLength> {
        Ok(Self {
            cookie_name: cookie_name.into(),
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Hex encoded signature of `user_id`.
    pub fn sign(&self, user_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn cookie_value(&self, user_id: &str) -> String {
        format!("{user_id}:{}", self.sign(user_id))
    }

    /// Returns the user id carried by a cookie value when its signature
    /// checks out.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (user_id, signature) = value.rsplit_once(':')?;
        if user_id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(user_id.to_string())
    }
}

/// Middleware resolving the caller's [`UserId`].
pub async fn identify(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = state.identity();

    if let Some(user_id) = jar
        .get(identity.cookie_name())
        .and_then(|cookie| identity.verify(cookie.value()))
    {
        request.extensions_mut().insert(UserId(user_id));
        return next.run(request).await;
    }

    let user_id = Uuid::new_v4().to_string();
    debug!(user = %user_id, "issued new identity");

    let cookie = Cookie::build((
        identity.cookie_name().to_string(),
        identity.cookie_value(&user_id),
    ))
    .path("/")
    .http_only(true)
    .max_age(COOKIE_MAX_AGE);

    request.extensions_mut().insert(UserId(user_id));
    let response = next.run(request).await;
    (jar.add(cookie), response).into_response()
}
