use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tower_sessions::cookie::Key;
use tower_sessions::Session;

use crate::models::SessionUser;

pub const USER_KEY: &str = "user";

/// Cookie signing key derived from the configured secret.
pub fn session_key(secret: Option<&SecretString>) -> Key {
    match secret {
        Some(secret) => {
            let digest = Sha512::digest(secret.expose_secret().as_bytes());
            Key::from(digest.as_slice())
        }
        None => {
            tracing::warn!("SESSION_SECRET is not set, using a random signing key");
            Key::generate()
        }
    }
}

/// The logged in user, if any.
pub struct CurrentUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let user = session
            .get::<SessionUser>(USER_KEY)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Could not read user from session: {e}");
                None
            });
        Ok(CurrentUser(user))
    }
}
