//! Authentication endpoints.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use super::types::{decode, extract_required};
use super::{Access, ApiClient};
use crate::error::{AuthError, ClientError, NetworkError, Result};
use crate::models::Identity;

/// A successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: SecretString,
    pub user: Identity,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// POST `/auth/login`.
    ///
    /// # Errors
    ///
    /// `Auth(InvalidCredentials)` when the backend refuses the pair.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthPayload> {
        let body = LoginBody {
            email,
            password: password.expose_secret(),
        };
        let value = self
            .send_json(Method::POST, "/auth/login", &body, Access::Public)
            .await
            .map_err(refused_as_credentials)?;
        auth_payload(value)
    }

    /// POST `/auth/register`.
    ///
    /// # Errors
    ///
    /// `Auth(InvalidCredentials)` when the backend refuses the profile (for
    /// example an email already in use).
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthPayload> {
        let body = RegisterBody {
            name,
            email,
            password: password.expose_secret(),
        };
        let value = self
            .send_json(Method::POST, "/auth/register", &body, Access::Public)
            .await
            .map_err(refused_as_credentials)?;
        auth_payload(value)
    }

    /// GET `/auth/verify` with an explicit credential.
    ///
    /// Used while restoring a persisted session, before the session owns the
    /// credential. A 401 here does not fire the rejection hook.
    ///
    /// # Errors
    ///
    /// `Auth(SessionExpired)` when the credential is no longer valid.
    #[instrument(skip_all)]
    pub(crate) async fn verify_with(&self, token: &SecretString) -> Result<Identity> {
        let value = self.get("/auth/verify", Access::Token(token)).await?;
        if value.get("valid").and_then(Value::as_bool) == Some(false) {
            return Err(AuthError::SessionExpired.into());
        }
        extract_required(value, "user")
    }
}

/// Domain refusals on the auth endpoints are credential failures.
fn refused_as_credentials(err: ClientError) -> ClientError {
    match err {
        ClientError::Conflict { message, .. } => AuthError::InvalidCredentials(message).into(),
        other => other,
    }
}

fn auth_payload(mut value: Value) -> Result<AuthPayload> {
    let token = value
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| NetworkError::Malformed("auth response has no token".to_string()))?;
    let user = value
        .get_mut("user")
        .map(Value::take)
        .filter(|user| !user.is_null())
        .ok_or_else(|| NetworkError::Malformed("auth response has no user".to_string()))?;

    Ok(AuthPayload {
        token,
        user: decode(user)?,
    })
}
