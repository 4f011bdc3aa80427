//! HTTP client for the commerce JSON API.
//!
//! Every endpoint goes through [`ApiClient::request`], which attaches the
//! bearer credential, tags the request with a fresh `x-request-id`, and turns
//! the response into either a normalized JSON value or a [`ClientError`].
//!
//! Failure classification is a pure function of status, body and access
//! level ([`classify_failure`]). The only side effect on failure is the
//! [`CredentialSource::credential_rejected`] hook, fired when the backend
//! answers 401 to a request that carried the session credential.

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
mod types;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{Span, instrument};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{AuthError, ClientError, NetworkError, Result};

pub use auth::AuthPayload;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Where authenticated requests get their bearer credential.
///
/// Implemented by the session; the API client never writes session state
/// itself.
pub trait CredentialSource: Send + Sync {
    /// The credential to attach, if signed in.
    fn bearer_token(&self) -> Option<SecretString>;

    /// The backend answered 401 to a request that carried the credential.
    fn credential_rejected(&self);
}

/// Credential source for clients that only touch public endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialSource for Anonymous {
    fn bearer_token(&self) -> Option<SecretString> {
        None
    }

    fn credential_rejected(&self) {}
}

/// How a request authenticates.
#[derive(Clone, Copy)]
pub(crate) enum Access<'a> {
    /// No credential; a 401 is a credentials failure, never a session clear.
    Public,
    /// The session credential; refused locally when signed out.
    Session,
    /// An explicit credential not yet owned by the session (restore).
    Token(&'a SecretString),
}

impl Access<'_> {
    const fn label(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Session => "session",
            Self::Token(_) => "token",
        }
    }
}

/// Client for the commerce API. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base: String,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base: config.api_base().to_string(),
                credentials,
            }),
        })
    }

    pub(crate) async fn get(&self, path: &str, access: Access<'_>) -> Result<Value> {
        self.request(Method::GET, path, &[], None, access).await
    }

    pub(crate) async fn get_with_query(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        access: Access<'_>,
    ) -> Result<Value> {
        self.request(Method::GET, path, query, None, access).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        access: Access<'_>,
    ) -> Result<Value> {
        let body = serde_json::to_value(body)
            .map_err(|e| NetworkError::Malformed(format!("request body: {e}")))?;
        self.request(method, path, &[], Some(body), access).await
    }

    pub(crate) async fn delete(&self, path: &str, access: Access<'_>) -> Result<Value> {
        self.request(Method::DELETE, path, &[], None, access).await
    }

    /// Send one request and classify the response.
    #[instrument(
        skip(self, query, body, access),
        fields(access = access.label(), request_id = tracing::field::Empty, status = tracing::field::Empty)
    )]
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<Value>,
        access: Access<'_>,
    ) -> Result<Value> {
        let token = match access {
            Access::Public => None,
            Access::Token(token) => Some(token.clone()),
            Access::Session => Some(
                self.inner
                    .credentials
                    .bearer_token()
                    .ok_or(ClientError::Auth(AuthError::NotAuthenticated))?,
            ),
        };

        let url = self.url(path, query)?;
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());
        sentry::configure_scope(|scope| {
            scope.set_tag("request_id", &request_id);
        });

        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let outcome = self.exchange(builder, access).await;
        if let Err(err) = &outcome {
            err.report(path);
        }
        outcome
    }

    async fn exchange(&self, builder: reqwest::RequestBuilder, access: Access<'_>) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        Span::current().record("status", status.as_u16());

        // Read as text first so failures can be logged with the body.
        let text = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "API returned non-success status"
            );
            let err = classify_failure(status, &text, access);
            if status == StatusCode::UNAUTHORIZED && matches!(access, Access::Session) {
                tracing::info!("Credential rejected by backend, clearing session");
                self.inner.credentials.credential_rejected();
            }
            return Err(err);
        }

        let value = parse_body(&text)?;
        if let Some(message) = refusal_message(&value) {
            return Err(ClientError::Conflict {
                status: Some(status.as_u16()),
                message,
            });
        }
        Ok(value)
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{path}", self.inner.base))
            .map_err(|e| NetworkError::Unreachable(format!("invalid URL for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

/// Parse a 2xx body; an empty body is `null`. Ids are normalized.
fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut value: Value = serde_json::from_str(text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        NetworkError::Malformed(e.to_string())
    })?;
    normalize_ids(&mut value);
    Ok(value)
}

/// `{success: false, message}` on a 2xx response is still a refusal.
fn refusal_message(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if object.get("success").and_then(Value::as_bool) != Some(false) {
        return None;
    }
    Some(message_field(value).unwrap_or_default())
}

/// Rewrite document ids so models only ever see `id` and `product`.
///
/// `_id` becomes `id` unless an `id` is already present, and a cart or order
/// line's `productId` becomes `product` unless `product` is present.
pub(crate) fn normalize_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(raw) = map.remove("_id")
                && !map.contains_key("id")
            {
                map.insert("id".to_string(), raw);
            }
            if map.contains_key("quantity")
                && !map.contains_key("product")
                && let Some(product) = map.remove("productId")
            {
                map.insert("product".to_string(), product);
            }
            map.values_mut().for_each(normalize_ids);
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_ids),
        _ => {}
    }
}

fn message_field(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Map a non-2xx response onto the error taxonomy.
///
/// 401 on a credentialed request is always `SessionExpired`; on a public
/// request (login, register) it is a credentials failure.
pub(crate) fn classify_failure(status: StatusCode, body: &str, access: Access<'_>) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(message_field)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED => match access {
            Access::Session | Access::Token(_) => ClientError::Auth(AuthError::SessionExpired),
            Access::Public => ClientError::Auth(AuthError::InvalidCredentials(message)),
        },
        StatusCode::FORBIDDEN if matches!(access, Access::Public) => {
            ClientError::Auth(AuthError::InvalidCredentials(message))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ClientError::Network(NetworkError::Timeout)
        }
        s if s.is_server_error() => ClientError::Network(NetworkError::Server {
            status: s.as_u16(),
            message,
        }),
        s if s.is_client_error() => ClientError::Conflict {
            status: Some(s.as_u16()),
            message,
        },
        s => ClientError::Network(NetworkError::Malformed(format!(
            "unexpected status {s}"
        ))),
    }
}
