//! Identity and the inputs that produce one.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use mercado_core::{Email, Role, UserId};

/// The signed-in user as the backend describes them.
///
/// Persisted as a JSON snapshot next to the credential so a restarted
/// process can restore the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: Email,
    /// Account role.
    #[serde(default)]
    pub role: Role,
}

/// Email and password for `login`.
///
/// The password is held as a secret and only exposed when the request body
/// is built.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    /// Email as typed.
    pub email: String,
    /// Password as typed.
    pub password: SecretString,
}

impl LoginCredentials {
    /// Build credentials from raw form input.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Profile submitted to `register`.
#[derive(Debug, Clone)]
pub struct RegistrationProfile {
    /// Display name.
    pub name: String,
    /// Email as typed.
    pub email: String,
    /// Password as typed.
    pub password: SecretString,
}

impl RegistrationProfile {
    /// Build a profile from raw form input.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_identity_snapshot_roundtrip() {
        let identity = Identity {
            id: UserId::new("u-1"),
            name: "Ana".to_string(),
            email: Email::parse("ana@example.com").unwrap(),
            role: Role::User,
        };
        let json = serde_json::to_string(&identity).unwrap();
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }

    #[test]
    fn test_identity_role_is_optional() {
        let identity: Identity =
            serde_json::from_str(r#"{"id":"u-2","name":"Bo","email":"bo@example.com"}"#).unwrap();
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = LoginCredentials::new("ana@example.com", "hunter22");
        assert!(!format!("{creds:?}").contains("hunter22"));
        assert_eq!(creds.password.expose_secret(), "hunter22");
    }
}
