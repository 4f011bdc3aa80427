//! Session state: the credential and the identity it belongs to.
//!
//! [`SessionManager`] is the only writer of the credential/identity pair,
//! both in memory and in the [`SessionStore`]. The pair lives in a single
//! `Option<ActiveSession>`, so an identity without a credential (or the
//! reverse) cannot be represented.
//!
//! The API client reaches the session through [`CredentialSource`]: it reads
//! the bearer credential from here and reports a backend 401 back, which
//! clears the session and sends the user to the login page.

pub mod navigator;
pub mod store;

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::instrument;

use mercado_core::Email;

use crate::api::{ApiClient, AuthPayload, CredentialSource};
use crate::config::{ClientConfig, RestoreStrategy};
use crate::error::{
    ClientError, Result, ValidationError, add_breadcrumb, clear_sentry_user, set_sentry_user,
};
use crate::models::{Identity, LoginCredentials, RegistrationProfile};

pub use navigator::{CART_PATH, LOGIN_PATH, Navigator, NoopNavigator, REGISTER_PATH, is_auth_entry};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError, keys};

/// Shared handle on the signed-in session. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
    api: ApiClient,
}

struct SessionInner {
    state: RwLock<Option<ActiveSession>>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    identity_tx: watch::Sender<Option<Identity>>,
    restore_strategy: RestoreStrategy,
}

struct ActiveSession {
    credential: SecretString,
    identity: Identity,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("identity", &self.current_identity())
            .field("restore_strategy", &self.inner.restore_strategy)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a signed-out session over `store`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let (identity_tx, _) = watch::channel(None);
        let inner = Arc::new(SessionInner {
            state: RwLock::new(None),
            store,
            navigator,
            identity_tx,
            restore_strategy: config.restore_strategy,
        });
        let api = ApiClient::new(config, inner.clone())?;
        Ok(Self { inner, api })
    }

    /// Create a session with the store named by the configuration (a file
    /// store if `session_file` is set, else in-memory) and no navigator.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store, Arc::new(NoopNavigator))
    }

    /// API client that authenticates with this session.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Sign in with email and password.
    ///
    /// On failure the previous session (if any) is left as it was.
    ///
    /// # Errors
    ///
    /// - `Validation` for blank fields or a malformed email (no request sent)
    /// - `Auth(InvalidCredentials)` when the backend refuses the pair
    /// - `DataIntegrity` when the session cannot be persisted
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Identity> {
        let mut missing = Vec::new();
        if credentials.email.trim().is_empty() {
            missing.push("email");
        }
        if credentials.password.expose_secret().is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing }.into());
        }
        let email = Email::parse(&credentials.email).map_err(ValidationError::from)?;

        let payload = self.api.login(email.as_str(), &credentials.password).await?;
        let identity = self.inner.establish(payload)?;

        add_breadcrumb("auth", "Signed in", &[("user_id", identity.id.as_str())]);
        tracing::info!(user_id = %identity.id, "Signed in");
        Ok(identity)
    }

    /// Create an account and sign in as it.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::login`]; a refused profile (email taken) is
    /// `Auth(InvalidCredentials)`.
    #[instrument(skip(self, profile))]
    pub async fn register(&self, profile: &RegistrationProfile) -> Result<Identity> {
        let mut missing = Vec::new();
        if profile.name.trim().is_empty() {
            missing.push("name");
        }
        if profile.email.trim().is_empty() {
            missing.push("email");
        }
        if profile.password.expose_secret().is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing }.into());
        }
        let email = Email::parse(&profile.email).map_err(ValidationError::from)?;

        let payload = self
            .api
            .register(profile.name.trim(), email.as_str(), &profile.password)
            .await?;
        let identity = self.inner.establish(payload)?;

        add_breadcrumb("auth", "Registered", &[("user_id", identity.id.as_str())]);
        tracing::info!(user_id = %identity.id, "Registered and signed in");
        Ok(identity)
    }

    /// Sign out. Idempotent; never fails.
    pub fn logout(&self) {
        if self.inner.clear() {
            tracing::info!("Signed out");
        }
    }

    /// Rebuild the session from the store at process start.
    ///
    /// Never fails: anything unreadable means "no session". With
    /// [`RestoreStrategy::Verify`] the profile is re-fetched; a rejected
    /// credential clears the store while an unreachable backend leaves it for
    /// the next start.
    #[instrument(skip(self), fields(strategy = ?self.inner.restore_strategy))]
    pub async fn restore_session(&self) -> Option<Identity> {
        let (credential, snapshot) = self.inner.load_persisted()?;

        let identity = match self.inner.restore_strategy {
            RestoreStrategy::TrustSnapshot => snapshot,
            RestoreStrategy::Verify => match self.api.verify_with(&credential).await {
                Ok(identity) => {
                    self.inner.persist_snapshot(&identity);
                    identity
                }
                Err(ClientError::Auth(err)) => {
                    tracing::info!(error = %err, "Persisted credential rejected, clearing");
                    self.inner.clear_storage();
                    return None;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Could not verify persisted session");
                    return None;
                }
            },
        };

        self.inner.install(credential, identity.clone());
        tracing::info!(user_id = %identity.id, "Session restored");
        Some(identity)
    }

    /// Whether a credential and identity are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.read(Option::is_some)
    }

    /// The signed-in identity.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.inner
            .read(|state| state.as_ref().map(|session| session.identity.clone()))
    }

    /// Receiver notified whenever the identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.identity_tx.subscribe()
    }
}

impl SessionInner {
    fn read<T>(&self, f: impl FnOnce(&Option<ActiveSession>) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Persist and publish a fresh login.
    ///
    /// The token is written first; if the snapshot write then fails the
    /// previous token is put back so the store never holds one without the
    /// other.
    fn establish(&self, payload: AuthPayload) -> Result<Identity> {
        let AuthPayload {
            token,
            user: identity,
        } = payload;

        let snapshot = serde_json::to_string(&identity)
            .map_err(|e| ClientError::DataIntegrity(e.to_string()))?;
        let previous = self.store.load(keys::TOKEN).ok().flatten();

        self.store
            .save(keys::TOKEN, token.expose_secret())
            .map_err(|e| integrity_error(&e))?;

        if let Err(e) = self.store.save(keys::USER, &snapshot) {
            let rollback = match &previous {
                Some(previous) => self.store.save(keys::TOKEN, previous),
                None => self.store.remove(keys::TOKEN),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(error = %rollback_err, "Failed to roll back credential write");
            }
            return Err(integrity_error(&e));
        }

        self.install(token, identity.clone());
        Ok(identity)
    }

    /// Set the in-memory session and notify subscribers.
    fn install(&self, credential: SecretString, identity: Identity) {
        set_sentry_user(&identity.id, Some(identity.email.as_str()));
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = Some(ActiveSession {
                credential,
                identity: identity.clone(),
            });
        }
        self.identity_tx.send_replace(Some(identity));
    }

    /// Drop the session everywhere. Returns whether one was held.
    fn clear(&self) -> bool {
        let had_session = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.take().is_some()
        };
        self.clear_storage();
        self.identity_tx.send_if_modified(|current| current.take().is_some());
        clear_sentry_user();
        had_session
    }

    fn clear_storage(&self) {
        for key in [keys::TOKEN, keys::USER] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(error = %e, key, "Failed to clear persisted session entry");
            }
        }
    }

    /// Read the persisted pair. Anything incomplete or unreadable clears the
    /// store and yields `None`.
    fn load_persisted(&self) -> Option<(SecretString, Identity)> {
        let token = self.store.load(keys::TOKEN);
        let snapshot = self.store.load(keys::USER);

        match (token, snapshot) {
            (Ok(None), Ok(None)) => None,
            (Ok(Some(token)), Ok(Some(raw))) if !token.trim().is_empty() => {
                match serde_json::from_str::<Identity>(&raw) {
                    Ok(identity) => Some((SecretString::from(token), identity)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Persisted identity is corrupt, clearing session");
                        self.clear_storage();
                        None
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Session store unreadable, clearing session");
                self.clear_storage();
                None
            }
            _ => {
                tracing::warn!("Persisted session is incomplete, clearing");
                self.clear_storage();
                None
            }
        }
    }

    fn persist_snapshot(&self, identity: &Identity) {
        let written = serde_json::to_string(identity)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
            .and_then(|raw| self.store.save(keys::USER, &raw));
        if let Err(e) = written {
            tracing::warn!(error = %e, "Failed to refresh persisted identity");
        }
    }
}

impl CredentialSource for SessionInner {
    fn bearer_token(&self) -> Option<SecretString> {
        self.read(|state| state.as_ref().map(|session| session.credential.clone()))
    }

    fn credential_rejected(&self) {
        self.clear();
        let on_auth_page = self
            .navigator
            .current_path()
            .is_some_and(|path| is_auth_entry(&path));
        if !on_auth_page {
            self.navigator.redirect(LOGIN_PATH);
        }
    }
}

fn integrity_error(err: &StoreError) -> ClientError {
    let err = ClientError::DataIntegrity(err.to_string());
    err.report("session_persist");
    err
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::AuthError;

    #[derive(Default)]
    struct RecordingNavigator {
        current: Mutex<Option<String>>,
        redirects: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn current_path(&self) -> Option<String> {
            self.current.lock().unwrap().clone()
        }

        fn redirect(&self, path: &str) {
            self.redirects.lock().unwrap().push(path.to_string());
        }
    }

    /// Store whose snapshot writes always fail.
    #[derive(Default)]
    struct BrokenUserStore {
        inner: MemoryStore,
    }

    impl SessionStore for BrokenUserStore {
        fn load(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
            self.inner.load(key)
        }

        fn save(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
            if key == keys::USER {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save(key, value)
        }

        fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    fn user_json() -> serde_json::Value {
        json!({"_id": "u1", "name": "Ana", "email": "ana@example.com", "role": "user"})
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "token": "tok-1", "user": user_json()
            })))
            .mount(server)
            .await;
    }

    fn session(
        server: &MockServer,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        strategy: RestoreStrategy,
    ) -> SessionManager {
        let mut config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
        config.restore_strategy = strategy;
        SessionManager::new(&config, store, navigator).unwrap()
    }

    #[tokio::test]
    async fn test_login_persists_and_publishes() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let store = Arc::new(MemoryStore::new());
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);
        let mut rx = session.subscribe();

        let identity = session
            .login(&LoginCredentials::new(" ana@example.com ", "pw"))
            .await
            .unwrap();

        assert_eq!(identity.id.as_str(), "u1");
        assert!(session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap().as_deref(), Some("tok-1"));
        assert!(store.load(keys::USER).unwrap().unwrap().contains("\"u1\""));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));
    }

    #[tokio::test]
    async fn test_login_validation_happens_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let session = session(
            &server,
            Arc::new(MemoryStore::new()),
            Arc::new(NoopNavigator),
            RestoreStrategy::Verify,
        );

        let err = session
            .login(&LoginCredentials::new("  ", ""))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::MissingFields { ref fields }) if fields == &["email", "password"]
        ));

        let err = session
            .login(&LoginCredentials::new("not-an-email", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidEmail(_))));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_previous_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let session = session(
            &server,
            Arc::new(MemoryStore::new()),
            Arc::new(NoopNavigator),
            RestoreStrategy::Verify,
        );
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})))
            .mount(&server)
            .await;

        let err = session
            .login(&LoginCredentials::new("ana@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthError::InvalidCredentials(_))));
        assert_eq!(session.current_identity().unwrap().id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_register_signs_in_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .and(wiremock::matchers::body_json(json!({
                "name": "Ana", "email": "ana@example.com", "password": "pw"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true, "token": "tok-new", "user": user_json()
            })))
            .expect(1)
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);
        let mut rx = session.subscribe();

        let identity = session
            .register(&RegistrationProfile::new(" Ana ", "ana@example.com", "pw"))
            .await
            .unwrap();

        assert_eq!(identity.name, "Ana");
        assert!(session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap().as_deref(), Some("tok-new"));
        assert!(store.load(keys::USER).unwrap().unwrap().contains("\"u1\""));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));
    }

    #[tokio::test]
    async fn test_register_validation_happens_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let session = session(
            &server,
            Arc::new(MemoryStore::new()),
            Arc::new(NoopNavigator),
            RestoreStrategy::Verify,
        );

        let err = session
            .register(&RegistrationProfile::new(" ", "", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::MissingFields { ref fields }) if fields == &["name", "email"]
        ));

        let err = session
            .register(&RegistrationProfile::new("Ana", "ana-at-example", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidEmail(_))));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_refused_register_keeps_previous_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "User already exists"})))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        let err = session
            .register(&RegistrationProfile::new("Bo", "bo@example.com", "pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Auth(AuthError::InvalidCredentials(ref m)) if m == "User already exists"));
        assert_eq!(session.current_identity().unwrap().id.as_str(), "u1");
        assert_eq!(store.load(keys::TOKEN).unwrap().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_snapshot_write_failure_rolls_back_token() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let store = Arc::new(BrokenUserStore::default());
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);

        let err = session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::DataIntegrity(_)));
        assert!(!session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let store = Arc::new(MemoryStore::new());
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        session.logout();
        session.logout();

        assert!(!session.is_authenticated());
        assert!(session.current_identity().is_none());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
        assert_eq!(store.load(keys::USER).unwrap(), None);
        assert!(session.subscribe().borrow().is_none());
    }

    #[tokio::test]
    async fn test_rejected_credential_clears_and_redirects() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let navigator = Arc::new(RecordingNavigator::default());
        *navigator.current.lock().unwrap() = Some("/checkout".to_string());
        let store = Arc::new(MemoryStore::new());
        let session = session(&server, store.clone(), navigator.clone(), RestoreStrategy::Verify);
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        let err = session.api().fetch_cart().await.unwrap_err();

        assert!(matches!(err, ClientError::Auth(AuthError::SessionExpired)));
        assert!(!session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
        assert_eq!(*navigator.redirects.lock().unwrap(), vec![LOGIN_PATH.to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_credential_on_login_page_does_not_redirect() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let navigator = Arc::new(RecordingNavigator::default());
        *navigator.current.lock().unwrap() = Some("/login".to_string());
        let session = session(
            &server,
            Arc::new(MemoryStore::new()),
            navigator.clone(),
            RestoreStrategy::Verify,
        );
        session
            .login(&LoginCredentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        let _ = session.api().list_orders().await.unwrap_err();

        assert!(!session.is_authenticated());
        assert!(navigator.redirects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_corrupt_snapshot_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        store.save(keys::USER, "{\"id\": ").unwrap();
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);

        assert!(session.restore_session().await.is_none());
        assert!(!session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
        assert_eq!(store.load(keys::USER).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_verify_refreshes_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"_id": "u1", "name": "Ana Renamed", "email": "ana@example.com"}
            })))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        store
            .save(keys::USER, &json!({"id": "u1", "name": "Ana", "email": "ana@example.com"}).to_string())
            .unwrap();
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);

        let identity = session.restore_session().await.unwrap();

        assert_eq!(identity.name, "Ana Renamed");
        assert!(session.is_authenticated());
        assert!(store.load(keys::USER).unwrap().unwrap().contains("Ana Renamed"));
    }

    #[tokio::test]
    async fn test_restore_verify_rejected_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/verify"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        store.save(keys::USER, &user_json().to_string()).unwrap();
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);

        assert!(session.restore_session().await.is_none());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_verify_outage_keeps_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/verify"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        store.save(keys::USER, &json!({"id": "u1", "name": "Ana", "email": "ana@example.com"}).to_string()).unwrap();
        let session = session(&server, store.clone(), Arc::new(NoopNavigator), RestoreStrategy::Verify);

        assert!(session.restore_session().await.is_none());
        assert!(!session.is_authenticated());
        assert_eq!(store.load(keys::TOKEN).unwrap().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_restore_trust_snapshot_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        store.save(keys::USER, &json!({"id": "u1", "name": "Ana", "email": "ana@example.com"}).to_string()).unwrap();
        let session = session(
            &server,
            store,
            Arc::new(NoopNavigator),
            RestoreStrategy::TrustSnapshot,
        );

        let identity = session.restore_session().await.unwrap();
        assert_eq!(identity.name, "Ana");
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_token_without_snapshot_clears() {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        store.save(keys::TOKEN, "tok-1").unwrap();
        let session = session(
            &server,
            store.clone(),
            Arc::new(NoopNavigator),
            RestoreStrategy::TrustSnapshot,
        );

        assert!(session.restore_session().await.is_none());
        assert_eq!(store.load(keys::TOKEN).unwrap(), None);
    }
}
