//! Navigation hook used when the session is cleared by the backend.

/// Sign-in page.
pub const LOGIN_PATH: &str = "/login";

/// Sign-up page.
pub const REGISTER_PATH: &str = "/register";

/// Cart page, where checkout sends a user with an empty cart.
pub const CART_PATH: &str = "/cart";

/// Whether `path` is one of the pages a signed-out user is sent to.
///
/// Query strings and fragments are ignored.
#[must_use]
pub fn is_auth_entry(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    path == LOGIN_PATH || path == REGISTER_PATH
}

/// Location adapter of the host application.
pub trait Navigator: Send + Sync {
    /// Path currently shown, if the host has one.
    fn current_path(&self) -> Option<String>;

    /// Navigate to `path`.
    fn redirect(&self, path: &str);
}

/// Navigator for hosts without routing. Never redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_path(&self) -> Option<String> {
        None
    }

    fn redirect(&self, path: &str) {
        tracing::debug!(path, "Redirect requested without a navigator");
    }
}
