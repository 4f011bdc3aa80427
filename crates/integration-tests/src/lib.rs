//! Integration test harness for the Mercado storefront client.
//!
//! [`FakeBackend`] is a stateful stand-in for the commerce API, served by a
//! `wiremock` server. It keeps products, registered accounts, one shared
//! cart and orders in memory and answers the same shapes the real backend
//! does (`_id` ids, `{cart: ...}` and `{data: [...]}` envelopes, `{message}`
//! errors), so the tests exercise the client end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercado-integration-tests
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use mercado_storefront::ClientConfig;
use mercado_storefront::session::{MemoryStore, Navigator, SessionManager, SessionStore};

/// Email of the only account.
pub const EMAIL: &str = "ana@example.com";

/// Password of the only account.
pub const PASSWORD: &str = "correct horse";

const TOKEN: &str = "tok-ana";

/// A catalog product on the fake backend.
#[derive(Debug, Clone)]
pub struct SeedProduct {
    pub id: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub stock: u32,
}

/// Products served by every fake backend.
pub static CATALOG: [SeedProduct; 3] = [
    SeedProduct {
        id: "p-lamp",
        name: "Desk Lamp",
        price: 50.0,
        stock: 10,
    },
    SeedProduct {
        id: "p-mug",
        name: "Mug",
        price: 30.0,
        stock: 5,
    },
    SeedProduct {
        id: "p-rare",
        name: "Rare Print",
        price: 120.0,
        stock: 1,
    },
];

/// An account created through `POST /auth/register`.
#[derive(Debug, Clone)]
struct Account {
    user: Value,
    password: String,
    token: String,
}

#[derive(Debug, Default)]
struct BackendState {
    token_revoked: bool,
    accounts: Vec<Account>,
    cart: Vec<(String, u32)>,
    orders: Vec<Value>,
    next_order: u32,
    requests: Vec<String>,
}

/// In-memory commerce API.
pub struct FakeBackend {
    server: MockServer,
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    /// Start the server with an empty cart and no orders.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(BackendState::default()));
        Mock::given(any())
            .respond_with(Router {
                state: Arc::clone(&state),
            })
            .mount(&server)
            .await;
        Self { server, state }
    }

    /// Client configuration pointing at this server.
    ///
    /// # Panics
    ///
    /// Never for a running mock server.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&format!("{}/api", self.server.uri())).expect("mock server URI is valid")
    }

    /// Signed-out session over `store` and `navigator`.
    ///
    /// # Panics
    ///
    /// If the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn session_with(
        &self,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> SessionManager {
        SessionManager::new(&self.config(), store, navigator).expect("session builds")
    }

    /// Signed-out session over an in-memory store and a recording navigator.
    #[must_use]
    pub fn session(&self) -> (SessionManager, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let session = self.session_with(Arc::new(MemoryStore::new()), navigator.clone());
        (session, navigator)
    }

    /// Emails of accounts created through registration.
    #[must_use]
    pub fn registered_emails(&self) -> Vec<String> {
        self.lock()
            .accounts
            .iter()
            .filter_map(|a| a.user["email"].as_str().map(str::to_string))
            .collect()
    }

    /// Make every authenticated endpoint answer 401 from now on.
    pub fn revoke_token(&self) {
        self.lock().token_revoked = true;
    }

    /// Server-side cart as `(product id, quantity)` pairs.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<(String, u32)> {
        self.lock().cart.clone()
    }

    /// Server-side orders.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.lock().orders.clone()
    }

    /// Force an order's status, as fulfilment would.
    pub fn set_order_status(&self, order_id: &str, status: &str) {
        let mut state = self.lock();
        if let Some(order) = state.orders.iter_mut().find(|o| o["_id"] == order_id) {
            order["status"] = json!(status);
        }
    }

    /// `"METHOD /path"` of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Navigator that remembers redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    current: Mutex<Option<String>>,
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Pretend the host is showing `path`.
    pub fn set_current(&self, path: &str) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.to_string());
    }

    /// Redirects requested so far.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, path: &str) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

// =============================================================================
// Routing
// =============================================================================

struct Router {
    state: Arc<Mutex<BackendState>>,
}

impl Respond for Router {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let path = request.url.path().trim_start_matches("/api").to_string();
        let method = request.method.as_str().to_string();
        state.requests.push(format!("{method} {path}"));

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (method.as_str(), segments.as_slice()) {
            ("POST", ["auth", "login"]) => login(&state, &body),
            ("POST", ["auth", "register"]) => register(&mut state, &body),
            ("GET", ["products"]) => ok(json!({"products": CATALOG.iter().map(product_json).collect::<Vec<_>>()})),
            ("GET", ["products", id]) => find_product(id).map_or_else(
                || error(404, "Product not found"),
                |p| ok(json!({"product": product_json(p)})),
            ),
            _ if signed_in_user(request, &state).is_none() => error(401, "Invalid or expired token"),
            ("GET", ["auth", "verify"]) => {
                ok(json!({"valid": true, "user": signed_in_user(request, &state)}))
            }
            ("GET", ["cart"]) => ok(json!({"cart": cart_json(&state.cart)})),
            ("POST", ["cart", "add"]) => add_to_cart(&mut state, &body),
            ("PUT", ["cart", "update"]) => update_cart(&mut state, &body),
            ("DELETE", ["cart", "remove", id]) => {
                state.cart.retain(|(line, _)| line != id);
                ok(json!({"cart": cart_json(&state.cart)}))
            }
            ("DELETE", ["cart", "clear"]) => {
                state.cart.clear();
                ok(json!({"success": true, "message": "Cart cleared"}))
            }
            ("POST", ["orders"]) => create_order(&mut state, body),
            ("GET", ["orders"]) => ok(json!({"success": true, "data": state.orders})),
            ("GET", ["orders", id]) => state
                .orders
                .iter()
                .find(|o| o["_id"] == *id)
                .map_or_else(|| error(404, "Order not found"), |o| ok(json!({"order": o}))),
            ("PUT", ["orders", id, "cancel"]) => cancel_order(&mut state, id),
            _ => error(404, "Not found"),
        }
    }
}

/// The user behind the request's bearer token, if it is still valid.
fn signed_in_user(request: &Request, state: &BackendState) -> Option<Value> {
    if state.token_revoked {
        return None;
    }
    let token = request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")?;
    if token == TOKEN {
        return Some(user_json());
    }
    state
        .accounts
        .iter()
        .find(|a| a.token == token)
        .map(|a| a.user.clone())
}

fn login(state: &BackendState, body: &Value) -> ResponseTemplate {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        return ok(json!({"success": true, "token": TOKEN, "user": user_json()}));
    }
    match state
        .accounts
        .iter()
        .find(|a| a.user["email"] == body["email"] && body["password"] == a.password.as_str())
    {
        Some(account) => ok(json!({"success": true, "token": account.token, "user": account.user})),
        None => error(401, "Invalid credentials"),
    }
}

fn register(state: &mut BackendState, body: &Value) -> ResponseTemplate {
    let (Some(name), Some(email), Some(password)) = (
        body["name"].as_str(),
        body["email"].as_str(),
        body["password"].as_str(),
    ) else {
        return error(400, "Name, email and password are required");
    };
    if email == EMAIL || state.accounts.iter().any(|a| a.user["email"] == email) {
        return error(400, "User already exists");
    }
    let number = state.accounts.len() + 1;
    let account = Account {
        user: json!({"_id": format!("u-{number}"), "name": name, "email": email, "role": "user"}),
        password: password.to_string(),
        token: format!("tok-{number}"),
    };
    let response = json!({"success": true, "token": account.token, "user": account.user});
    state.accounts.push(account);
    ResponseTemplate::new(201).set_body_json(response)
}

fn add_to_cart(state: &mut BackendState, body: &Value) -> ResponseTemplate {
    let Some((product, quantity)) = line_input(body) else {
        return error(400, "productId and quantity are required");
    };
    let existing = state
        .cart
        .iter()
        .find(|(id, _)| id == product.id)
        .map_or(0, |(_, q)| *q);
    if existing + quantity > product.stock {
        return error(400, "Insufficient stock");
    }
    match state.cart.iter_mut().find(|(id, _)| id == product.id) {
        Some(line) => line.1 += quantity,
        None => state.cart.push((product.id.to_string(), quantity)),
    }
    ok(json!({"success": true, "cart": cart_json(&state.cart)}))
}

fn update_cart(state: &mut BackendState, body: &Value) -> ResponseTemplate {
    let Some((product, quantity)) = line_input(body) else {
        return error(400, "productId and quantity are required");
    };
    if quantity > product.stock {
        return error(400, "Insufficient stock");
    }
    let Some(line) = state.cart.iter_mut().find(|(id, _)| id == product.id) else {
        return error(404, "Item not in cart");
    };
    line.1 = quantity;
    ok(json!({"cart": cart_json(&state.cart)}))
}

fn create_order(state: &mut BackendState, mut body: Value) -> ResponseTemplate {
    if body["items"].as_array().is_none_or(Vec::is_empty) {
        return error(400, "Order has no items");
    }
    state.next_order += 1;
    body["_id"] = json!(format!("o-{}", state.next_order));
    body["status"] = json!("pending");
    body["createdAt"] = json!("2024-05-01T12:00:00Z");
    state.orders.push(body.clone());
    ResponseTemplate::new(201).set_body_json(json!({"success": true, "order": body}))
}

fn cancel_order(state: &mut BackendState, id: &str) -> ResponseTemplate {
    let Some(order) = state.orders.iter_mut().find(|o| o["_id"] == id) else {
        return error(404, "Order not found");
    };
    if !matches!(order["status"].as_str(), Some("pending" | "processing")) {
        return error(400, "Order can no longer be cancelled");
    }
    order["status"] = json!("cancelled");
    ok(json!({"success": true, "order": order}))
}

fn line_input(body: &Value) -> Option<(&'static SeedProduct, u32)> {
    let product = find_product(body["productId"].as_str()?)?;
    let quantity = u32::try_from(body["quantity"].as_u64()?).ok()?;
    Some((product, quantity))
}

fn find_product(id: &str) -> Option<&'static SeedProduct> {
    CATALOG.iter().find(|p| p.id == id)
}

fn product_json(product: &SeedProduct) -> Value {
    json!({
        "_id": product.id,
        "name": product.name,
        "price": product.price,
        "stock": product.stock,
        "image": format!("/img/{}.png", product.id),
        "featured": product.price >= 50.0,
    })
}

fn cart_json(lines: &[(String, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .filter_map(|(id, quantity)| {
            find_product(id).map(|p| json!({"product": product_json(p), "quantity": quantity}))
        })
        .collect();
    let total_items: u32 = lines.iter().map(|(_, q)| q).sum();
    let total_price: f64 = lines
        .iter()
        .filter_map(|(id, q)| find_product(id).map(|p| p.price * f64::from(*q)))
        .sum();
    json!({"items": items, "totalItems": total_items, "totalPrice": total_price})
}

fn user_json() -> Value {
    json!({"_id": "u-ana", "name": "Ana Lima", "email": EMAIL, "role": "user"})
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"message": message}))
}
