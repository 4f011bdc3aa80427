//! Cart manager.
//!
//! The backend owns the cart. Every mutation is a round trip whose response
//! replaces the local copy wholesale; a failed mutation leaves the local copy
//! exactly as it was.
//!
//! The local copy is tagged with the identity it was loaded for. Reads
//! compare that tag with the current session, so a cart never outlives a
//! logout (or a session cleared by a 401) even before `sync_with_session`
//! has run.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::task::JoinHandle;
use tracing::instrument;

use mercado_core::{Money, ProductId, UserId};

use crate::error::{AuthError, ClientError, Result, ValidationError, add_breadcrumb};
use crate::models::Cart;
use crate::session::SessionManager;

/// Shared cart state. Cheap to clone.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartInner>,
}

struct CartInner {
    session: SessionManager,
    state: RwLock<CartState>,
    mutation: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct CartState {
    owner: Option<UserId>,
    cart: Option<Cart>,
    load_error: Option<String>,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("cart", &self.cart())
            .finish_non_exhaustive()
    }
}

impl CartManager {
    /// Cart manager over `session`. Nothing is loaded yet.
    #[must_use]
    pub fn new(session: SessionManager) -> Self {
        Self {
            inner: Arc::new(CartInner {
                session,
                state: RwLock::new(CartState::default()),
                mutation: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Fetch the cart from the backend.
    ///
    /// A failure leaves no cart and records a load error, which
    /// [`CartManager::load_error`] reports separately from an empty cart.
    ///
    /// # Errors
    ///
    /// Any auth or transport failure.
    #[instrument(skip(self))]
    pub async fn load_cart(&self) -> Result<()> {
        let owner = self.owner()?;
        match self.inner.session.api().fetch_cart().await {
            Ok(cart) => {
                let cart = cart.unwrap_or_else(Cart::empty);
                tracing::debug!(lines = cart.items.len(), "Cart loaded");
                self.write(|state| {
                    state.owner = Some(owner);
                    state.cart = Some(cart);
                    state.load_error = None;
                });
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load cart");
                self.write(|state| {
                    state.owner = Some(owner);
                    state.cart = None;
                    state.load_error = Some(err.user_message());
                });
                Err(err)
            }
        }
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// - `Validation(InvalidQuantity)` for a zero quantity (no request sent)
    /// - `Pending` while another cart mutation is in flight
    /// - `Conflict` when the backend refuses (for example insufficient stock)
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity.into());
        }
        add_breadcrumb(
            "cart",
            "Add item",
            &[("product_id", product_id.as_str()), ("quantity", &quantity.to_string())],
        );
        let api = self.inner.session.api();
        self.mutate(api.add_to_cart(product_id, quantity)).await
    }

    /// Set the quantity of a line.
    ///
    /// # Errors
    ///
    /// Same as [`CartManager::add_item`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_item_quantity(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity.into());
        }
        add_breadcrumb(
            "cart",
            "Update quantity",
            &[("product_id", product_id.as_str()), ("quantity", &quantity.to_string())],
        );
        let api = self.inner.session.api();
        self.mutate(api.update_cart_item(product_id, quantity)).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// `Pending` while another cart mutation is in flight, or any auth or
    /// transport failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<()> {
        add_breadcrumb("cart", "Remove item", &[("product_id", product_id.as_str())]);
        let api = self.inner.session.api();
        self.mutate(api.remove_from_cart(product_id)).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// `Pending` while another cart mutation is in flight, or any auth or
    /// transport failure.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        add_breadcrumb("cart", "Clear cart", &[]);
        let api = self.inner.session.api();
        self.mutate(api.clear_cart()).await
    }

    /// Run one mutation under the single-flight guard and adopt its result.
    async fn mutate<F>(&self, request: F) -> Result<()>
    where
        F: Future<Output = Result<Option<Cart>>>,
    {
        let _guard = self
            .inner
            .mutation
            .try_lock()
            .map_err(|_| ClientError::Pending("cart update"))?;
        let owner = self.owner()?;

        let cart = request.await?.unwrap_or_else(Cart::empty);
        tracing::debug!(
            lines = cart.items.len(),
            total_items = cart.total_items,
            "Cart replaced from server"
        );
        self.write(|state| {
            state.owner = Some(owner);
            state.cart = Some(cart);
            state.load_error = None;
        });
        Ok(())
    }

    /// Current cart, if one is loaded for the signed-in user.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.read(|cart| cart.cloned())
    }

    /// Message of the last failed load, if the cart could not be fetched.
    #[must_use]
    pub fn load_error(&self) -> Option<String> {
        let current = self.current_owner();
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() && state.owner == current {
            state.load_error.clone()
        } else {
            None
        }
    }

    /// Number of units in the cart, as counted by the backend.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.read(|cart| cart.map_or(0, |cart| cart.total_items))
    }

    /// Display subtotal recomputed from the lines.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.read(|cart| cart.map_or(Money::ZERO, Cart::subtotal))
    }

    /// The backend's cart total. This is the figure submitted with an order.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.read(|cart| cart.map_or(Money::ZERO, |cart| cart.total_price))
    }

    /// Whether the product has a line in the cart.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.read(|cart| cart.is_some_and(|cart| cart.line(product_id).is_some()))
    }

    /// Follow a session change: load the cart for a new identity, drop it
    /// when the session is gone.
    ///
    /// # Errors
    ///
    /// The load failure, when a load was attempted.
    pub async fn sync_with_session(&self) -> Result<()> {
        let current = self.current_owner();
        let loaded_for = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .owner
            .clone();

        match current {
            None => {
                self.discard();
                Ok(())
            }
            Some(user) if loaded_for.as_ref() != Some(&user) => {
                self.discard();
                self.load_cart().await
            }
            Some(_) => Ok(()),
        }
    }

    /// Drop the local cart without touching the backend.
    pub fn discard(&self) {
        self.write(|state| *state = CartState::default());
    }

    /// Drop the local cart and record `message` as the load error.
    ///
    /// For when the backend cart is known to have changed but the new
    /// contents are not known. The next `load_cart` replaces both.
    pub(crate) fn mark_stale(&self, message: String) {
        let owner = self.current_owner();
        self.write(|state| {
            state.owner = owner;
            state.cart = None;
            state.load_error = Some(message);
        });
    }

    /// Keep the cart in step with the session on a background task.
    ///
    /// The task ends when the session is dropped.
    #[must_use]
    pub fn spawn_session_sync(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut rx = self.inner.session.subscribe();
        tokio::spawn(async move {
            loop {
                match manager.sync_with_session().await {
                    Err(err) if err.is_auth() => {
                        tracing::debug!(error = %err, "Cart sync skipped, session ended");
                    }
                    Err(err) => tracing::warn!(error = %err, "Cart sync after session change failed"),
                    Ok(()) => {}
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn owner(&self) -> Result<UserId> {
        self.current_owner()
            .ok_or(ClientError::Auth(AuthError::NotAuthenticated))
    }

    fn current_owner(&self) -> Option<UserId> {
        self.inner.session.current_identity().map(|identity| identity.id)
    }

    fn read<T>(&self, f: impl FnOnce(Option<&Cart>) -> T) -> T {
        let current = self.current_owner();
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        let visible = current
            .filter(|user| state.owner.as_ref() == Some(user))
            .and(state.cart.as_ref());
        f(visible)
    }

    fn write(&self, f: impl FnOnce(&mut CartState)) {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}
