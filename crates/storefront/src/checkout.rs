//! Checkout state machine.
//!
//! ```text
//! Shipping ──continue_to_payment──▶ Payment ──place_order──▶ Confirmed
//!     ▲                                │
//!     └──────────────back──────────────┘
//! ```
//!
//! The draft lives in memory only. `place_order` builds the order from the
//! cart as it is at submission time and submits the backend's cart total.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use crate::cart::CartManager;
use crate::error::{AuthError, ClientError, Result, ValidationError, add_breadcrumb};
use crate::models::{Cart, NewOrder, NewOrderLine, Order, ShippingAddress};
use crate::session::{CART_PATH, LOGIN_PATH, SessionManager};

/// Payment method sent with every order.
pub const PAYMENT_METHOD: &str = "credit_card";

const CART_STALE_MESSAGE: &str = "Your order was placed, but the cart could not be refreshed";

/// Checkout steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Confirmed,
}

impl CheckoutStep {
    /// 1-based position, as shown in a progress indicator.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Shipping => 1,
            Self::Payment => 2,
            Self::Confirmed => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Confirmed => "confirmed",
        }
    }
}

/// Shipping form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl ShippingInfo {
    /// Names of blank fields, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("postal code", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Address block of the order.
    #[must_use]
    pub fn to_address(&self) -> ShippingAddress {
        ShippingAddress {
            full_name: self.full_name.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// Payment form. Card number and CVV are secrets.
#[derive(Clone)]
pub struct PaymentInfo {
    pub card_number: SecretString,
    pub card_name: String,
    pub expiry: String,
    pub cvv: SecretString,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            card_number: SecretString::from(""),
            card_name: String::new(),
            expiry: String::new(),
            cvv: SecretString::from(""),
        }
    }
}

impl std::fmt::Debug for PaymentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentInfo")
            .field("card_number", &"[REDACTED]")
            .field("card_name", &self.card_name)
            .field("expiry", &self.expiry)
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}

impl PaymentInfo {
    /// Names of blank fields, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.card_number.expose_secret().trim().is_empty() {
            missing.push("card number");
        }
        if self.card_name.trim().is_empty() {
            missing.push("name on card");
        }
        if self.expiry.trim().is_empty() {
            missing.push("expiry");
        }
        if self.cvv.expose_secret().trim().is_empty() {
            missing.push("cvv");
        }
        missing
    }
}

/// Everything entered so far, plus the current step.
#[derive(Debug, Clone, Default)]
pub struct CheckoutDraft {
    pub step: CheckoutStep,
    pub shipping: ShippingInfo,
    pub payment: PaymentInfo,
}

/// Why checkout could not be opened, and where to send the user instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRefusal {
    NotAuthenticated,
    EmptyCart,
}

impl EntryRefusal {
    /// Page to redirect to.
    #[must_use]
    pub const fn redirect_path(self) -> &'static str {
        match self {
            Self::NotAuthenticated => LOGIN_PATH,
            Self::EmptyCart => CART_PATH,
        }
    }
}

/// One checkout flow.
pub struct Checkout {
    session: SessionManager,
    cart: CartManager,
    draft: Mutex<CheckoutDraft>,
    submitting: AtomicBool,
    placed: Mutex<Option<Order>>,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("step", &self.step())
            .field("submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

/// Clears the submission flag on every exit path.
struct SubmissionGuard<'a>(&'a AtomicBool);

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Checkout {
    /// Open checkout.
    ///
    /// Checked once: a signed-in session and a non-empty cart. Name and email
    /// are pre-filled from the identity.
    ///
    /// # Errors
    ///
    /// The refusal names the page to send the user to.
    pub fn begin(
        session: SessionManager,
        cart: CartManager,
    ) -> std::result::Result<Self, EntryRefusal> {
        let Some(identity) = session.current_identity() else {
            return Err(EntryRefusal::NotAuthenticated);
        };
        if cart.cart().is_none_or(|cart| cart.is_empty()) {
            return Err(EntryRefusal::EmptyCart);
        }

        let draft = CheckoutDraft {
            shipping: ShippingInfo {
                full_name: identity.name,
                email: identity.email.into_inner(),
                ..ShippingInfo::default()
            },
            ..CheckoutDraft::default()
        };
        tracing::debug!(user_id = %identity.id, "Checkout opened");

        Ok(Self {
            session,
            cart,
            draft: Mutex::new(draft),
            submitting: AtomicBool::new(false),
            placed: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn step(&self) -> CheckoutStep {
        self.lock_draft().step
    }

    /// Copy of the draft.
    #[must_use]
    pub fn draft(&self) -> CheckoutDraft {
        self.lock_draft().clone()
    }

    /// Edit the shipping form.
    pub fn update_shipping(&self, edit: impl FnOnce(&mut ShippingInfo)) {
        edit(&mut self.lock_draft().shipping);
    }

    /// Edit the payment form.
    pub fn update_payment(&self, edit: impl FnOnce(&mut PaymentInfo)) {
        edit(&mut self.lock_draft().payment);
    }

    /// Shipping → Payment.
    ///
    /// # Errors
    ///
    /// `Validation(MissingFields)` listing every blank shipping field, or
    /// `Validation(WrongStep)` outside the shipping step.
    pub fn continue_to_payment(&self) -> Result<()> {
        let mut draft = self.lock_draft();
        if draft.step != CheckoutStep::Shipping {
            return Err(wrong_step("continue to payment", draft.step));
        }
        let missing = draft.shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields { fields: missing }.into());
        }
        draft.step = CheckoutStep::Payment;
        tracing::debug!("Checkout moved to payment");
        Ok(())
    }

    /// Payment → Shipping. Entered data is kept.
    ///
    /// # Errors
    ///
    /// `Validation(WrongStep)` outside the payment step.
    pub fn back(&self) -> Result<()> {
        let mut draft = self.lock_draft();
        if draft.step != CheckoutStep::Payment {
            return Err(wrong_step("go back", draft.step));
        }
        draft.step = CheckoutStep::Shipping;
        Ok(())
    }

    /// Payment → Confirmed: submit the order.
    ///
    /// On success the cart is cleared and the order is kept for
    /// [`Checkout::placed_order`]. If the order is created but the cart cannot
    /// be cleared, the local cart is dropped with a load error instead of
    /// showing the ordered lines. On failure the step, the draft and the cart
    /// are unchanged.
    ///
    /// # Errors
    ///
    /// - `Pending` while a submission is in flight
    /// - `Validation` for the wrong step, blank payment fields or an empty cart
    /// - `Auth(NotAuthenticated)` if the session ended since checkout opened
    /// - any failure of `POST /orders`
    #[instrument(skip(self))]
    pub async fn place_order(&self) -> Result<Order> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::Pending("order submission"));
        }
        let _guard = SubmissionGuard(&self.submitting);

        let body = {
            let draft = self.lock_draft();
            if draft.step != CheckoutStep::Payment {
                return Err(wrong_step("place the order", draft.step));
            }
            let missing: Vec<_> = draft
                .shipping
                .missing_fields()
                .into_iter()
                .chain(draft.payment.missing_fields())
                .collect();
            if !missing.is_empty() {
                return Err(ValidationError::MissingFields { fields: missing }.into());
            }
            if !self.session.is_authenticated() {
                return Err(AuthError::NotAuthenticated.into());
            }
            let cart = self
                .cart
                .cart()
                .filter(|cart| !cart.is_empty())
                .ok_or(ValidationError::EmptyCart)?;
            order_body(&cart, &draft.shipping)
        };

        add_breadcrumb(
            "checkout",
            "Place order",
            &[("lines", &body.items.len().to_string())],
        );
        let order = self.session.api().create_order(&body).await?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Order placed");

        if let Err(err) = self.cart.clear_cart().await {
            tracing::warn!(error = %err, order_id = %order.id, "Order placed but cart could not be cleared");
            self.cart.mark_stale(CART_STALE_MESSAGE.to_string());
        }

        self.lock_draft().step = CheckoutStep::Confirmed;
        *self.placed.lock().unwrap_or_else(PoisonError::into_inner) = Some(order.clone());
        Ok(order)
    }

    /// Whether `place_order` is in flight. Use to disable the submit control.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// The order created by this checkout, once confirmed.
    #[must_use]
    pub fn placed_order(&self) -> Option<Order> {
        self.placed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_draft(&self) -> std::sync::MutexGuard<'_, CheckoutDraft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn wrong_step(action: &'static str, step: CheckoutStep) -> ClientError {
    ValidationError::WrongStep {
        action,
        step: step.name(),
    }
    .into()
}

/// Order body from the cart snapshot and the shipping form.
fn order_body(cart: &Cart, shipping: &ShippingInfo) -> NewOrder {
    NewOrder {
        items: cart
            .items
            .iter()
            .map(|line| NewOrderLine {
                product: line.product.id.clone(),
                quantity: line.quantity,
                price: line.product.price,
            })
            .collect(),
        shipping_address: shipping.to_address(),
        payment_method: PAYMENT_METHOD.to_string(),
        total_amount: cart.total_price,
    }
}
