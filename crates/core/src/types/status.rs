//! Status enums for orders and accounts.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Progression is one-directional (`pending → processing → shipped →
/// delivered`) except for the explicit transition to `cancelled`. The backend
/// owns every transition but cancellation, which a customer may request while
/// the order is still `pending` or `processing`.
///
/// Values outside the known vocabulary are kept verbatim in
/// [`OrderStatus::Unknown`] so they can still be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    /// A status the backend sent that this client does not recognise.
    Unknown(String),
}

/// Visual treatment for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusBadge {
    Warning,
    Info,
    Accent,
    Success,
    Danger,
    Neutral,
}

impl OrderStatus {
    /// Wire value of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether a customer may still cancel an order in this status.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether the order is still being worked on (`pending` or `processing`).
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        self.is_cancellable()
    }

    /// Human-readable label. Unknown statuses are shown verbatim.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Unknown(raw) => raw,
        }
    }

    /// Badge treatment; unknown statuses fall back to [`StatusBadge::Neutral`].
    #[must_use]
    pub const fn badge(&self) -> StatusBadge {
        match self {
            Self::Pending => StatusBadge::Warning,
            Self::Processing => StatusBadge::Info,
            Self::Shipped => StatusBadge::Accent,
            Self::Delivered => StatusBadge::Success,
            Self::Cancelled => StatusBadge::Danger,
            Self::Unknown(_) => StatusBadge::Neutral,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Unknown(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account role assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Store administrator.
    Admin,
    /// Regular shopper. Unrecognised roles land here.
    #[default]
    #[serde(other)]
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}
