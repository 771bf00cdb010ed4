//! Order status state machines.

use serde::{Deserialize, Serialize};

/// Wire value recorded on a line when a return has been requested.
pub const RETURN_PENDING: &str = "Return Pending";

/// Lifecycle status of a single order line.
///
/// State transitions:
/// ```text
/// pending ──► Processing ──► Shipped ──► Delivered ──► (return requested)
///    │
///    └──► Cancelled
/// ```
///
/// Wire values match the upstream storefront exactly, including the
/// lowercase `"pending"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    /// Line has been placed and paid for but not yet processed.
    #[default]
    #[serde(rename = "pending")]
    Pending,

    /// Line is being prepared for shipment.
    Processing,

    /// Line has left the warehouse.
    Shipped,

    /// Line has reached the customer. Only delivered lines are returnable.
    Delivered,

    /// Line was cancelled; its stock has been restored (terminal).
    Cancelled,
}

impl ItemStatus {
    /// Returns true if cancelling this line must restore stock.
    ///
    /// A line that is already cancelled has had its stock restored once;
    /// restoring again would double-credit the ledger.
    pub fn needs_stock_restore_on_cancel(&self) -> bool {
        !matches!(self, ItemStatus::Cancelled)
    }

    /// Returns true if a return may be requested for this line.
    pub fn can_request_return(&self) -> bool {
        matches!(self, ItemStatus::Delivered)
    }

    /// Returns true if this is a terminal state for ledger purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Cancelled)
    }

    /// Returns the wire value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "Processing",
            ItemStatus::Shipped => "Shipped",
            ItemStatus::Delivered => "Delivered",
            ItemStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of an order.
///
/// Derives to `Cancelled` only when every line is cancelled; partial
/// cancellation leaves the aggregate status unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,

    Processing,

    Shipped,

    Delivered,

    Cancelled,
}

impl OrderStatus {
    /// Returns the wire value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
