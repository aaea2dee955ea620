//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// PENDING ──┬──► PAID ──► SHIPPED   (SHIPPED is an administrative override)
///           │
///           ├──► CANCELED
///           └──► FAILED
/// ```
///
/// Orders never move backwards. The saga only ever produces PAID or
/// CANCELED; FAILED is kept so stored orders from other producers still
/// deserialize and can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, saga not finished yet.
    #[default]
    Pending,

    /// Stock reserved and payment taken.
    Paid,

    /// Saga failed and reserved stock was released (terminal).
    Canceled,

    /// Order failed outside the saga (terminal).
    Failed,

    /// Handed over for delivery (terminal).
    Shipped,
}

impl OrderStatus {
    /// Returns true if the saga may mark the order as paid.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the saga may cancel the order.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be marked as failed.
    pub fn can_fail(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the administrative ship override is allowed.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Failed => "FAILED",
            OrderStatus::Shipped => "SHIPPED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "CANCELED" => Ok(OrderStatus::Canceled),
            "FAILED" => Ok(OrderStatus::Failed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Canceled,
        OrderStatus::Failed,
        OrderStatus::Shipped,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_only_pending_can_settle() {
        for status in ALL {
            let pending = status == OrderStatus::Pending;
            assert_eq!(status.can_mark_paid(), pending);
            assert_eq!(status.can_cancel(), pending);
            assert_eq!(status.can_fail(), pending);
        }
    }

    #[test]
    fn test_only_paid_can_ship() {
        for status in ALL {
            assert_eq!(status.can_ship(), status == OrderStatus::Paid);
        }
    }

    #[test]
    fn test_wire_format_is_uppercase() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Canceled).unwrap(),
            "\"CANCELED\""
        );
        let status: OrderStatus = serde_json::from_str("\"SHIPPED\"").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn test_parse_from_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert!("COMPLETED".parse::<OrderStatus>().is_err());
    }
}
