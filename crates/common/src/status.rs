//! Order status lifecycle and user roles.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order.
///
/// Nominal lifecycle:
/// ```text
/// Pending ──► AwaitingPayment ──► Confirmed ──► Shipping ──► Delivered ──► Completed
///    │               │                │            │            │
///    └───────────────┴────────────────┴────────────┴────────────┴──► Canceled | Declined | Refunded
/// ```
///
/// The diagram documents intent only. Status updates are not validated against
/// it: an administrator may write any status onto any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Initial status, assigned at checkout.
    #[default]
    Pending,
    AwaitingPayment,
    Confirmed,
    Shipping,
    Delivered,
    Completed,
    Canceled,
    Declined,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::AwaitingPayment,
        OrderStatus::Confirmed,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Canceled,
        OrderStatus::Declined,
        OrderStatus::Refunded,
    ];

    /// Returns true for statuses the nominal lifecycle never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Canceled
                | OrderStatus::Declined
                | OrderStatus::Refunded
        )
    }

    /// Returns the persisted name, e.g. `"AWAITING_PAYMENT"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipping => "SHIPPING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Declined => "DECLINED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a status or role name does not match any known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for OrderStatus {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseNameError {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

/// Authorisation role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Admin,
    User,
}

impl RoleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::User => "USER",
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(RoleName::Admin),
            "USER" => Ok(RoleName::User),
            _ => Err(ParseNameError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::AwaitingPayment.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::Shipping.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Declined.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "awaiting_payment".parse::<OrderStatus>().unwrap(),
            OrderStatus::AwaitingPayment
        );
        assert_eq!("SHIPPING".parse::<OrderStatus>().unwrap(), OrderStatus::Shipping);
        assert!("LOST".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_parse_matches_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"AWAITING_PAYMENT\"");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<RoleName>().unwrap(), RoleName::Admin);
        assert_eq!(" User ".parse::<RoleName>().unwrap(), RoleName::User);
        let err = "root".parse::<RoleName>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role: root");
    }
}
