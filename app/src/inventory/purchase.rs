//! Set purchase: optimistic local check, commit, reconciliation.
//!
//! ```text
//! Idle -> check_local -> RejectedLocal
//!                     -> Submitting -> Committed      (reload)
//!                                   -> RejectedStock  (reload)
//!                                   -> RejectedOther
//! ```
//!
//! The local stock check only saves a round trip; the server's answer is
//! authoritative. A stock conflict means the cached count was stale, so the
//! catalog is reloaded to repair it.

use super::Tire;
use pitstop_core::classify::ErrorKind;
use thiserror::Error;

/// Message shown when the server reports a stock conflict
pub const INSUFFICIENT_STOCK_MESSAGE: &str = "insufficient stock";

/// Where one purchase attempt stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchasePhase {
    /// Refused before contacting the server
    RejectedLocal(LocalRejection),
    /// Commit request in flight
    Submitting,
    /// Order created
    Committed {
        /// Server-assigned order id, when reported
        order_id: Option<i64>,
    },
    /// The server had less stock than the cache claimed
    RejectedStock,
    /// Any other failure
    RejectedOther {
        /// Display text of the classified failure
        message: String,
    },
}

impl PurchasePhase {
    /// Whether the attempt has reached a final state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitting)
    }

    /// Whether the displayed stock must be refreshed after this outcome
    #[must_use]
    pub const fn requires_reload(&self) -> bool {
        matches!(self, Self::Committed { .. } | Self::RejectedStock)
    }
}

/// One purchase of a set of one tire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseAttempt {
    /// Tire being bought
    pub item_id: i64,
    /// Units requested (the set size)
    pub requested_quantity: u32,
    /// `"<brand> <model>"`, for the success notice
    pub item_name: String,
    /// Current state
    pub phase: PurchasePhase,
}

impl PurchaseAttempt {
    /// Text to show for the attempt's outcome, if it failed
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match &self.phase {
            PurchasePhase::RejectedLocal(reason) => Some(reason.to_string()),
            PurchasePhase::RejectedStock => Some(INSUFFICIENT_STOCK_MESSAGE.to_string()),
            PurchasePhase::RejectedOther { message } => Some(message.clone()),
            PurchasePhase::Submitting | PurchasePhase::Committed { .. } => None,
        }
    }
}

/// Reasons a purchase is refused without a network call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalRejection {
    /// The tire has no id or is not in the loaded catalog
    #[error("invalid item identifier")]
    InvalidItem,

    /// The cached stock cannot cover a set
    #[error("insufficient stock on hand: a set needs at least {required} units")]
    InsufficientStock {
        /// Units per set
        required: u32,
        /// Cached stock
        available: i64,
    },

    /// A purchase of the same tire is already being submitted
    #[error("a purchase of this item is already in progress")]
    AlreadySubmitting,
}

/// Display name used in the purchase notice
#[must_use]
pub fn item_name(tire: &Tire) -> String {
    let brand = tire.brand.as_deref().unwrap_or("Unknown");
    let model = tire.model.as_deref().unwrap_or_default();
    format!("{brand} {model}").trim_end().to_string()
}

/// Optimistic check before submitting.
///
/// `in_flight` tells whether an attempt for the same tire is `Submitting`.
///
/// # Errors
///
/// Returns the [`LocalRejection`] that prevents submitting.
pub fn check_local(tire: &Tire, set_size: u32, in_flight: bool) -> Result<(), LocalRejection> {
    if in_flight {
        return Err(LocalRejection::AlreadySubmitting);
    }
    let available = tire.stock_quantity.unwrap_or(0);
    if available < i64::from(set_size) {
        return Err(LocalRejection::InsufficientStock {
            required: set_size,
            available,
        });
    }
    Ok(())
}

/// Phase a commit response moves a `Submitting` attempt to.
///
/// Returns `None` for a cancellation: the attempt is simply discarded.
#[must_use]
pub fn resolve(result: Result<Option<i64>, &ErrorKind>, conflict_statuses: &[u16]) -> Option<PurchasePhase> {
    match result {
        Ok(order_id) => Some(PurchasePhase::Committed { order_id }),
        Err(error) if error.is_cancelled() => None,
        Err(error) if error.status_code().is_some_and(|code| conflict_statuses.contains(&code)) => {
            Some(PurchasePhase::RejectedStock)
        },
        Err(error) => Some(PurchasePhase::RejectedOther {
            message: error
                .user_message()
                .unwrap_or_else(|| error.to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tire(stock: Option<i64>) -> Tire {
        Tire {
            id: Some(1),
            brand: Some("Nokian".to_string()),
            model: Some("Hakkapeliitta 10".to_string()),
            size: None,
            season: None,
            price: Some(9000.0),
            stock_quantity: stock,
            image_url: None,
        }
    }

    #[test]
    fn local_check_requires_a_full_set() {
        assert_eq!(check_local(&tire(Some(4)), 4, false), Ok(()));
        assert_eq!(
            check_local(&tire(Some(3)), 4, false),
            Err(LocalRejection::InsufficientStock { required: 4, available: 3 })
        );
        assert!(check_local(&tire(None), 4, false).is_err());
    }

    #[test]
    fn local_check_refuses_second_submission() {
        assert_eq!(check_local(&tire(Some(40)), 4, true), Err(LocalRejection::AlreadySubmitting));
    }

    #[test]
    fn conflict_status_means_rejected_stock() {
        let conflict = ErrorKind::ServerRejected { status_code: 409, message: None };
        let phase = resolve(Err(&conflict), &[400, 409]).unwrap();
        assert_eq!(phase, PurchasePhase::RejectedStock);
        assert!(phase.requires_reload());
    }

    #[test]
    fn other_failures_keep_their_message_and_skip_reload() {
        let rejected = ErrorKind::ServerRejected {
            status_code: 500,
            message: Some("warehouse offline".to_string()),
        };
        let phase = resolve(Err(&rejected), &[400, 409]).unwrap();
        assert_eq!(phase, PurchasePhase::RejectedOther { message: "warehouse offline".to_string() });
        assert!(!phase.requires_reload());

        let transport = ErrorKind::Transport { cause: Arc::new(std::io::Error::other("reset")) };
        assert!(matches!(resolve(Err(&transport), &[400]), Some(PurchasePhase::RejectedOther { .. })));
    }

    #[test]
    fn cancellation_discards_the_attempt() {
        assert_eq!(resolve(Err(&ErrorKind::Cancelled), &[400]), None);
        assert_eq!(resolve(Ok(Some(5)), &[400]), Some(PurchasePhase::Committed { order_id: Some(5) }));
    }

    #[test]
    fn item_name_joins_brand_and_model() {
        assert_eq!(item_name(&tire(None)), "Nokian Hakkapeliitta 10");
        let mut anonymous = tire(None);
        anonymous.brand = None;
        anonymous.model = None;
        assert_eq!(item_name(&anonymous), "Unknown");
    }
}
