//! The transaction state machine.
//!
//! This module is the single source of truth for two things:
//! 1. The mapping from the gateway's status vocabulary onto [`TransactionStatus`]. Both the synchronous response
//!    path and the webhook path call through [`map_gateway_status`]; the mapping is never duplicated elsewhere.
//! 2. Transition legality. Webhook delivery order is not guaranteed, so a stale callback can ask for a transition
//!    the transaction has already moved past. [`check_transition`] is the guard that makes out-of-order and
//!    duplicated delivery safe: terminal states are frozen (with the single `Success -> Refund` exception), and a
//!    repeat of the current status is reported as a duplicate rather than an error.

use log::warn;

use crate::db_types::TransactionStatus;

/// Maps the gateway's status vocabulary onto the internal transaction status.
///
/// | gateway status         | internal status |
/// |------------------------|-----------------|
/// | capture, settlement    | Success         |
/// | pending                | Pending         |
/// | deny, expire           | Failed          |
/// | cancel                 | Cancelled       |
/// | refund, partial_refund | Refund          |
/// | anything else          | Pending         |
///
/// Unmapped inputs are logged as a warning and treated as Pending, so an unknown vocabulary extension can never
/// push a transaction into a terminal state.
pub fn map_gateway_status(gateway_status: &str) -> TransactionStatus {
    match gateway_status {
        "capture" | "settlement" => TransactionStatus::Success,
        "pending" => TransactionStatus::Pending,
        "deny" | "expire" => TransactionStatus::Failed,
        "cancel" => TransactionStatus::Cancelled,
        "refund" | "partial_refund" => TransactionStatus::Refund,
        other => {
            warn!("Unmapped gateway status '{other}'. Treating as Pending.");
            TransactionStatus::Pending
        },
    }
}

/// The verdict on a requested status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The transition is legal and should be applied.
    Apply,
    /// The new status equals the current one. Under at-least-once webhook delivery this is a retransmission, not an
    /// error: record the notification, change nothing else.
    Duplicate,
    /// The transition would move a terminal transaction, or rewind a live one. Reject without mutating.
    Illegal,
}

/// Checks whether `from -> to` is a legal transition.
///
/// | From \ To | Pending | Success | Failed | Cancelled | Refund |
/// |-----------|---------|---------|--------|-----------|--------|
/// | Pending   | Dup     | Apply   | Apply  | Apply     | Illegal|
/// | Success   | Illegal | Dup     | Illegal| Illegal   | Apply  |
/// | Failed    | Illegal | Illegal | Dup    | Illegal   | Illegal|
/// | Cancelled | Illegal | Illegal | Illegal| Dup       | Illegal|
/// | Refund    | Illegal | Illegal | Illegal| Illegal   | Dup    |
pub fn check_transition(from: TransactionStatus, to: TransactionStatus) -> TransitionCheck {
    use TransactionStatus::*;
    match (from, to) {
        (f, t) if f == t => TransitionCheck::Duplicate,
        (Pending, Success | Failed | Cancelled) => TransitionCheck::Apply,
        (Success, Refund) => TransitionCheck::Apply,
        (_, _) => TransitionCheck::Illegal,
    }
}
