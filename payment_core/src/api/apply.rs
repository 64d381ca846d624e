//! The one code path that changes a transaction's status.
//!
//! Both the synchronous gateway-response path and the webhook path funnel through [`apply_status`], so the state
//! machine's mapping and legality rules are enforced in exactly one place, and every status write goes through the
//! store's conditional update.

use log::*;
use serde_json::Value;

use crate::{
    api::PaymentFlowError,
    db_types::{Transaction, TransactionStatus},
    state_machine::{check_transition, TransitionCheck},
    traits::TransactionStore,
};

/// How a status application resolved. `Duplicate` is a successful no-op: the notification was recorded but the
/// transaction was already in the requested status.
pub(crate) enum ApplyVerdict {
    Applied(Transaction),
    Duplicate(Transaction),
}

/// Applies `new_status` to the transaction, honouring transition legality and the store's optimistic guard.
///
/// If the conditional update loses to a concurrent writer, the transaction is re-read and the transition
/// re-evaluated; a lost race therefore resolves to whatever the state machine says about the *actual* current
/// status (commonly `Duplicate` when the concurrent writer applied the same webhook).
pub(crate) async fn apply_status<B: TransactionStore>(
    db: &B,
    mut current: Transaction,
    new_status: TransactionStatus,
    patch: Value,
) -> Result<ApplyVerdict, PaymentFlowError> {
    loop {
        match check_transition(current.status, new_status) {
            TransitionCheck::Duplicate => {
                debug!(
                    "🔄️ Transaction {} is already {}. Recording the notification and doing nothing else.",
                    current.order_id, current.status
                );
                let tx = db.append_metadata(current.id, patch).await?;
                return Ok(ApplyVerdict::Duplicate(tx));
            },
            TransitionCheck::Illegal => {
                warn!(
                    "🔄️ Rejecting illegal transition {} -> {new_status} for {}. This usually indicates stale or \
                     re-ordered webhook delivery.",
                    current.status, current.order_id
                );
                return Err(PaymentFlowError::IllegalTransition {
                    order_id: current.order_id.clone(),
                    from: current.status,
                    to: new_status,
                });
            },
            TransitionCheck::Apply => {
                match db.update_status_with_guard(current.id, current.status, new_status, patch.clone()).await? {
                    Some(tx) => {
                        info!("🔄️ Transaction {} moved {} -> {}", tx.order_id, current.status, new_status);
                        return Ok(ApplyVerdict::Applied(tx));
                    },
                    None => {
                        // a concurrent delivery moved the transaction between our read and our write
                        debug!(
                            "🔄️ Conditional status update for {} lost a race. Re-reading and re-evaluating.",
                            current.order_id
                        );
                        current = db
                            .fetch_transaction_by_order_id(&current.order_id)
                            .await?
                            .ok_or_else(|| PaymentFlowError::TransactionNotFound(current.order_id.clone()))?;
                    },
                }
            },
        }
    }
}
