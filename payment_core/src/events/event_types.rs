use crate::db_types::{Invoice, Transaction};

/// Emitted exactly once when a transaction reaches `Success` and its invoice has been generated.
///
/// The mail, notification and loyalty subsystems are external collaborators: they subscribe to this event and run as
/// fire-and-forget side effects. Nothing in the payment flow waits on them or observes their failures.
#[derive(Debug, Clone)]
pub struct PaymentSettledEvent {
    pub transaction: Transaction,
    pub invoice: Invoice,
}

impl PaymentSettledEvent {
    pub fn new(transaction: Transaction, invoice: Invoice) -> Self {
        Self { transaction, invoice }
    }
}
