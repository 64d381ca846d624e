use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

pub use pay_common::MinorUnits;

//--------------------------------------        OrderId        -------------------------------------------------------
/// The externally visible, caller-supplied identifier for a transaction. Unique across all transactions.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The charge has been created but the gateway has not reported a terminal outcome yet.
    Pending,
    /// The gateway captured or settled the charge.
    Success,
    /// The gateway denied the charge, or it expired.
    Failed,
    /// The charge was cancelled before settlement.
    Cancelled,
    /// The settled charge was refunded (fully or partially).
    Refund,
}

impl TransactionStatus {
    /// Terminal statuses permit no further automatic transition, with the single exception of `Success -> Refund`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Success => write!(f, "Success"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
            TransactionStatus::Refund => write!(f, "Refund"),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to Pending");
            TransactionStatus::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            "Refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod     --------------------------------------------------------
/// Descriptor for the instrument the customer paid with, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// The gateway's payment type identifier, e.g. "bank_transfer" or "credit_card"
    pub method_type: String,
    /// The provider behind the instrument, if the gateway reports one
    pub provider: Option<String>,
    /// Human-readable name for display purposes
    pub display_name: String,
}

impl PaymentMethod {
    pub fn from_payment_type(payment_type: &str) -> Self {
        let display_name = payment_type.replace('_', " ");
        Self { method_type: payment_type.to_string(), provider: None, display_name }
    }
}

//--------------------------------------      Transaction     --------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: String,
    /// The charge amount in minor currency units. Immutable once created.
    pub amount: MinorUnits,
    /// ISO currency code. Immutable once created.
    pub currency: String,
    pub status: TransactionStatus,
    /// Set from the gateway's synchronous response or the first webhook that reports a payment type.
    pub payment_method: Option<Json<PaymentMethod>>,
    /// Append-only grab bag: raw gateway responses, fraud status, refund bookkeeping.
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The cumulative amount already refunded against this transaction, as recorded in metadata.
    pub fn refunded_total(&self) -> MinorUnits {
        self.metadata
            .0
            .get("refunded_total")
            .and_then(Value::as_i64)
            .map(MinorUnits::from)
            .unwrap_or_default()
    }
}

//--------------------------------------    NewTransaction    --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// The order_id as assigned by the caller. Must be unique.
    pub order_id: OrderId,
    /// The authenticated user this charge belongs to
    pub user_id: String,
    /// The total charge amount in minor currency units
    pub amount: MinorUnits,
    /// ISO currency code
    pub currency: String,
}

impl NewTransaction {
    pub fn new(order_id: OrderId, user_id: String, amount: MinorUnits, currency: String) -> Self {
        Self { order_id, user_id, amount, currency }
    }
}

//--------------------------------------    InvoiceStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Draft => write!(f, "Draft"),
            InvoiceStatus::Sent => write!(f, "Sent"),
            InvoiceStatus::Paid => write!(f, "Paid"),
            InvoiceStatus::Overdue => write!(f, "Overdue"),
            InvoiceStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Draft" => Self::Draft,
            "Sent" => Self::Sent,
            "Paid" => Self::Paid,
            "Overdue" => Self::Overdue,
            "Cancelled" => Self::Cancelled,
            _ => {
                error!("Invalid invoice status: {value}. But this conversion cannot fail. Defaulting to Draft");
                Self::Draft
            },
        }
    }
}

//--------------------------------------     InvoiceItem      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub line_total: MinorUnits,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price: MinorUnits) -> Self {
        Self { description: description.into(), quantity, unit_price, line_total: unit_price * quantity }
    }
}

//--------------------------------------       Invoice        --------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: i64,
    /// `INV{year}{month}{seq}`, e.g. INV2024010042. Unique; the sequence resets each month and is zero-padded to
    /// four digits, growing a digit past 9999.
    pub invoice_number: String,
    pub user_id: String,
    /// Exactly one invoice exists per settled transaction.
    pub transaction_id: i64,
    /// Subtotal in minor currency units
    pub amount: MinorUnits,
    pub tax: MinorUnits,
    /// Always amount + tax; recomputed, never independently mutated.
    pub total: MinorUnits,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    /// Ordered line items
    pub items: Json<Vec<InvoiceItem>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      NewInvoice      --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub user_id: String,
    pub transaction_id: i64,
    pub amount: MinorUnits,
    pub tax: MinorUnits,
    pub total: MinorUnits,
    pub due_date: DateTime<Utc>,
    pub items: Vec<InvoiceItem>,
}

/// An empty, append-ready metadata object for new transactions.
pub fn empty_metadata() -> Json<Value> {
    Json(json!({}))
}
