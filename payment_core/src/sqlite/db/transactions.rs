use log::debug;
use serde_json::Value;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTransaction, OrderId, PaymentMethod, Transaction, TransactionStatus},
    traits::PaymentStoreError,
};

/// Inserts a new transaction with `Pending` status. The UNIQUE constraint on `order_id` turns a duplicate insert
/// into [`PaymentStoreError::DuplicateOrderId`].
pub async fn insert_transaction(
    transaction: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<Transaction, PaymentStoreError> {
    let order_id = transaction.order_id.clone();
    let result = sqlx::query_as::<_, Transaction>(
        r#"
            INSERT INTO transactions (order_id, user_id, amount, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(transaction.order_id)
    .bind(transaction.user_id)
    .bind(transaction.amount.value())
    .bind(transaction.currency)
    .fetch_one(conn)
    .await;
    match result {
        Ok(tx) => {
            debug!("🗃️ Transaction [{}] inserted with id {}", tx.order_id, tx.id);
            Ok(tx)
        },
        Err(e) if e.as_database_error().is_some_and(|de| de.is_unique_violation()) => {
            Err(PaymentStoreError::DuplicateOrderId(order_id))
        },
        Err(e) => Err(e.into()),
    }
}

/// Returns the transaction for the corresponding `order_id`, if any.
pub async fn fetch_transaction_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let tx = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Moves the transaction from `expected` to `new_status` and merges `metadata_patch` into its metadata, as a single
/// conditional UPDATE. Returns `None` when the status precondition does not hold, i.e. when a concurrent writer got
/// there first.
pub async fn update_status_with_guard(
    id: i64,
    expected: TransactionStatus,
    new_status: TransactionStatus,
    metadata_patch: Value,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, PaymentStoreError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions
            SET status = $1, metadata = json_patch(metadata, $2), updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(new_status.to_string())
    .bind(metadata_patch.to_string())
    .bind(id)
    .bind(expected.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Merges `patch` into the transaction's metadata only while the cumulative refunded total still equals
/// `expected_total`, as a single conditional UPDATE. The refund bound is checked against the value this guard
/// protects, so two racing refunds cannot both claim the same remainder. Returns `None` when the guard fails.
pub async fn update_refund_total_with_guard(
    id: i64,
    expected_total: i64,
    patch: Value,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, PaymentStoreError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions
            SET metadata = json_patch(metadata, $1), updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND COALESCE(json_extract(metadata, '$.refunded_total'), 0) = $3
            RETURNING *;
        "#,
    )
    .bind(patch.to_string())
    .bind(id)
    .bind(expected_total)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Merges `patch` into the transaction's metadata. Keys are added or overwritten; existing keys the patch does not
/// name are untouched.
pub async fn append_metadata(
    id: i64,
    patch: Value,
    conn: &mut SqliteConnection,
) -> Result<Transaction, PaymentStoreError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions
            SET metadata = json_patch(metadata, $1), updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(patch.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(PaymentStoreError::TransactionIdNotFound(id))
}

/// Records the payment method the gateway reported, unless one is already recorded. The first report wins; the
/// descriptor is immutable afterwards.
pub async fn record_payment_method(
    id: i64,
    method: &PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Transaction, PaymentStoreError> {
    let method =
        serde_json::to_string(method).map_err(|e| PaymentStoreError::DatabaseError(e.to_string()))?;
    let result: Option<Transaction> = sqlx::query_as(
        r#"
            UPDATE transactions
            SET payment_method = COALESCE(payment_method, $1), updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(method)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(PaymentStoreError::TransactionIdNotFound(id))
}
