use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::{parse_field, parse_money, u32_field};
use crate::{
    db_types::{InvoiceId, Payment, PaymentId},
    traits::RepositoryError,
};

#[derive(Debug, Clone, FromRow)]
struct PaymentRow {
    id: String,
    invoice_id: String,
    tx_hash: String,
    amount: String,
    currency: String,
    from_address: String,
    to_address: String,
    status: String,
    confirmations: i64,
    required_confirmations: i64,
    detected_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = parse_field("payment currency", &row.currency)?;
        Ok(Payment {
            id: PaymentId::from(row.id),
            invoice_id: InvoiceId::from(row.invoice_id),
            amount: parse_money("payment amount", &row.amount, currency)?,
            tx_hash: row.tx_hash,
            from_address: row.from_address,
            to_address: row.to_address,
            status: parse_field("payment status", &row.status)?,
            confirmations: u32_field("confirmations", row.confirmations)?,
            required_confirmations: u32_field("required confirmations", row.required_confirmations)?,
            detected_at: row.detected_at,
            updated_at: row.updated_at,
            confirmed_at: row.confirmed_at,
        })
    }
}

pub async fn insert_payment(payment: &Payment, conn: &mut SqliteConnection) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
            INSERT INTO payments (
                id,
                invoice_id,
                tx_hash,
                amount,
                currency,
                from_address,
                to_address,
                status,
                confirmations,
                required_confirmations,
                detected_at,
                updated_at,
                confirmed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13);
        "#,
    )
    .bind(payment.id.as_str())
    .bind(payment.invoice_id.as_str())
    .bind(&payment.tx_hash)
    .bind(payment.amount.amount().to_string())
    .bind(payment.amount.currency().to_string())
    .bind(&payment.from_address)
    .bind(&payment.to_address)
    .bind(payment.status().to_string())
    .bind(i64::from(payment.confirmations()))
    .bind(i64::from(payment.required_confirmations))
    .bind(payment.detected_at)
    .bind(payment.updated_at())
    .bind(payment.confirmed_at())
    .execute(conn)
    .await?;
    Ok(())
}

/// Payments for the invoice, in the order they were detected.
pub async fn fetch_payments_for_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, RepositoryError> {
    let rows: Vec<PaymentRow> = sqlx::query_as("SELECT * FROM payments WHERE invoice_id = $1 ORDER BY rowid")
        .bind(invoice_id.as_str())
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(Payment::try_from).collect()
}

pub async fn delete_payments_for_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM payments WHERE invoice_id = $1").bind(invoice_id.as_str()).execute(conn).await?;
    Ok(result.rows_affected())
}
