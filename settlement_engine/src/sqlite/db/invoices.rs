use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use super::{from_json, parse_field, parse_money, payments, transitions};
use crate::{
    db_types::{Invoice, InvoiceId, InvoiceStatusType, Payment, StatusTransition},
    settlement_api::{
        exchange_objects::ExchangeRate,
        invoice_objects::{InvoiceExpiration, InvoiceItem, InvoicePricing},
        payment_objects::{PaymentAddress, PaymentTolerance},
    },
    traits::RepositoryError,
};

#[derive(Debug, Clone, FromRow)]
struct InvoiceRow {
    id: String,
    merchant_id: String,
    title: String,
    description: String,
    items: String,
    currency: String,
    subtotal: String,
    tax: String,
    total: String,
    crypto_currency: String,
    address_details: String,
    exchange_rate: String,
    payment_tolerance: String,
    expires_at: DateTime<Utc>,
    expiry_duration: i64,
    created_at: DateTime<Utc>,
    customer_id: Option<String>,
    metadata: String,
    status: String,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    viewed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl InvoiceRow {
    /// Rebuilds the aggregate from the row and its child records.
    fn into_invoice(self, payments: Vec<Payment>, history: Vec<StatusTransition>) -> Result<Invoice, RepositoryError> {
        let currency = parse_field("currency", &self.currency)?;
        let subtotal = parse_money("subtotal", &self.subtotal, currency)?;
        let tax = parse_money("tax", &self.tax, currency)?;
        let total = parse_money("total", &self.total, currency)?;
        let pricing = InvoicePricing::new(subtotal, tax, total)
            .map_err(|e| RepositoryError::CorruptRecord(format!("Invoice {} pricing: {e}", self.id)))?;
        let items: Vec<InvoiceItem> = from_json("items", &self.items)?;
        let payment_address: PaymentAddress = from_json("payment address", &self.address_details)?;
        let exchange_rate: ExchangeRate = from_json("exchange rate", &self.exchange_rate)?;
        let payment_tolerance: PaymentTolerance = from_json("payment tolerance", &self.payment_tolerance)?;
        let metadata: BTreeMap<String, String> = from_json("metadata", &self.metadata)?;
        Ok(Invoice {
            id: InvoiceId::from(self.id),
            merchant_id: self.merchant_id,
            title: self.title,
            description: self.description,
            items,
            pricing,
            crypto_currency: parse_field("crypto currency", &self.crypto_currency)?,
            payment_address,
            exchange_rate,
            payment_tolerance,
            expiration: InvoiceExpiration::from_parts(self.expires_at, self.expiry_duration),
            created_at: self.created_at,
            customer_id: self.customer_id,
            metadata,
            status: parse_field("invoice status", &self.status)?,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            viewed_at: self.viewed_at,
            payments,
            transitions: history,
            version: self.version,
        })
    }
}

/// Inserts the invoice row, its payments, and its transition history. This is not atomic. Embed the call in a
/// transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_invoice(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
            INSERT INTO invoices (
                id,
                merchant_id,
                title,
                description,
                items,
                currency,
                subtotal,
                tax,
                total,
                crypto_currency,
                payment_address,
                address_details,
                exchange_rate,
                payment_tolerance,
                expires_at,
                expiry_duration,
                created_at,
                customer_id,
                metadata,
                status,
                updated_at,
                paid_at,
                viewed_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21,
                      $22, $23, $24);
        "#,
    )
    .bind(invoice.id.as_str())
    .bind(&invoice.merchant_id)
    .bind(&invoice.title)
    .bind(&invoice.description)
    .bind(serde_json::to_string(&invoice.items)?)
    .bind(invoice.pricing.currency().to_string())
    .bind(invoice.pricing.subtotal.amount().to_string())
    .bind(invoice.pricing.tax.amount().to_string())
    .bind(invoice.pricing.total.amount().to_string())
    .bind(invoice.crypto_currency.to_string())
    .bind(&invoice.payment_address.address)
    .bind(serde_json::to_string(&invoice.payment_address)?)
    .bind(serde_json::to_string(&invoice.exchange_rate)?)
    .bind(serde_json::to_string(&invoice.payment_tolerance)?)
    .bind(invoice.expiration().expires_at())
    .bind(invoice.expiration().duration().num_seconds())
    .bind(invoice.created_at)
    .bind(&invoice.customer_id)
    .bind(serde_json::to_string(&invoice.metadata)?)
    .bind(invoice.status().to_string())
    .bind(invoice.updated_at())
    .bind(invoice.paid_at())
    .bind(invoice.viewed_at())
    .bind(invoice.version())
    .execute(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            RepositoryError::InvoiceAlreadyExists(invoice.id.clone())
        },
        _ => RepositoryError::from(e),
    })?;
    insert_children(invoice, conn).await?;
    trace!("🗃️ Invoice {} inserted", invoice.id);
    Ok(())
}

async fn insert_children(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<(), RepositoryError> {
    for payment in invoice.payments() {
        payments::insert_payment(payment, &mut *conn).await?;
    }
    transitions::insert_transitions(&invoice.id, invoice.transitions(), conn).await
}

/// Returns the stored version of the invoice, or `None` if it does not exist.
pub async fn fetch_version(id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Option<i64>, RepositoryError> {
    let version: Option<(i64,)> =
        sqlx::query_as("SELECT version FROM invoices WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(version.map(|(v,)| v))
}

/// Overwrites the mutable columns of the invoice and replaces its payments and history, provided the stored version
/// is still `invoice.version()`. Returns the new version.
///
/// This is not atomic. Embed the call in a transaction.
pub async fn update_invoice(invoice: &Invoice, conn: &mut SqliteConnection) -> Result<i64, RepositoryError> {
    let expected = invoice.version();
    let found = fetch_version(&invoice.id, &mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::InvoiceNotFound(invoice.id.clone()))?;
    if found != expected {
        return Err(RepositoryError::VersionConflict { id: invoice.id.clone(), expected, found });
    }
    let result = sqlx::query(
        r#"
            UPDATE invoices SET
                expires_at = $1,
                expiry_duration = $2,
                customer_id = $3,
                metadata = $4,
                status = $5,
                updated_at = $6,
                paid_at = $7,
                viewed_at = $8,
                version = version + 1
            WHERE id = $9 AND version = $10;
        "#,
    )
    .bind(invoice.expiration().expires_at())
    .bind(invoice.expiration().duration().num_seconds())
    .bind(&invoice.customer_id)
    .bind(serde_json::to_string(&invoice.metadata)?)
    .bind(invoice.status().to_string())
    .bind(invoice.updated_at())
    .bind(invoice.paid_at())
    .bind(invoice.viewed_at())
    .bind(invoice.id.as_str())
    .bind(expected)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        let found = fetch_version(&invoice.id, &mut *conn).await?.unwrap_or(expected);
        return Err(RepositoryError::VersionConflict { id: invoice.id.clone(), expected, found });
    }
    payments::delete_payments_for_invoice(&invoice.id, &mut *conn).await?;
    transitions::delete_transitions_for_invoice(&invoice.id, &mut *conn).await?;
    insert_children(invoice, conn).await?;
    Ok(expected + 1)
}

async fn load(row: InvoiceRow, conn: &mut SqliteConnection) -> Result<Invoice, RepositoryError> {
    let id = InvoiceId::from(row.id.as_str());
    let payments = payments::fetch_payments_for_invoice(&id, &mut *conn).await?;
    let history = transitions::fetch_transitions_for_invoice(&id, conn).await?;
    row.into_invoice(payments, history)
}

async fn load_all(rows: Vec<InvoiceRow>, conn: &mut SqliteConnection) -> Result<Vec<Invoice>, RepositoryError> {
    let mut invoices = Vec::with_capacity(rows.len());
    for row in rows {
        invoices.push(load(row, &mut *conn).await?);
    }
    Ok(invoices)
}

pub async fn fetch_invoice(id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Option<Invoice>, RepositoryError> {
    let row: Option<InvoiceRow> =
        sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(id.as_str()).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(load(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_invoice_by_address(
    address: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, RepositoryError> {
    let row: Option<InvoiceRow> = sqlx::query_as("SELECT * FROM invoices WHERE payment_address = $1")
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(load(row, conn).await?)),
        None => Ok(None),
    }
}

/// Fetches all invoices with any of the given statuses, oldest first.
pub async fn fetch_invoices_with_status(
    statuses: &[InvoiceStatusType],
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, RepositoryError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM invoices WHERE status IN (");
    let mut list = builder.separated(", ");
    for status in statuses {
        list.push_bind(status.to_string());
    }
    list.push_unseparated(") ORDER BY created_at, id");
    let rows: Vec<InvoiceRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    load_all(rows, conn).await
}

pub async fn delete_invoice(id: &InvoiceId, conn: &mut SqliteConnection) -> Result<bool, RepositoryError> {
    payments::delete_payments_for_invoice(id, &mut *conn).await?;
    transitions::delete_transitions_for_invoice(id, &mut *conn).await?;
    let result = sqlx::query("DELETE FROM invoices WHERE id = $1").bind(id.as_str()).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
