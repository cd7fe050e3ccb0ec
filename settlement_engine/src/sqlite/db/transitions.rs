use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::{from_json, parse_field};
use crate::{
    db_types::{InvoiceId, StatusTransition},
    traits::RepositoryError,
};

#[derive(Debug, Clone, FromRow)]
struct TransitionRow {
    from_status: String,
    to_status: String,
    trigger_name: String,
    timestamp: DateTime<Utc>,
    reason: String,
    actor: String,
    metadata: Option<String>,
}

impl TryFrom<TransitionRow> for StatusTransition {
    type Error = RepositoryError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let metadata = row.metadata.as_deref().map(|m| from_json("transition metadata", m)).transpose()?;
        Ok(StatusTransition {
            from: parse_field("status", &row.from_status)?,
            to: parse_field("status", &row.to_status)?,
            trigger: parse_field("trigger", &row.trigger_name)?,
            timestamp: row.timestamp,
            reason: row.reason,
            actor: parse_field("actor", &row.actor)?,
            metadata,
        })
    }
}

/// Writes the full transition history for an invoice. `seq` is the position of the entry in the history.
pub async fn insert_transitions(
    invoice_id: &InvoiceId,
    transitions: &[StatusTransition],
    conn: &mut SqliteConnection,
) -> Result<(), RepositoryError> {
    for (seq, t) in transitions.iter().enumerate() {
        let metadata = t.metadata.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"
                INSERT INTO invoice_transitions (
                    invoice_id,
                    seq,
                    from_status,
                    to_status,
                    trigger_name,
                    timestamp,
                    reason,
                    actor,
                    metadata
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
            "#,
        )
        .bind(invoice_id.as_str())
        .bind(seq as i64)
        .bind(t.from.to_string())
        .bind(t.to.to_string())
        .bind(t.trigger.to_string())
        .bind(t.timestamp)
        .bind(&t.reason)
        .bind(t.actor.to_string())
        .bind(metadata)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn fetch_transitions_for_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusTransition>, RepositoryError> {
    let rows: Vec<TransitionRow> = sqlx::query_as(
        r#"
            SELECT from_status, to_status, trigger_name, timestamp, reason, actor, metadata
            FROM invoice_transitions
            WHERE invoice_id = $1
            ORDER BY seq
        "#,
    )
    .bind(invoice_id.as_str())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(StatusTransition::try_from).collect()
}

pub async fn delete_transitions_for_invoice(
    invoice_id: &InvoiceId,
    conn: &mut SqliteConnection,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM invoice_transitions WHERE invoice_id = $1")
        .bind(invoice_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
