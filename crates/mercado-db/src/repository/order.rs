//! # Order Repository
//!
//! Orders plus their append-only status history.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::{decode, encode};
use crate::error::{DbError, DbResult};
use mercado_core::{Order, OrderStatus, StatusChange};

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    order_id: String,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    reason: Option<String>,
    changed_at: DateTime<Utc>,
}

impl From<HistoryRow> for StatusChange {
    fn from(row: HistoryRow) -> Self {
        StatusChange {
            order_id: row.order_id,
            from: row.from_status,
            to: row.to_status,
            reason: row.reason,
            at: row.changed_at,
        }
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Pool-level reads
    // -------------------------------------------------------------------------

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn get_by_quote(&self, quote_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_quote(&mut conn, quote_id).await
    }

    /// Status history, oldest first.
    pub async fn history(&self, order_id: &str) -> DbResult<Vec<StatusChange>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT order_id, from_status, to_status, reason, changed_at
            FROM order_status_history
            WHERE order_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StatusChange::from).collect())
    }

    /// Ids of orders in `status`, oldest first.
    pub async fn list_ids_by_status(&self, status: OrderStatus, limit: u32) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM orders
            WHERE status = ?1
            ORDER BY created_at ASC
            LIMIT ?2
            "#,
        )
        .bind(status)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Order>> {
        let documents: Vec<String> = sqlx::query_scalar(
            "SELECT document FROM orders WHERE customer_id = ?1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        documents.iter().map(|doc| decode(doc)).collect()
    }

    // -------------------------------------------------------------------------
    // Transaction-scoped access
    // -------------------------------------------------------------------------

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn find_by_quote(
        conn: &mut SqliteConnection,
        quote_id: &str,
    ) -> DbResult<Option<Order>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM orders WHERE quote_id = ?1")
                .bind(quote_id)
                .fetch_optional(&mut *conn)
                .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id(), status = %order.status(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, quote_id, status, delivery_method,
                total_cents, credit_account_id, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(order.id())
        .bind(order.holder().customer_id())
        .bind(order.quote_id())
        .bind(order.status())
        .bind(order.delivery_method())
        .bind(order.total().cents())
        .bind(order.credit_account_id())
        .bind(encode(order)?)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn update(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id(), status = %order.status(), "Updating order");

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2,
                credit_account_id = ?3,
                document = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(order.id())
        .bind(order.status())
        .bind(order.credit_account_id())
        .bind(encode(order)?)
        .bind(order.updated_at())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order.id()));
        }
        Ok(())
    }

    pub async fn append_history(conn: &mut SqliteConnection, change: &StatusChange) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_status_history (order_id, from_status, to_status, reason, changed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&change.order_id)
        .bind(change.from)
        .bind(change.to)
        .bind(&change.reason)
        .bind(change.at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
