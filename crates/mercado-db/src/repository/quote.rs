//! # Quote Repository
//!
//! Quotes are looked up either by id or by their access token; callers do
//! not need to know which one they hold.

use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::{decode, encode};
use crate::error::{DbError, DbResult};
use mercado_core::Quote;

#[derive(Debug, Clone)]
pub struct QuoteRepository {
    pool: SqlitePool,
}

impl QuoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        QuoteRepository { pool }
    }

    /// Snapshot read. Status is derived by the caller from the clock.
    pub async fn get(&self, id_or_token: &str) -> DbResult<Option<Quote>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id_or_token).await
    }

    pub async fn list_by_customer(&self, customer_id: &str) -> DbResult<Vec<Quote>> {
        let documents: Vec<String> = sqlx::query_scalar(
            "SELECT document FROM quotes WHERE customer_id = ?1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        documents.iter().map(|doc| decode(doc)).collect()
    }

    pub async fn find(conn: &mut SqliteConnection, id_or_token: &str) -> DbResult<Option<Quote>> {
        let document: Option<String> = sqlx::query_scalar(
            "SELECT document FROM quotes WHERE id = ?1 OR access_token = ?1",
        )
        .bind(id_or_token)
        .fetch_optional(&mut *conn)
        .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, quote: &Quote) -> DbResult<()> {
        debug!(id = %quote.id(), "Inserting quote");

        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, access_token, customer_id, total_cents, expires_at,
                converted_order_id, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(quote.id())
        .bind(quote.access_token())
        .bind(quote.holder().customer_id())
        .bind(quote.totals().total.cents())
        .bind(quote.expires_at())
        .bind(quote.converted_order_id())
        .bind(encode(quote)?)
        .bind(quote.created_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Persists the conversion link. The document is rewritten whole.
    pub async fn update(conn: &mut SqliteConnection, quote: &Quote) -> DbResult<()> {
        debug!(id = %quote.id(), converted_order_id = ?quote.converted_order_id(), "Updating quote");

        let result = sqlx::query(
            r#"
            UPDATE quotes
            SET converted_order_id = ?2,
                document = ?3,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?1
            "#,
        )
        .bind(quote.id())
        .bind(quote.converted_order_id())
        .bind(encode(quote)?)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quote", quote.id()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use mercado_core::{Holder, LineItemInput, QuoteStatus};

    fn quote() -> Quote {
        Quote::create(
            Holder::Customer {
                customer_id: "cust-42".to_string(),
            },
            &[LineItemInput {
                product_ref: "LLA-1".to_string(),
                name: "Llave inglesa".to_string(),
                quantity: 1,
                unit_price_cents: 25_000_00,
            }],
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_by_id_or_token() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let quote = quote();

        let mut tx = db.begin_write().await.unwrap();
        QuoteRepository::insert(tx.conn(), &quote).await.unwrap();
        tx.commit().await.unwrap();

        let by_id = db.quotes().get(quote.id()).await.unwrap().unwrap();
        let by_token = db.quotes().get(quote.access_token()).await.unwrap().unwrap();
        assert_eq!(by_id, quote);
        assert_eq!(by_token, quote);
        assert!(db.quotes().get("unknown").await.unwrap().is_none());

        let listed = db.quotes().list_by_customer("cust-42").await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_update_marks_converted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut quote = quote();

        let mut tx = db.begin_write().await.unwrap();
        QuoteRepository::insert(tx.conn(), &quote).await.unwrap();
        tx.commit().await.unwrap();

        let order = quote
            .convert(mercado_core::Delivery::StorePickup, Utc::now())
            .unwrap();

        let mut tx = db.begin_write().await.unwrap();
        crate::OrderRepository::insert(tx.conn(), &order).await.unwrap();
        QuoteRepository::update(tx.conn(), &quote).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = db.quotes().get(quote.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(Utc::now()), QuoteStatus::Converted);
        assert_eq!(loaded.converted_order_id(), Some(order.id()));
    }

    #[tokio::test]
    async fn test_second_order_for_quote_violates_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut first = quote();

        let mut tx = db.begin_write().await.unwrap();
        QuoteRepository::insert(tx.conn(), &first).await.unwrap();
        tx.commit().await.unwrap();

        // Two conversions from the same stale snapshot.
        let mut second = first.clone();
        let order_a = first
            .convert(mercado_core::Delivery::StorePickup, Utc::now())
            .unwrap();
        let order_b = second
            .convert(mercado_core::Delivery::StorePickup, Utc::now())
            .unwrap();

        let mut tx = db.begin_write().await.unwrap();
        crate::OrderRepository::insert(tx.conn(), &order_a).await.unwrap();
        let err = crate::OrderRepository::insert(tx.conn(), &order_b)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, DbError::UniqueViolation { constraint } if constraint == "orders.quote_id"),
            "unexpected error: {err}"
        );
    }
}
