//! # Credit Repository
//!
//! Credit accounts (one per customer, enforced by a UNIQUE column) and the
//! credit requests that open them.

use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::debug;

use super::{decode, encode};
use crate::error::{DbError, DbResult};
use mercado_core::{CreditAccount, CreditRequest};

#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: SqlitePool,
}

impl CreditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreditRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Pool-level reads
    // -------------------------------------------------------------------------

    pub async fn get_account(&self, id: &str) -> DbResult<Option<CreditAccount>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_account(&mut conn, id).await
    }

    pub async fn get_account_by_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<CreditAccount>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_account_by_customer(&mut conn, customer_id).await
    }

    pub async fn get_request(&self, id: &str) -> DbResult<Option<CreditRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_request(&mut conn, id).await
    }

    pub async fn list_requests_by_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Vec<CreditRequest>> {
        let documents: Vec<String> = sqlx::query_scalar(
            "SELECT document FROM credit_requests WHERE customer_id = ?1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        documents.iter().map(|doc| decode(doc)).collect()
    }

    // -------------------------------------------------------------------------
    // Accounts (transaction-scoped)
    // -------------------------------------------------------------------------

    pub async fn find_account(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<CreditAccount>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM credit_accounts WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn find_account_by_customer(
        conn: &mut SqliteConnection,
        customer_id: &str,
    ) -> DbResult<Option<CreditAccount>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM credit_accounts WHERE customer_id = ?1")
                .bind(customer_id)
                .fetch_optional(&mut *conn)
                .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn insert_account(conn: &mut SqliteConnection, account: &CreditAccount) -> DbResult<()> {
        debug!(id = %account.id(), customer_id = %account.customer_id(), "Inserting credit account");

        sqlx::query(
            r#"
            INSERT INTO credit_accounts (
                id, customer_id, status, approved_limit_cents,
                principal_cents, interest_cents, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(account.id())
        .bind(account.customer_id())
        .bind(account.status())
        .bind(account.approved_limit().cents())
        .bind(account.outstanding_principal().cents())
        .bind(account.accrued_interest().cents())
        .bind(encode(account)?)
        .bind(account.created_at())
        .bind(account.updated_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn update_account(conn: &mut SqliteConnection, account: &CreditAccount) -> DbResult<()> {
        debug!(
            id = %account.id(),
            status = %account.status(),
            principal = account.outstanding_principal().cents(),
            "Updating credit account"
        );

        let result = sqlx::query(
            r#"
            UPDATE credit_accounts
            SET status = ?2,
                principal_cents = ?3,
                interest_cents = ?4,
                document = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(account.id())
        .bind(account.status())
        .bind(account.outstanding_principal().cents())
        .bind(account.accrued_interest().cents())
        .bind(encode(account)?)
        .bind(account.updated_at())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditAccount", account.id()));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Requests (transaction-scoped)
    // -------------------------------------------------------------------------

    pub async fn find_request(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<CreditRequest>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM credit_requests WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        document.as_deref().map(decode).transpose()
    }

    pub async fn insert_request(conn: &mut SqliteConnection, request: &CreditRequest) -> DbResult<()> {
        debug!(id = %request.id(), customer_id = %request.customer_id(), "Inserting credit request");

        sqlx::query(
            r#"
            INSERT INTO credit_requests (
                id, customer_id, status, credit_account_id, document, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(request.id())
        .bind(request.customer_id())
        .bind(request.status())
        .bind(request.credit_account_id())
        .bind(encode(request)?)
        .bind(request.created_at())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn update_request(conn: &mut SqliteConnection, request: &CreditRequest) -> DbResult<()> {
        debug!(id = %request.id(), status = %request.status(), "Updating credit request");

        let result = sqlx::query(
            r#"
            UPDATE credit_requests
            SET status = ?2,
                credit_account_id = ?3,
                document = ?4,
                updated_at = COALESCE(?5, updated_at)
            WHERE id = ?1
            "#,
        )
        .bind(request.id())
        .bind(request.status())
        .bind(request.credit_account_id())
        .bind(encode(request)?)
        .bind(request.decided_at())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditRequest", request.id()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use mercado_core::{CreditAccountStatus, CreditRequestStatus, Money};

    #[tokio::test]
    async fn test_account_roundtrip_and_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut account =
            CreditAccount::open("cust-9", Money::from_major(500_000), Utc::now()).unwrap();

        let mut tx = db.begin_write().await.unwrap();
        CreditRepository::insert_account(tx.conn(), &account).await.unwrap();
        tx.commit().await.unwrap();

        account
            .disburse_for_order(Money::from_major(500_000), Utc::now())
            .unwrap();
        let mut tx = db.begin_write().await.unwrap();
        CreditRepository::update_account(tx.conn(), &account).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = db
            .credit()
            .get_account_by_customer("cust-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status(), CreditAccountStatus::Exhausted);
        assert_eq!(loaded.available_balance(), Money::zero());
        assert_eq!(loaded, account);
    }

    #[tokio::test]
    async fn test_one_account_per_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = CreditAccount::open("cust-1", Money::from_major(10), Utc::now()).unwrap();
        let second = CreditAccount::open("cust-1", Money::from_major(20), Utc::now()).unwrap();

        let mut tx = db.begin_write().await.unwrap();
        CreditRepository::insert_account(tx.conn(), &first).await.unwrap();
        let err = CreditRepository::insert_account(tx.conn(), &second)
            .await
            .unwrap_err();
        assert!(
            matches!(&err, DbError::UniqueViolation { constraint } if constraint == "credit_accounts.customer_id"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_request_approval_persists_link() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut request =
            CreditRequest::submit("cust-5", Money::from_major(300_000), 12, Utc::now()).unwrap();

        let mut tx = db.begin_write().await.unwrap();
        CreditRepository::insert_request(tx.conn(), &request).await.unwrap();
        tx.commit().await.unwrap();

        let account = request
            .approve(Money::from_major(200_000), None, Utc::now())
            .unwrap();
        let mut tx = db.begin_write().await.unwrap();
        CreditRepository::insert_account(tx.conn(), &account).await.unwrap();
        CreditRepository::update_request(tx.conn(), &request).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = db.credit().get_request(request.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), CreditRequestStatus::Approved);
        assert_eq!(loaded.credit_account_id(), Some(account.id()));

        let listed = db.credit().list_requests_by_customer("cust-5").await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
