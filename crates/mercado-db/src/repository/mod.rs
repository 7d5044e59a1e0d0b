//! # Repository Module
//!
//! ## Two ways in
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-level reads            Transaction-scoped access                 │
//! │  ─────────────────           ─────────────────────────                 │
//! │  db.orders().get_by_id(id)   OrderRepository::find(tx.conn(), id)      │
//! │  db.quotes().get(token)      OrderRepository::update(tx.conn(), &o)    │
//! │  db.credit().get_account(id) CreditRepository::update_account(..)      │
//! │                                                                         │
//! │  Snapshot for display        Read-modify-write under the write gate    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aggregates are stored as JSON documents next to the columns needed for
//! lookups and constraints. Projected columns are rewritten on every save.
//!
//! - [`order::OrderRepository`] - Orders and their status history
//! - [`quote::QuoteRepository`] - Quotes by id or access token
//! - [`credit::CreditRepository`] - Credit accounts and credit requests

pub mod credit;
pub mod order;
pub mod quote;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DbResult;

pub(crate) fn encode<T: Serialize>(value: &T) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(document: &str) -> DbResult<T> {
    Ok(serde_json::from_str(document)?)
}
