//! # mercado-db: Persistence for Mercado
//!
//! SQLite storage for quotes, orders, credit accounts and credit requests.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mercado Data Flow                                │
//! │                                                                         │
//! │  mercado-engine (convert_quote, cancel_order, ...)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    mercado-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ OrderRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ QuoteRepo     │    │ 001_initial  │  │   │
//! │  │   │ WriteTx       │    │ CreditRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mercado_db::{Database, DbConfig, OrderRepository};
//!
//! let db = Database::new(DbConfig::new("mercado.db")).await?;
//!
//! // Reads go straight to the pool
//! let order = db.orders().get_by_id(&id).await?;
//!
//! // Writes go through a gated transaction
//! let mut tx = db.begin_write().await?;
//! let mut order = OrderRepository::find(tx.conn(), &id).await?.unwrap();
//! // ... mutate through mercado-core ...
//! OrderRepository::update(tx.conn(), &order).await?;
//! tx.commit().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, WriteTx};

pub use repository::credit::CreditRepository;
pub use repository::order::OrderRepository;
pub use repository::quote::QuoteRepository;
