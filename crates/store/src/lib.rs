//! Persistence for the bookstore checkout service.
//!
//! Every read and write happens through a [`UnitOfWork`] obtained from
//! [`Store::begin`]. A unit is committed explicitly; dropping it without a
//! commit discards its writes.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStore};
pub use postgres::PostgresStore;
pub use store::{Store, UnitOfWork};
