//! Unit of work: run a piece of business logic inside one database transaction.
//!
//! The closure receives a transaction-scoped handle. The transaction commits when the
//! closure returns `Ok` and rolls back when it returns `Err`, so multi-step writes such as
//! signup or recurring-expense generation either land completely or not at all.

use crate::errors::{Error, Result};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by unit-of-work closures.
pub type WorkFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Runs `work` inside a transaction on `db`.
///
/// # Errors
/// Returns the closure's error (after rolling back), or a database error if the
/// transaction could not be started or committed.
pub async fn run_in_transaction<F, T>(db: &DatabaseConnection, work: F) -> Result<T>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> WorkFuture<'c, T> + Send,
    T: Send,
{
    db.transaction::<_, T, Error>(work)
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => Error::Database(db_err),
            TransactionError::Transaction(err) => err,
        })
}
