//! Database configuration module for `ExpenseBuddy`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs. Composite uniqueness rules that
//! cannot be expressed on a single column are added as explicit indexes.

use crate::entities::{
    Budget, Business, Expense, InviteCode, Location, Organization, RecurringExpense, User,
    business, location,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/expense_buddy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to
/// a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the parent directory of a file-backed `SQLite` URL, if any.
fn ensure_sqlite_directory(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    ensure_sqlite_directory(&database_url)?;
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

fn table_for<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    stmt
}

fn composite_unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_businesses_org_name")
            .table(Business)
            .col(business::Column::OrganizationId)
            .col(business::Column::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_locations_business_name")
            .table(Location)
            .col(location::Column::BusinessId)
            .col(location::Column::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all tables (if they do not exist yet) from the entity definitions.
///
/// Parents are created before children so foreign keys resolve.
pub async fn create_tables<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        table_for(&schema, Organization),
        table_for(&schema, User),
        table_for(&schema, InviteCode),
        table_for(&schema, Business),
        table_for(&schema, Location),
        table_for(&schema, RecurringExpense),
        table_for(&schema, Expense),
        table_for(&schema, Budget),
    ];

    for table in &tables {
        db.execute(builder.build(table)).await?;
    }
    for index in &composite_unique_indexes() {
        db.execute(builder.build(index)).await?;
    }

    info!("Database tables ensured ({} tables)", tables.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        BudgetModel, ExpenseModel, InviteCodeModel, OrganizationModel, RecurringExpenseModel,
        UserModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<OrganizationModel> = Organization::find().limit(1).all(&db).await?;
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<InviteCodeModel> = InviteCode::find().limit(1).all(&db).await?;
        let _: Vec<ExpenseModel> = Expense::find().limit(1).all(&db).await?;
        let _: Vec<BudgetModel> = Budget::find().limit(1).all(&db).await?;
        let _: Vec<RecurringExpenseModel> = RecurringExpense::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
