//! Shared test utilities for `ExpenseBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::expect_used)]

use crate::{
    config::settings::InviteSettings,
    core::{
        invite::mint_invite_code,
        organization::{create_organization, find_organization},
        session::{Actor, hash_password},
    },
    entities::{
        ApprovalStatus, Frequency, Location, Role, expense, invite_code, organization,
        recurring_expense, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::{
    LazyLock,
    atomic::{AtomicUsize, Ordering},
};

/// Password of every user created by [`create_test_actor`].
pub const TEST_PASSWORD: &str = "correct horse battery staple";

// Hashing is slow; every test user shares one hash.
static TEST_PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(TEST_PASSWORD).expect("hashing the test password"));

static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Installs a tracing subscriber that writes through the test harness.
/// Safe to call from several tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an organization (with its default invite codes) using default invite settings.
pub async fn create_test_organization(
    db: &DatabaseConnection,
    name: &str,
) -> Result<organization::Model> {
    let (organization, _) = create_organization(db, name, &InviteSettings::default()).await?;
    Ok(organization)
}

/// Fresh database with one organization named "Acme".
pub async fn setup_with_organization() -> Result<(DatabaseConnection, organization::Model)> {
    init_test_tracing();
    let db = setup_test_db().await?;
    let organization = create_test_organization(&db, "Acme").await?;
    Ok((db, organization))
}

/// Inserts an active user with `role` in the organization and returns it as an actor.
///
/// # Defaults
/// * email: unique, lowercase, `@example.com`
/// * password: [`TEST_PASSWORD`]
pub async fn create_test_actor(
    db: &DatabaseConnection,
    organization_id: i64,
    role: Role,
) -> Result<Actor> {
    let n = USER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let user = user::ActiveModel {
        name: Set(format!("Test User {n}")),
        email: Set(format!("{role:?}-{n}@example.com").to_lowercase()),
        password_hash: Set(TEST_PASSWORD_HASH.clone()),
        organization_id: Set(Some(organization_id)),
        role: Set(role),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(Actor {
        user_id: user.id,
        organization_id,
        role,
    })
}

/// Inserts an invite code with custom limits, bypassing permission checks.
pub async fn create_custom_invite_code(
    db: &DatabaseConnection,
    organization_id: i64,
    role: Role,
    max_uses: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<invite_code::Model> {
    let organization = find_organization(db, organization_id).await?;
    mint_invite_code(db, &organization, role, max_uses, expires_at).await
}

/// Inserts a pending expense for `actor`.
///
/// # Defaults
/// * no tags, business, location or description
/// * not tax-deductible
pub async fn insert_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    amount: f64,
    category: &str,
    vendor: Option<&str>,
    date: DateTime<Utc>,
) -> Result<expense::Model> {
    expense_model(actor, amount, category, vendor, date)
        .insert(db)
        .await
        .map_err(Into::into)
}

/// Inserts a pending "Supplies" expense booked at an existing location.
pub async fn insert_located_expense(
    db: &DatabaseConnection,
    actor: &Actor,
    amount: f64,
    location_id: i64,
    date: DateTime<Utc>,
) -> Result<expense::Model> {
    let location = Location::find_by_id(location_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("location", location_id))?;
    let mut model = expense_model(actor, amount, "Supplies", None, date);
    model.business_id = Set(Some(location.business_id));
    model.location_id = Set(Some(location.id));
    model.insert(db).await.map_err(Into::into)
}

fn expense_model(
    actor: &Actor,
    amount: f64,
    category: &str,
    vendor: Option<&str>,
    date: DateTime<Utc>,
) -> expense::ActiveModel {
    expense::ActiveModel {
        organization_id: Set(actor.organization_id),
        user_id: Set(actor.user_id),
        amount: Set(amount),
        category: Set(category.to_string()),
        categories: Set(serde_json::json!([])),
        description: Set(None),
        date: Set(date),
        vendor: Set(vendor.map(str::to_string)),
        business_id: Set(None),
        location_id: Set(None),
        recurring_expense_id: Set(None),
        approval_status: Set(ApprovalStatus::Pending),
        tax_deductible: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}

/// Inserts an active, manual recurring expense owned by `actor` that falls due at
/// `next_due_date`.
///
/// # Defaults
/// * amount: 250.0, category "Software", vendor "GitHub"
/// * start date equal to the due date, no end date, no day pins
pub async fn create_test_recurring(
    db: &DatabaseConnection,
    actor: &Actor,
    frequency: Frequency,
    next_due_date: DateTime<Utc>,
) -> Result<recurring_expense::Model> {
    let now = Utc::now();
    recurring_expense::ActiveModel {
        organization_id: Set(actor.organization_id),
        user_id: Set(actor.user_id),
        amount: Set(250.0),
        category: Set("Software".to_string()),
        categories: Set(serde_json::json!(["subscriptions"])),
        description: Set(Some("Team plan".to_string())),
        vendor: Set(Some("GitHub".to_string())),
        tax_deductible: Set(true),
        business_id: Set(None),
        location_id: Set(None),
        frequency: Set(frequency),
        start_date: Set(next_due_date),
        end_date: Set(None),
        next_due_date: Set(next_due_date),
        day_of_month: Set(None),
        day_of_week: Set(None),
        auto_create: Set(false),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
