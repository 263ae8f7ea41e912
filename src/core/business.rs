//! Business and location business logic.
//!
//! Businesses and locations only serve as filtering dimensions for expenses and budgets.
//! Names are unique per parent; a clash surfaces as `Conflict`.

use crate::{
    core::session::Actor,
    entities::{Business, Location, Role, business, location},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

fn clean_name(name: &str, field: &'static str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    Ok(name.to_string())
}

/// Inserts a business without permission checks. Used by seeding and
/// [`create_business`].
pub(crate) async fn insert_business<C: ConnectionTrait>(
    conn: &C,
    organization_id: i64,
    name: &str,
    description: Option<String>,
) -> Result<business::Model> {
    let name = clean_name(name, "business name")?;
    let duplicate = Business::find()
        .filter(business::Column::OrganizationId.eq(organization_id))
        .filter(business::Column::Name.eq(name.as_str()))
        .one(conn)
        .await?
        .is_some();
    if duplicate {
        return Err(Error::Conflict {
            message: format!("business '{name}' already exists"),
        });
    }

    business::ActiveModel {
        organization_id: Set(organization_id),
        name: Set(name),
        description: Set(description),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Inserts a location under `business` without permission checks.
pub(crate) async fn insert_location<C: ConnectionTrait>(
    conn: &C,
    business: &business::Model,
    name: &str,
    address: Option<String>,
) -> Result<location::Model> {
    let name = clean_name(name, "location name")?;
    let duplicate = Location::find()
        .filter(location::Column::BusinessId.eq(business.id))
        .filter(location::Column::Name.eq(name.as_str()))
        .one(conn)
        .await?
        .is_some();
    if duplicate {
        return Err(Error::Conflict {
            message: format!("location '{name}' already exists in '{}'", business.name),
        });
    }

    location::ActiveModel {
        business_id: Set(business.id),
        organization_id: Set(business.organization_id),
        name: Set(name),
        address: Set(address),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// Creates a business in the caller's organization.
///
/// # Errors
/// `Forbidden` below `BusinessOwner`, `Validation` for an empty name, `Conflict` for a
/// duplicate name.
pub async fn create_business(
    db: &DatabaseConnection,
    actor: &Actor,
    name: &str,
    description: Option<String>,
) -> Result<business::Model> {
    actor.require_role(Role::BusinessOwner)?;
    let created = insert_business(db, actor.organization_id, name, description).await?;
    info!(business_id = created.id, "Business created");
    Ok(created)
}

/// Looks up a business of the caller's organization.
pub async fn get_business<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    business_id: i64,
) -> Result<business::Model> {
    let business = Business::find_by_id(business_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("business", business_id))?;
    actor.ensure_same_organization(business.organization_id, "business", business_id)?;
    Ok(business)
}

/// Looks up a location of the caller's organization.
pub async fn get_location<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    location_id: i64,
) -> Result<location::Model> {
    let location = Location::find_by_id(location_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("location", location_id))?;
    actor.ensure_same_organization(location.organization_id, "location", location_id)?;
    Ok(location)
}

/// Checks that optional business/location references belong to the caller's organization
/// and, when both are given, that the location belongs to the business.
pub(crate) async fn validate_dimensions<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    business_id: Option<i64>,
    location_id: Option<i64>,
) -> Result<()> {
    if let Some(business_id) = business_id {
        get_business(conn, actor, business_id).await?;
    }
    if let Some(location_id) = location_id {
        let location = get_location(conn, actor, location_id).await?;
        if business_id.is_some_and(|id| id != location.business_id) {
            return Err(Error::validation(
                "location_id",
                "location does not belong to the given business",
            ));
        }
    }
    Ok(())
}

/// Creates a location under one of the caller's businesses.
pub async fn create_location(
    db: &DatabaseConnection,
    actor: &Actor,
    business_id: i64,
    name: &str,
    address: Option<String>,
) -> Result<location::Model> {
    actor.require_role(Role::BusinessOwner)?;
    let business = get_business(db, actor, business_id).await?;
    let created = insert_location(db, &business, name, address).await?;
    info!(location_id = created.id, business_id, "Location created");
    Ok(created)
}

/// Lists the caller's businesses, alphabetically.
pub async fn list_businesses(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<business::Model>> {
    Business::find()
        .filter(business::Column::OrganizationId.eq(actor.organization_id))
        .order_by_asc(business::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the caller's locations, optionally for a single business, alphabetically.
pub async fn list_locations(
    db: &DatabaseConnection,
    actor: &Actor,
    business_id: Option<i64>,
) -> Result<Vec<location::Model>> {
    let mut query =
        Location::find().filter(location::Column::OrganizationId.eq(actor.organization_id));
    if let Some(business_id) = business_id {
        query = query.filter(location::Column::BusinessId.eq(business_id));
    }
    query
        .order_by_asc(location::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
