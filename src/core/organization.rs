//! Organization business logic - tenant creation, settings and seeding.
//!
//! Creating an organization always mints one invite code per assignable role, so an admin
//! can invite colleagues immediately after signing up.

use crate::{
    config::settings::{InviteSettings, OrganizationSeed},
    core::{
        business::{insert_business, insert_location},
        invite::mint_invite_code,
        role::DEFAULT_INVITE_ROLES,
        session::Actor,
        unit_of_work::run_in_transaction,
    },
    entities::{Business, Organization, Role, invite_code, organization},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use sea_orm::{PaginatorTrait, Set, prelude::*};
use tracing::{info, instrument};

/// Loads an organization by id.
///
/// # Errors
/// `NotFound` if it does not exist.
pub async fn find_organization<C: ConnectionTrait>(
    conn: &C,
    organization_id: i64,
) -> Result<organization::Model> {
    Organization::find_by_id(organization_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))
}

/// Creates an organization and its default invite codes.
///
/// `conn` may be a transaction; signup runs this inside its unit of work.
///
/// # Errors
/// `Validation` for an empty name, or a database error.
pub async fn create_organization<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    invites: &InviteSettings,
) -> Result<(organization::Model, Vec<invite_code::Model>)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("organization name", "cannot be empty"));
    }

    let now = Utc::now();
    let organization = organization::ActiveModel {
        name: Set(name.to_string()),
        invite_code: Set(None),
        settings: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let expires_at = invites
        .default_expiry_days
        .map(|days| now + Duration::days(i64::from(days)));

    let mut codes = Vec::with_capacity(DEFAULT_INVITE_ROLES.len());
    for role in DEFAULT_INVITE_ROLES {
        codes.push(
            mint_invite_code(conn, &organization, role, invites.default_max_uses, expires_at)
                .await?,
        );
    }

    info!(
        organization_id = organization.id,
        invite_codes = codes.len(),
        "Organization created"
    );
    Ok((organization, codes))
}

/// Returns the caller's organization.
pub async fn get_organization(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<organization::Model> {
    find_organization(db, actor.organization_id).await
}

/// Replaces the organization's settings blob.
///
/// # Errors
/// `Forbidden` below `OrganizationAdmin`; `Validation` unless `settings` is a JSON object.
pub async fn update_settings(
    db: &DatabaseConnection,
    actor: &Actor,
    settings: Json,
) -> Result<organization::Model> {
    actor.require_role(Role::OrganizationAdmin)?;
    if !settings.is_object() {
        return Err(Error::validation("settings", "must be a JSON object"));
    }

    let organization = find_organization(db, actor.organization_id).await?;
    let mut active_model: organization::ActiveModel = organization.into();
    active_model.settings = Set(Some(settings));
    active_model.update(db).await.map_err(Into::into)
}

/// Creates the configured organizations that do not exist yet (matched by name), along
/// with their businesses and locations.
///
/// Each organization is seeded in its own transaction: a seed that fails partway leaves
/// nothing behind, while organizations seeded before it stay committed.
///
/// # Arguments
/// * `db` - Database connection
/// * `seeds` - Organizations from the `[[organizations]]` config tables
/// * `invites` - Defaults for the invite codes minted with each new organization
///
/// # Returns
/// How many organizations were created by this call.
///
/// # Errors
/// The first seed error, such as `Conflict` for a duplicate business or location name.
#[instrument(skip_all)]
pub async fn seed_organizations(
    db: &DatabaseConnection,
    seeds: &[OrganizationSeed],
    invites: &InviteSettings,
) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        let exists = Organization::find()
            .filter(organization::Column::Name.eq(seed.name.trim()))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        let seed = seed.clone();
        let invites = *invites;
        run_in_transaction(db, move |txn| {
            Box::pin(async move { seed_organization(txn, &seed, &invites).await })
        })
        .await?;
        created += 1;
    }

    let total = Organization::find().count(db).await?;
    let businesses = Business::find().count(db).await?;
    info!("Seeded {created} organizations ({total} total, {businesses} businesses)");
    Ok(created)
}

async fn seed_organization<C: ConnectionTrait>(
    conn: &C,
    seed: &OrganizationSeed,
    invites: &InviteSettings,
) -> Result<()> {
    let (organization, _) = create_organization(conn, &seed.name, invites).await?;
    if let Some(legacy_code) = seed.invite_code.as_deref().map(str::trim) {
        let mut active_model: organization::ActiveModel = organization.clone().into();
        active_model.invite_code = Set(Some(legacy_code.to_string()));
        active_model.update(conn).await?;
    }

    for business_seed in &seed.businesses {
        let business = insert_business(conn, organization.id, &business_seed.name, None).await?;
        for location_name in &business_seed.locations {
            insert_location(conn, &business, location_name, None).await?;
        }
    }
    Ok(())
}
