//! User administration within an organization.

use crate::{
    core::session::Actor,
    entities::{Role, User, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Lists the users of the caller's organization, alphabetically.
pub async fn list_users(db: &DatabaseConnection, actor: &Actor) -> Result<Vec<user::Model>> {
    User::find()
        .filter(user::Column::OrganizationId.eq(actor.organization_id))
        .order_by_asc(user::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn managed_user(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i64,
) -> Result<user::Model> {
    actor.require_role(Role::OrganizationAdmin)?;
    if user_id == actor.user_id {
        return Err(Error::validation("user_id", "cannot modify your own account"));
    }
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .filter(|u| u.organization_id == Some(actor.organization_id))
        .ok_or_else(|| Error::not_found("user", user_id))?;
    // Nobody may modify an account more privileged than their own
    actor.require_role(user.role)?;
    Ok(user)
}

/// Changes another user's role.
///
/// # Errors
/// `Forbidden` unless the caller can manage users and holds both the target's current
/// role and the new role; `Validation` when targeting oneself.
pub async fn change_role(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i64,
    role: Role,
) -> Result<user::Model> {
    let user = managed_user(db, actor, user_id).await?;
    actor.require_role(role)?;

    let mut active_model: user::ActiveModel = user.into();
    active_model.role = Set(role);
    let updated = active_model.update(db).await?;
    info!(user_id, role = ?role, "User role changed");
    Ok(updated)
}

/// Activates or deactivates another user.
pub async fn set_active(
    db: &DatabaseConnection,
    actor: &Actor,
    user_id: i64,
    is_active: bool,
) -> Result<user::Model> {
    let user = managed_user(db, actor, user_id).await?;

    let mut active_model: user::ActiveModel = user.into();
    active_model.is_active = Set(is_active);
    let updated = active_model.update(db).await?;
    info!(user_id, is_active, "User activation changed");
    Ok(updated)
}
