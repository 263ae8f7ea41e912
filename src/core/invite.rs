//! Invite code business logic - minting, administering and consuming invite codes.
//!
//! Codes are minted in the structured format from [`crate::core::role`]. Consumption is a
//! single conditional `UPDATE` so two signups racing for the last use of a code cannot
//! both succeed.

use crate::{
    core::{role::generate_invite_code, session::Actor},
    entities::{InviteCode, Role, invite_code, organization},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info};

const MAX_MINT_ATTEMPTS: usize = 5;

/// Parameters for an admin-created invite code.
#[derive(Debug, Clone)]
pub struct NewInviteCode {
    /// Role granted by the code
    pub role: Role,
    /// Maximum number of signups, unlimited when None
    pub max_uses: Option<i32>,
    /// Expiry instant, never when None
    pub expires_at: Option<DateTime<Utc>>,
}

/// Inserts a freshly generated code for `role`, regenerating the random suffix on the
/// rare collision with an existing code.
pub(crate) async fn mint_invite_code<C: ConnectionTrait>(
    conn: &C,
    organization: &organization::Model,
    role: Role,
    max_uses: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<invite_code::Model> {
    for _ in 0..MAX_MINT_ATTEMPTS {
        let code = generate_invite_code(&organization.name, role);
        let taken = InviteCode::find()
            .filter(invite_code::Column::Code.eq(code.as_str()))
            .one(conn)
            .await?
            .is_some();
        if taken {
            debug!("Invite code collision on {code}, regenerating");
            continue;
        }

        let model = invite_code::ActiveModel {
            code: Set(code),
            role: Set(role),
            max_uses: Set(max_uses),
            expires_at: Set(expires_at),
            used_count: Set(0),
            is_active: Set(true),
            organization_id: Set(organization.id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        return model.insert(conn).await.map_err(Into::into);
    }

    Err(Error::Conflict {
        message: format!(
            "could not mint a unique {role:?} invite code for organization {}",
            organization.id
        ),
    })
}

/// Creates an invite code in the caller's organization.
///
/// # Arguments
/// * `db` - Database connection
/// * `actor` - The caller; must be an `OrganizationAdmin` at or above `new_code.role`
/// * `new_code` - Role granted by the code, with optional use limit and expiry
///
/// # Returns
/// The stored code, active and unused
///
/// # Errors
/// - `Forbidden` unless the caller can manage users, or when `role` is above the caller's own
/// - `Validation` when `max_uses` is below 1 or `expires_at` is in the past
pub async fn create_invite_code(
    db: &DatabaseConnection,
    actor: &Actor,
    new_code: NewInviteCode,
) -> Result<invite_code::Model> {
    actor.require_role(Role::OrganizationAdmin)?;
    actor.require_role(new_code.role)?;

    if new_code.max_uses.is_some_and(|max| max < 1) {
        return Err(Error::validation("max_uses", "must be at least 1"));
    }
    if new_code.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(Error::validation("expires_at", "must be in the future"));
    }

    let organization = crate::core::organization::find_organization(db, actor.organization_id)
        .await?;
    let created = mint_invite_code(
        db,
        &organization,
        new_code.role,
        new_code.max_uses,
        new_code.expires_at,
    )
    .await?;

    info!(
        organization_id = actor.organization_id,
        role = ?created.role,
        "Invite code created"
    );
    Ok(created)
}

/// Lists every invite code of the caller's organization, newest first.
pub async fn list_invite_codes(
    db: &DatabaseConnection,
    actor: &Actor,
) -> Result<Vec<invite_code::Model>> {
    actor.require_role(Role::OrganizationAdmin)?;
    InviteCode::find()
        .filter(invite_code::Column::OrganizationId.eq(actor.organization_id))
        .order_by_desc(invite_code::Column::CreatedAt)
        .order_by_desc(invite_code::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deactivates an invite code so it can no longer be used to sign up.
pub async fn deactivate_invite_code(
    db: &DatabaseConnection,
    actor: &Actor,
    invite_code_id: i64,
) -> Result<invite_code::Model> {
    actor.require_role(Role::OrganizationAdmin)?;
    let code = InviteCode::find_by_id(invite_code_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("invite code", invite_code_id))?;
    actor.ensure_same_organization(code.organization_id, "invite code", invite_code_id)?;

    let mut active_model: invite_code::ActiveModel = code.into();
    active_model.is_active = Set(false);
    let updated = active_model.update(db).await?;
    info!(invite_code_id, "Invite code deactivated");
    Ok(updated)
}

/// Finds an active invite code by exact match.
pub(crate) async fn find_active_code<C: ConnectionTrait>(
    conn: &C,
    code: &str,
) -> Result<Option<invite_code::Model>> {
    InviteCode::find()
        .filter(invite_code::Column::Code.eq(code))
        .filter(invite_code::Column::IsActive.eq(true))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Checks expiry and usage limits of a code at `now`.
pub fn check_usable(code: &invite_code::Model, now: DateTime<Utc>) -> Result<()> {
    if code.expires_at.is_some_and(|expires_at| expires_at < now) {
        return Err(Error::InviteExpired {
            code: code.code.clone(),
        });
    }
    if code.max_uses.is_some_and(|max| code.used_count >= max) {
        return Err(Error::MaxUsesReached {
            code: code.code.clone(),
        });
    }
    Ok(())
}

/// Records one use of `code`.
///
/// The increment is conditional on the code still being active and below its limit, so
/// when several transactions race for the last use exactly one of them wins; the others
/// get `MaxUsesReached`.
pub(crate) async fn consume_invite_code<C: ConnectionTrait>(
    conn: &C,
    code: &invite_code::Model,
) -> Result<()> {
    let below_limit = Condition::any()
        .add(invite_code::Column::MaxUses.is_null())
        .add(
            Expr::col(invite_code::Column::UsedCount)
                .lt(Expr::col(invite_code::Column::MaxUses)),
        );

    let result = InviteCode::update_many()
        .col_expr(
            invite_code::Column::UsedCount,
            Expr::col(invite_code::Column::UsedCount).add(1),
        )
        .filter(invite_code::Column::Id.eq(code.id))
        .filter(invite_code::Column::IsActive.eq(true))
        .filter(below_limit)
        .exec(conn)
        .await?;

    if result.rows_affected == 1 {
        Ok(())
    } else {
        Err(Error::MaxUsesReached {
            code: code.code.clone(),
        })
    }
}
