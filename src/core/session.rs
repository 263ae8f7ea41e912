//! Caller identity and authorization.
//!
//! The session layer hands us a user id; [`authenticate`] turns it into an [`Actor`]
//! carrying the organization and role every other service scopes its queries by.

use crate::{
    entities::{Role, User, user},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use sea_orm::{Set, prelude::*};
use tracing::{debug, info, warn};

/// The authenticated caller of a service function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Calling user
    pub user_id: i64,
    /// Organization every query is scoped to
    pub organization_id: i64,
    /// Caller's permission level
    pub role: Role,
}

impl Actor {
    /// Actor for maintenance jobs run by the binary against one organization. It is not
    /// backed by a user row.
    #[must_use]
    pub const fn system(organization_id: i64) -> Self {
        Self {
            user_id: 0,
            organization_id,
            role: Role::SuperAdmin,
        }
    }

    /// Fails with `Forbidden` unless the caller holds at least `required`.
    pub const fn require_role(&self, required: Role) -> Result<()> {
        if self.role.has_role(required) {
            Ok(())
        } else {
            Err(Error::Forbidden {
                required,
                actual: self.role,
            })
        }
    }

    /// Fails with `NotFound` when `organization_id` is another tenant's, so foreign ids
    /// are indistinguishable from missing ones.
    pub fn ensure_same_organization(
        &self,
        organization_id: i64,
        entity: &'static str,
        id: i64,
    ) -> Result<()> {
        if self.organization_id == organization_id {
            Ok(())
        } else {
            Err(Error::not_found(entity, id))
        }
    }
}

fn unauthorized(reason: &str) -> Error {
    Error::Unauthorized {
        reason: reason.to_string(),
    }
}

fn actor_for(user: &user::Model) -> Result<Actor> {
    if !user.is_active {
        return Err(unauthorized("user is inactive"));
    }
    let organization_id = user
        .organization_id
        .ok_or_else(|| unauthorized("user has no organization"))?;
    Ok(Actor {
        user_id: user.id,
        organization_id,
        role: user.role,
    })
}

/// Resolves the session's user id into an [`Actor`].
///
/// # Errors
/// `Unauthorized` when there is no session, the user does not exist, is inactive or has
/// not completed onboarding.
pub async fn authenticate<C: ConnectionTrait>(db: &C, user_id: Option<i64>) -> Result<Actor> {
    let user_id = user_id.ok_or_else(|| unauthorized("no session"))?;
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| unauthorized("unknown user"))?;
    actor_for(&user)
}

/// Verifies credentials and records the login time.
///
/// # Errors
/// `Unauthorized` for an unknown email, a wrong password or an inactive user.
pub async fn login(db: &DatabaseConnection, email: &str, password: &str) -> Result<Actor> {
    let email = email.trim().to_lowercase();
    let Some(user) = User::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    else {
        debug!("Login attempt for unknown email");
        return Err(unauthorized("invalid credentials"));
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "Login failed: wrong password");
        return Err(unauthorized("invalid credentials"));
    }
    let actor = actor_for(&user)?;

    let mut active_model: user::ActiveModel = user.into();
    active_model.last_login_at = Set(Some(chrono::Utc::now()));
    active_model.update(db).await?;

    info!(user_id = actor.user_id, "User logged in");
    Ok(actor)
}

/// Hashes a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })
}

/// Checks a password against a stored PHC string. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash {
        message: format!("invalid hash format: {e}"),
    })?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::PasswordHash {
            message: e.to_string(),
        }),
    }
}
