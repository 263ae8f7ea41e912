//! Signup and tenant onboarding.
//!
//! A signup either founds a new organization (no code), joins through an invite code, or
//! joins through an organization's legacy flat code. Resolving the organization, consuming
//! the code and inserting the user all happen in one unit of work: a failure at any step
//! leaves neither an ownerless organization nor a consumed code without a user.

use crate::{
    config::settings::InviteSettings,
    core::{
        invite::{check_usable, consume_invite_code, find_active_code},
        organization::{create_organization, find_organization},
        role::parse_invite_code,
        session::hash_password,
        unit_of_work::run_in_transaction,
    },
    entities::{Organization, Role, User, invite_code, organization, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};
use tracing::{debug, info, warn};

const MIN_PASSWORD_LEN: usize = 8;

/// Signup form.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Plain-text password, hashed before storage
    pub password: String,
    /// Invite code or legacy organization code
    pub organization_code: Option<String>,
    /// Name of the organization to found when no code is given
    pub organization_name: Option<String>,
}

/// How the new user ended up in their organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinMethod {
    /// Founded a new organization; carries its default invite codes
    Founded {
        /// One code per assignable role
        invite_codes: Vec<invite_code::Model>,
    },
    /// Joined through an invite code
    InviteCode {
        /// The consumed code's id
        invite_code_id: i64,
    },
    /// Joined through the organization's legacy flat code
    LegacyCode,
}

/// Result of a successful signup.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    /// The created user
    pub user: user::Model,
    /// The organization the user belongs to
    pub organization: organization::Model,
    /// How the organization was resolved
    pub join_method: JoinMethod,
}

fn validate_request(request: &SignupRequest) -> Result<String> {
    if request.name.trim().is_empty() {
        return Err(Error::validation("name", "cannot be empty"));
    }

    let email = request.email.trim().to_lowercase();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(Error::validation("email", "must be a valid email address"));
    }

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(email)
}

/// Applies the onboarding decision table: found, invite code, legacy code, or reject.
async fn resolve_membership<C: ConnectionTrait>(
    conn: &C,
    code: Option<&str>,
    organization_name: &str,
    invites: &InviteSettings,
    now: DateTime<Utc>,
) -> Result<(organization::Model, Role, JoinMethod)> {
    let Some(code) = code else {
        let (organization, invite_codes) =
            create_organization(conn, organization_name, invites).await?;
        return Ok((
            organization,
            Role::OrganizationAdmin,
            JoinMethod::Founded { invite_codes },
        ));
    };

    if let Some(invite) = find_active_code(conn, code).await? {
        check_usable(&invite, now)?;
        consume_invite_code(conn, &invite).await?;
        let organization = find_organization(conn, invite.organization_id).await?;
        return Ok((
            organization,
            invite.role,
            JoinMethod::InviteCode {
                invite_code_id: invite.id,
            },
        ));
    }

    if let Some(parsed) = parse_invite_code(code) {
        debug!(
            role = ?parsed.role,
            "Structured code has no active row, trying legacy organization codes"
        );
    }

    let legacy = Organization::find()
        .filter(organization::Column::InviteCode.eq(code))
        .one(conn)
        .await?;
    match legacy {
        Some(organization) => Ok((organization, Role::Employee, JoinMethod::LegacyCode)),
        None => Err(Error::InvalidInviteCode {
            code: code.to_string(),
        }),
    }
}

/// Membership columns of a freshly signed-up user.
fn member(organization_id: i64, role: Role, now: DateTime<Utc>) -> user::ActiveModel {
    user::ActiveModel {
        organization_id: Set(Some(organization_id)),
        role: Set(role),
        is_active: Set(true),
        last_login_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
}

/// Registers a new user, resolving their organization and role from the optional code.
///
/// Without a code the user founds `organization_name` (or "`<name>`'s Organization") as
/// its `OrganizationAdmin`. With a code they join with the code's role, or as `Employee`
/// through a legacy organization code.
///
/// # Arguments
/// * `db` - Database connection
/// * `request` - The signup form
/// * `invites` - Defaults for the invite codes of a newly founded organization
///
/// # Returns
/// The new user, their organization and how it was resolved.
///
/// # Errors
/// - `Validation` for a bad name, email or password
/// - `Conflict` if the email is already registered
/// - `InviteExpired`, `MaxUsesReached` or `InvalidInviteCode` for unusable codes
pub async fn signup(
    db: &DatabaseConnection,
    request: SignupRequest,
    invites: InviteSettings,
) -> Result<SignupOutcome> {
    let email = validate_request(&request)?;
    let password_hash = hash_password(&request.password)?;
    let name = request.name.trim().to_string();
    let code = request
        .organization_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let organization_name = request
        .organization_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| format!("{name}'s Organization"), str::to_string);

    let outcome = run_in_transaction(db, move |txn| {
        Box::pin(async move {
            let taken = User::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(txn)
                .await?
                .is_some();
            if taken {
                return Err(Error::Conflict {
                    message: "email is already registered".to_string(),
                });
            }

            let now = Utc::now();
            let (organization, role, join_method) =
                resolve_membership(txn, code.as_deref(), &organization_name, &invites, now)
                    .await?;

            let user = user::ActiveModel {
                name: Set(name),
                email: Set(email),
                password_hash: Set(password_hash),
                ..member(organization.id, role, now)
            }
            .insert(txn)
            .await?;

            Ok(SignupOutcome {
                user,
                organization,
                join_method,
            })
        })
    })
    .await
    .inspect_err(|e| warn!("Signup rejected: {e}"))?;

    info!(
        user_id = outcome.user.id,
        organization_id = outcome.organization.id,
        role = ?outcome.user.role,
        "User signed up"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::InviteCode;
    use crate::test_utils::*;
    use chrono::Duration;
    use sea_orm::PaginatorTrait;

    fn request(email: &str, code: Option<&str>) -> SignupRequest {
        SignupRequest {
            name: "Dana Founder".to_string(),
            email: email.to_string(),
            password: TEST_PASSWORD.to_string(),
            organization_code: code.map(str::to_string),
            organization_name: Some("Acme".to_string()),
        }
    }

    #[test]
    fn test_validate_request() {
        assert_eq!(
            validate_request(&request("  Dana@Example.COM ", None)).unwrap(),
            "dana@example.com"
        );

        let mut bad = request("dana@example.com", None);
        bad.name = "  ".to_string();
        assert!(matches!(validate_request(&bad), Err(Error::Validation { field: "name", .. })));

        for email in ["dana", "@example.com", "dana@localhost"] {
            assert!(matches!(
                validate_request(&request(email, None)),
                Err(Error::Validation { field: "email", .. })
            ));
        }

        let mut short = request("dana@example.com", None);
        short.password = "short".to_string();
        assert!(matches!(
            validate_request(&short),
            Err(Error::Validation { field: "password", .. })
        ));
    }

    #[tokio::test]
    async fn test_signup_without_code_founds_organization() -> Result<()> {
        let db = setup_test_db().await?;

        let outcome = signup(&db, request("dana@example.com", None), InviteSettings::default())
            .await?;

        assert_eq!(outcome.user.role, Role::OrganizationAdmin);
        assert_eq!(outcome.organization.name, "Acme");
        assert_eq!(outcome.user.organization_id, Some(outcome.organization.id));
        let JoinMethod::Founded { invite_codes } = &outcome.join_method else {
            panic!("expected a founded organization, got {:?}", outcome.join_method);
        };
        assert_eq!(invite_codes.len(), 4);

        let stored = InviteCode::find()
            .filter(invite_code::Column::OrganizationId.eq(outcome.organization.id))
            .count(&db)
            .await?;
        assert_eq!(stored, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_blank_code_is_no_code() -> Result<()> {
        let db = setup_test_db().await?;
        let mut req = request("dana@example.com", Some("   "));
        req.organization_name = None;

        let outcome = signup(&db, req, InviteSettings::default()).await?;
        assert_eq!(outcome.organization.name, "Dana Founder's Organization");
        assert_eq!(outcome.user.role, Role::OrganizationAdmin);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_with_invite_code_adopts_role() -> Result<()> {
        let db = setup_test_db().await?;
        let founder = signup(&db, request("dana@example.com", None), InviteSettings::default())
            .await?;
        let JoinMethod::Founded { invite_codes } = founder.join_method else {
            panic!("expected founded organization");
        };
        let manager_code = invite_codes
            .iter()
            .find(|c| c.role == Role::Manager)
            .unwrap();

        let joined = signup(
            &db,
            request("max@example.com", Some(&manager_code.code)),
            InviteSettings::default(),
        )
        .await?;

        assert_eq!(joined.user.role, Role::Manager);
        assert_eq!(joined.organization.id, founder.organization.id);
        assert_eq!(
            joined.join_method,
            JoinMethod::InviteCode {
                invite_code_id: manager_code.id
            }
        );
        let stored = InviteCode::find_by_id(manager_code.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_with_expired_code() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let code = create_custom_invite_code(
            &db,
            org.id,
            Role::Employee,
            None,
            Some(Utc::now() - Duration::days(1)),
        )
        .await?;

        let result = signup(
            &db,
            request("late@example.com", Some(&code.code)),
            InviteSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InviteExpired { .. })));

        // Nothing was written
        assert!(User::find().filter(user::Column::Email.eq("late@example.com")).one(&db).await?.is_none());
        let stored = InviteCode::find_by_id(code.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_with_inactive_code_is_invalid() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let code = create_custom_invite_code(&db, org.id, Role::Manager, None, None).await?;
        let mut active_model: invite_code::ActiveModel = code.clone().into();
        active_model.is_active = Set(false);
        active_model.update(&db).await?;

        let result = signup(
            &db,
            request("max@example.com", Some(&code.code)),
            InviteSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidInviteCode { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_single_use_code_sequential() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let code = create_custom_invite_code(&db, org.id, Role::Employee, Some(1), None).await?;

        signup(&db, request("first@example.com", Some(&code.code)), InviteSettings::default())
            .await?;
        let second = signup(
            &db,
            request("second@example.com", Some(&code.code)),
            InviteSettings::default(),
        )
        .await;
        assert!(matches!(second, Err(Error::MaxUsesReached { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_single_use_code_concurrent() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let code = create_custom_invite_code(&db, org.id, Role::Employee, Some(1), None).await?;

        let (first, second) = tokio::join!(
            signup(
                &db,
                request("first@example.com", Some(&code.code)),
                InviteSettings::default()
            ),
            signup(
                &db,
                request("second@example.com", Some(&code.code)),
                InviteSettings::default()
            ),
        );

        let successes = [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(successes, 1);
        let failure = if first.is_err() { first } else { second };
        assert!(matches!(failure, Err(Error::MaxUsesReached { .. })));

        let stored = InviteCode::find_by_id(code.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_with_legacy_code_joins_as_employee() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let mut active_model: organization::ActiveModel = org.clone().into();
        active_model.invite_code = Set(Some("ACME-OLD".to_string()));
        active_model.update(&db).await?;

        let outcome = signup(
            &db,
            request("old@example.com", Some("ACME-OLD")),
            InviteSettings::default(),
        )
        .await?;
        assert_eq!(outcome.organization.id, org.id);
        assert_eq!(outcome.user.role, Role::Employee);
        assert_eq!(outcome.join_method, JoinMethod::LegacyCode);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_with_unknown_code() -> Result<()> {
        let (db, _) = setup_with_organization().await?;
        let organizations_before = Organization::find().count(&db).await?;

        for code in ["NOPE2024-EMP-ZZZ", "garbage"] {
            let result = signup(
                &db,
                request("who@example.com", Some(code)),
                InviteSettings::default(),
            )
            .await;
            assert!(matches!(result, Err(Error::InvalidInviteCode { .. })));
        }
        assert_eq!(Organization::find().count(&db).await?, organizations_before);
        Ok(())
    }

    /// Resolves membership, then inserts a user whose email already exists.
    async fn join_then_fail_user_insert(
        db: &DatabaseConnection,
        code: Option<String>,
        taken_email: &str,
    ) -> Result<SignupOutcome> {
        let email = taken_email.to_string();
        run_in_transaction(db, move |txn| {
            Box::pin(async move {
                let now = Utc::now();
                let (organization, role, join_method) = resolve_membership(
                    txn,
                    code.as_deref(),
                    "Initech",
                    &InviteSettings::default(),
                    now,
                )
                .await?;
                let user = user::ActiveModel {
                    name: Set("Late Joiner".to_string()),
                    email: Set(email),
                    password_hash: Set("unused".to_string()),
                    ..member(organization.id, role, now)
                }
                .insert(txn)
                .await?;
                Ok(SignupOutcome {
                    user,
                    organization,
                    join_method,
                })
            })
        })
        .await
    }

    #[tokio::test]
    async fn test_user_insert_failure_rolls_back_founded_organization() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let existing = create_test_actor(&db, org.id, Role::Employee).await?;
        let taken = User::find_by_id(existing.user_id).one(&db).await?.unwrap().email;
        let organizations_before = Organization::find().count(&db).await?;
        let codes_before = InviteCode::find().count(&db).await?;

        let result = join_then_fail_user_insert(&db, None, &taken).await;
        assert!(matches!(result, Err(Error::Database(_))));

        assert_eq!(Organization::find().count(&db).await?, organizations_before);
        assert!(
            Organization::find()
                .filter(organization::Column::Name.eq("Initech"))
                .one(&db)
                .await?
                .is_none()
        );
        assert_eq!(InviteCode::find().count(&db).await?, codes_before);
        Ok(())
    }

    #[tokio::test]
    async fn test_user_insert_failure_restores_invite_use() -> Result<()> {
        let (db, org) = setup_with_organization().await?;
        let code = create_custom_invite_code(&db, org.id, Role::Manager, Some(1), None).await?;
        let existing = create_test_actor(&db, org.id, Role::Employee).await?;
        let taken = User::find_by_id(existing.user_id).one(&db).await?.unwrap().email;

        let result = join_then_fail_user_insert(&db, Some(code.code.clone()), &taken).await;
        assert!(matches!(result, Err(Error::Database(_))));

        let stored = InviteCode::find_by_id(code.id).one(&db).await?.unwrap();
        assert_eq!(stored.used_count, 0);

        // The single use is still available to a real signup.
        let joined = signup(
            &db,
            request("max@example.com", Some(&code.code)),
            InviteSettings::default(),
        )
        .await?;
        assert_eq!(joined.user.role, Role::Manager);
        Ok(())
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_creates_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        signup(&db, request("dana@example.com", None), InviteSettings::default()).await?;

        let result = signup(&db, request("DANA@example.com", None), InviteSettings::default()).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        assert_eq!(Organization::find().count(&db).await?, 1);
        assert_eq!(InviteCode::find().count(&db).await?, 4);
        Ok(())
    }
}
