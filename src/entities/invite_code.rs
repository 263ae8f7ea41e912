//! Invite code entity - a token granting a role within an organization at signup.

use super::enums::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invite code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invite_codes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The code string users type at signup
    #[sea_orm(unique)]
    pub code: String,
    /// Role granted to whoever signs up with this code
    pub role: Role,
    /// Maximum number of signups, unlimited when None
    pub max_uses: Option<i32>,
    /// Code is rejected after this instant
    pub expires_at: Option<DateTimeUtc>,
    /// Number of successful signups so far
    pub used_count: i32,
    /// Inactive codes are never matched
    pub is_active: bool,
    /// Organization the code joins users to
    pub organization_id: i64,
    /// When the code was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `InviteCode` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each invite code belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
