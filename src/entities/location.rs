//! Location entity - a site belonging to a business.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Location database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent business
    pub business_id: i64,
    /// Denormalized owning organization, used for tenant scoping
    pub organization_id: i64,
    /// Name, unique within the business
    pub name: String,
    /// Optional postal address
    pub address: Option<String>,
    /// When the location was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Location and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each location belongs to one business
    #[sea_orm(
        belongs_to = "super::business::Entity",
        from = "Column::BusinessId",
        to = "super::business::Column::Id"
    )]
    Business,
}

impl Related<super::business::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Business.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
