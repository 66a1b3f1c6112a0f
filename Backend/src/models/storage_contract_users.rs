use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Association user <-> contrat. La paire (contrat, user) est unique tant qu'elle est active.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_contract_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub storage_contract_id: i32,
    pub user_id: i32,
    pub is_primary_contract_holder: bool,
    pub access_level: AccessLevel,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub removed_at: Option<DateTimeUtc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AccessLevel {
    #[sea_orm(string_value = "Full")]
    Full,
    #[sea_orm(string_value = "ReadOnly")]
    ReadOnly,
    #[sea_orm(string_value = "Emergency")]
    Emergency,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::storage_contracts::Entity",
        from = "Column::StorageContractId",
        to = "super::storage_contracts::Column::Id"
    )]
    StorageContract,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::storage_contracts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorageContract.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
