// ============================================================================
// MODÈLE : STORAGE CONTRACTS
// ============================================================================
//
// Description:
//   Contrat de location pour une unité. Numéro généré SC-<année>-<séquence>.
//
// Points d'attention:
//   - Au plus un contrat actif par unité : l'import réutilise le contrat
//     actif existant au lieu d'en créer un deuxième
//   - Plusieurs users par contrat via storage_contract_users
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_contracts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub contract_number: String,

    pub storage_unit_id: i32,

    pub move_in_date: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub gross_rent: Decimal,
    pub payment_cycle: PaymentCycle,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub security_deposit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub security_deposit_balance: Decimal,
    pub online_access: bool,
    pub autopay: bool,

    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub created_at: DateTimeUtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentCycle {
    #[sea_orm(string_value = "Monthly")]
    Monthly,
    #[sea_orm(string_value = "Quarterly")]
    Quarterly,
    #[sea_orm(string_value = "Annual")]
    Annual,
}

impl PaymentCycle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "monthly" | "month" | "m" => Some(PaymentCycle::Monthly),
            "quarterly" | "quarter" | "q" => Some(PaymentCycle::Quarterly),
            "annual" | "annually" | "yearly" | "year" | "y" => Some(PaymentCycle::Annual),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::storage_units::Entity",
        from = "Column::StorageUnitId",
        to = "super::storage_units::Column::Id"
    )]
    StorageUnit,

    #[sea_orm(has_many = "super::storage_contract_users::Entity")]
    StorageContractUsers,
}

impl Related<super::storage_units::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorageUnit.def()
    }
}

impl Related<super::storage_contract_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorageContractUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
