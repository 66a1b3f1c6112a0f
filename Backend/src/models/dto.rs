//pour les réponses structurées (imports + listes admin)
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::storage_contract_users::AccessLevel;
use crate::models::storage_contracts::PaymentCycle;
use crate::models::users;
use crate::utils::password::CredentialState;

/// Problème rattaché à une ligne du fichier (numéro 1-based, l'en-tête est la ligne 1)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub message: String,
}

impl RowIssue {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

// Echo public d'un user créé (jamais le mot de passe)
#[derive(Debug, Clone, Serialize)]
pub struct ImportedUser {
    pub email: String,
    pub role: String,
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Default, Serialize)]
pub struct UserImportResult {
    pub success: bool,
    pub message: String,
    pub success_count: usize,
    pub error_count: usize,
    pub total_processed: usize,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
    pub created_users: Vec<ImportedUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedContract {
    pub contract_number: String,
    pub unit_id: String,
    pub user_email: String,
    pub is_primary: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct StorageImportResult {
    pub success: bool,
    pub message: String,
    pub success_count: usize,
    pub error_count: usize,
    pub total_processed: usize,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
    pub created_contracts: Vec<CreatedContract>,
}

// Seed initial : le mot de passe est masqué
#[derive(Debug, Serialize)]
pub struct SeededUser {
    pub email: String,
    pub role: String,
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub display_id: Option<String>,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    pub is_confirmed: bool,
    pub has_valid_salt: bool,
    pub divisions: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PendingSignup {
    pub id: i32,
    pub display_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub minutes_remaining: i64,
}

#[derive(Debug, Serialize)]
pub struct ContractTenant {
    pub user_id: i32,
    pub display_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_primary: bool,
    pub access_level: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct ContractSummary {
    pub id: i32,
    pub contract_number: String,
    pub unit_id: String,
    pub unit_size: String,
    pub move_in_date: Option<NaiveDate>,
    pub gross_rent: Decimal,
    pub payment_cycle: PaymentCycle,
    pub security_deposit: Decimal,
    pub security_deposit_balance: Decimal,
    pub online_access: bool,
    pub autopay: bool,
    pub is_active: bool,
    pub tenants: Vec<ContractTenant>,
}

#[derive(Debug, Serialize)]
pub struct UnitSummary {
    pub id: i32,
    pub unit_id: String,
    pub unit_size: String,
    pub base_rent: Decimal,
    pub is_active: bool,
    pub active_contract: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub status: String,
    pub user_count: u64,
    pub users_needing_password_reset: u64,
    pub pending_signups: u64,
    pub storage_units: u64,
    pub storage_contracts: u64,
    pub recommendation: String,
}

#[derive(Debug, Default, Serialize)]
pub struct StorageClearResult {
    pub contract_users_deleted: u64,
    pub contracts_deleted: u64,
    pub units_deleted: u64,
}

// Profil renvoyé par /auth/login et /auth/me
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub display_id: Option<String>,
    pub email: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
    /// Compte legacy : le mot de passe doit être changé
    pub must_reset_password: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&users::Model> for UserProfile {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            display_id: user.display_id.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            must_reset_password: CredentialState::from_salt(user.salt.as_deref()) != CredentialState::Salted,
            last_login_at: user.last_login_at,
        }
    }
}
