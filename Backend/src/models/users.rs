// ============================================================================
// MODÈLE : USERS
// ============================================================================
//
// Description:
//   Identité + credential + profil d'un utilisateur du portail.
//
// Colonnes principales:
//   - display_id (VARCHAR, UNIQUE) - format ####-AAA, affiché aux clients
//   - email (VARCHAR, UNIQUE) - toujours stocké en minuscules
//   - password_hash / salt - voir utils::password pour les sentinelles
//   - role - Admin / Client / Manager (texte libre toléré)
//   - session_token / session_expires_at - tous les deux NULL <=> pas de session
//
// Points d'attention:
//   - Une seule session active par user (le dernier login gagne)
//   - Suppression uniquement via l'action admin, qui supprime aussi
//     user_divisions et storage_contract_users
//
// ============================================================================

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub display_id: Option<String>,

    #[sea_orm(unique)]
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub salt: Option<String>,

    pub role: String,
    pub first_name: String,
    pub last_name: String,

    pub is_confirmed: bool,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,

    #[serde(skip_serializing)]
    #[sea_orm(unique)]
    pub session_token: Option<String>,
    pub session_expires_at: Option<DateTimeUtc>,
    pub last_login_at: Option<DateTimeUtc>,
    pub last_login_ip: Option<String>,

    pub phone: Option<String>,
    pub phone_type: Option<PhoneType>,
    pub phone2: Option<String>,
    pub phone2_type: Option<PhoneType>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum PhoneType {
    #[sea_orm(string_value = "Cell")]
    Cell,
    #[sea_orm(string_value = "Home")]
    Home,
    #[sea_orm(string_value = "Work")]
    Work,
}

impl PhoneType {
    /// Accepte les libellés des fichiers d'import (cell, mobile, c, home, h, work, office, w)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cell" | "mobile" | "c" => Some(PhoneType::Cell),
            "home" | "h" => Some(PhoneType::Home),
            "work" | "office" | "w" => Some(PhoneType::Work),
            _ => None,
        }
    }
}

/// Rôles reconnus par l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Client,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Client => "Client",
            Role::Manager => "Manager",
        }
    }

    /// Comparaison insensible à la casse
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "client" => Some(Role::Client),
            "manager" => Some(Role::Manager),
            _ => None,
        }
    }
}

/// Normalise un email pour stockage et recherche (trim + minuscules)
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Filtre `LOWER(users.email) = <email normalisé>`
pub fn email_matches(email: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col((Entity, Column::Email)))).eq(normalize_email(email))
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn is_admin(&self) -> bool {
        Role::parse(&self.role) == Some(Role::Admin)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_divisions::Entity")]
    UserDivisions,

    #[sea_orm(has_many = "super::storage_contract_users::Entity")]
    StorageContractUsers,
}

impl Related<super::user_divisions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserDivisions.def()
    }
}

impl Related<super::storage_contract_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorageContractUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
