/*
services/security_service.rs
├─ authenticate()            ← email + mot de passe (chemin sécurisé ou legacy)
├─ create_session()          ← NoSession → Active
├─ validate_session()        ← Active, ou Expired → NoSession (token effacé)
├─ logout()                  ← Active → Revoked → NoSession (idempotent)
├─ reset_user_password()     ← nouveau salt + hash, session invalidée
└─ delete_user()             ← supprime aussi les associations du user
*/
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{info, warn};

use crate::error::AuthError;
use crate::models::{storage_contract_users, user_divisions, users};
use crate::utils::password::{self, CredentialState};
use crate::utils::tokens;

pub struct SecurityService;

impl SecurityService {
    /// Recherche insensible à la casse
    pub async fn get_user_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::email_matches(email))
            .one(db)
            .await
    }

    /// Vérifie email + mot de passe.
    /// Le détail de l'échec est loggé, l'appelant ne reçoit qu'une erreur uniforme.
    pub async fn authenticate(
        db: &DatabaseConnection,
        email: &str,
        password: &str,
        allow_legacy: bool,
    ) -> Result<users::Model, AuthError> {
        let normalized = users::normalize_email(email);

        // 1. Trouver l'utilisateur
        let user = match Self::get_user_by_email(db, &normalized).await? {
            Some(user) => user,
            None => {
                warn!(email = %normalized, "🔒 Login failed: unknown user");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // 2. Compte confirmé ?
        if !user.is_confirmed {
            warn!(email = %normalized, "🔒 Login failed: account not confirmed");
            return Err(AuthError::AccountNotConfirmed);
        }

        // 3. Vérifier le mot de passe selon l'état du salt
        match CredentialState::from_salt(user.salt.as_deref()) {
            CredentialState::Legacy => {
                if !allow_legacy {
                    warn!(email = %normalized, "🔒 Login failed: legacy credential and legacy mode disabled");
                    return Err(AuthError::InvalidCredentials);
                }
                if !password::verify_legacy_password(password, &user.password_hash) {
                    warn!(email = %normalized, "🔒 Login failed: legacy password mismatch");
                    return Err(AuthError::InvalidCredentials);
                }
                warn!(
                    email = %normalized,
                    "⚠️  Legacy (unsalted) login accepted, password reset required"
                );
            }
            CredentialState::PendingReset => {
                warn!(email = %normalized, "🔒 Login failed: imported account waiting for password reset");
                return Err(AuthError::InvalidCredentials);
            }
            CredentialState::Salted => {
                let salt = user.salt.as_deref().unwrap_or_default();
                if !password::verify_password(password, &user.password_hash, salt) {
                    warn!(email = %normalized, "🔒 Login failed: bad password");
                    return Err(AuthError::InvalidCredentials);
                }
            }
        }

        info!(email = %normalized, "🔓 User authenticated");
        Ok(user)
    }

    pub async fn create_session(
        db: &DatabaseConnection,
        user: users::Model,
        ttl: Duration,
        ip: Option<String>,
    ) -> Result<String, DbErr> {
        Self::create_session_at(db, user, ttl, ip, Utc::now()).await
    }

    /// Génère un token, le stocke avec expires_at = now + ttl.
    /// Remplace une éventuelle session existante (une seule session par user).
    pub async fn create_session_at(
        db: &DatabaseConnection,
        user: users::Model,
        ttl: Duration,
        ip: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<String, DbErr> {
        let token = tokens::generate_session_token();
        let user_id = user.id;

        let mut active: users::ActiveModel = user.into();
        active.session_token = Set(Some(token.clone()));
        active.session_expires_at = Set(Some(now + ttl));
        active.last_login_at = Set(Some(now));
        if ip.is_some() {
            active.last_login_ip = Set(ip);
        }
        active.update(db).await?;

        info!(user_id, "🎫 Session created");
        Ok(token)
    }

    pub async fn validate_session(db: &DatabaseConnection, token: &str) -> Result<users::Model, AuthError> {
        Self::validate_session_at(db, token, Utc::now()).await
    }

    /// Retourne le user si la session est encore valide.
    /// Une session expirée est effacée au passage.
    pub async fn validate_session_at(
        db: &DatabaseConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<users::Model, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidSession);
        }

        let user = users::Entity::find()
            .filter(users::Column::SessionToken.eq(token))
            .one(db)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        match user.session_expires_at {
            Some(expires_at) if expires_at > now => Ok(user),
            _ => {
                let user_id = user.id;
                clear_session(db, user).await?;
                info!(user_id, "⌛ Session expired, token cleared");
                Err(AuthError::InvalidSession)
            }
        }
    }

    /// Idempotent : un token inconnu ou déjà effacé n'est pas une erreur
    pub async fn logout(db: &DatabaseConnection, token: &str) -> Result<bool, DbErr> {
        if token.trim().is_empty() {
            return Ok(false);
        }

        let user = users::Entity::find()
            .filter(users::Column::SessionToken.eq(token))
            .one(db)
            .await?;

        match user {
            Some(user) => {
                let user_id = user.id;
                clear_session(db, user).await?;
                info!(user_id, "👋 User logged out");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset admin : nouveau salt + hash, et la session en cours est coupée
    pub async fn reset_user_password(
        db: &DatabaseConnection,
        email: &str,
        new_password: &str,
    ) -> Result<bool, DbErr> {
        let user = match Self::get_user_by_email(db, email).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        let (hash, salt) = password::new_credential(new_password);
        let user_id = user.id;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash);
        active.salt = Set(Some(salt));
        active.session_token = Set(None);
        active.session_expires_at = Set(None);
        active.update(db).await?;

        info!(user_id, "🔑 Password reset by admin, session invalidated");
        Ok(true)
    }

    /// Supprime le user et ses associations dans une transaction
    pub async fn delete_user(db: &DatabaseConnection, email: &str) -> Result<bool, DbErr> {
        let txn = db.begin().await?;

        let user = match Self::get_user_by_email(&txn, email).await? {
            Some(user) => user,
            None => {
                txn.rollback().await?;
                return Ok(false);
            }
        };

        user_divisions::Entity::delete_many()
            .filter(user_divisions::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;
        storage_contract_users::Entity::delete_many()
            .filter(storage_contract_users::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;
        users::Entity::delete_by_id(user.id).exec(&txn).await?;

        txn.commit().await?;

        info!(email = %user.email, "🗑️  User deleted");
        Ok(true)
    }
}

async fn clear_session(db: &DatabaseConnection, user: users::Model) -> Result<(), DbErr> {
    let mut active: users::ActiveModel = user.into();
    active.session_token = Set(None);
    active.session_expires_at = Set(None);
    active.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::divisions;
    use crate::utils::password::{SALT_NEEDS_RESET, STORAGE_IMPORT_PLACEHOLDER};

    async fn insert_user(
        db: &DatabaseConnection,
        email: &str,
        password_hash: &str,
        salt: Option<&str>,
        confirmed: bool,
    ) -> users::Model {
        users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            salt: Set(salt.map(str::to_string)),
            role: Set("Client".to_string()),
            first_name: Set("Jane".to_string()),
            last_name: Set("Doe".to_string()),
            is_confirmed: Set(confirmed),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn insert_salted_user(db: &DatabaseConnection, email: &str, pwd: &str) -> users::Model {
        let (hash, salt) = password::new_credential(pwd);
        insert_user(db, email, &hash, Some(&salt), true).await
    }

    #[tokio::test]
    async fn test_round_trip_authentication() {
        let db = test_connection().await;
        insert_salted_user(&db, "jane@example.com", "p@ss").await;

        assert!(SecurityService::authenticate(&db, "jane@example.com", "p@ss", true).await.is_ok());
        assert!(matches!(
            SecurityService::authenticate(&db, "jane@example.com", "p@ssx", true).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let db = test_connection().await;
        insert_salted_user(&db, "jane@example.com", "p@ss").await;

        let user = SecurityService::authenticate(&db, "  JANE@Example.COM ", "p@ss", true).await;
        assert!(user.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_and_unconfirmed_users_fail() {
        let db = test_connection().await;
        let (hash, salt) = password::new_credential("p@ss");
        insert_user(&db, "pending@example.com", &hash, Some(&salt), false).await;

        assert!(matches!(
            SecurityService::authenticate(&db, "nobody@example.com", "p@ss", true).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            SecurityService::authenticate(&db, "pending@example.com", "p@ss", true).await,
            Err(AuthError::AccountNotConfirmed)
        ));
    }

    #[tokio::test]
    async fn test_legacy_fallback() {
        let db = test_connection().await;
        insert_user(&db, "old@example.com", "secret", None, true).await;
        insert_user(&db, "older@example.com", "secret", Some(SALT_NEEDS_RESET), true).await;

        assert!(SecurityService::authenticate(&db, "old@example.com", "secret", true).await.is_ok());
        assert!(SecurityService::authenticate(&db, "old@example.com", "secret2", true).await.is_err());
        assert!(SecurityService::authenticate(&db, "old@example.com", "", true).await.is_err());
        assert!(SecurityService::authenticate(&db, "older@example.com", "secret", true).await.is_ok());

        // Mode legacy désactivé
        assert!(SecurityService::authenticate(&db, "old@example.com", "secret", false).await.is_err());
    }

    #[tokio::test]
    async fn test_storage_placeholder_cannot_authenticate() {
        let db = test_connection().await;
        insert_user(
            &db,
            "storage.x@autumnridge.temp",
            STORAGE_IMPORT_PLACEHOLDER,
            Some(STORAGE_IMPORT_PLACEHOLDER),
            true,
        )
        .await;

        let result =
            SecurityService::authenticate(&db, "storage.x@autumnridge.temp", STORAGE_IMPORT_PLACEHOLDER, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_expiry_boundary() {
        let db = test_connection().await;
        let user = insert_salted_user(&db, "jane@example.com", "p@ss").await;
        let created_at = Utc::now();
        let ttl = Duration::hours(8);

        let token = SecurityService::create_session_at(&db, user, ttl, None, created_at).await.unwrap();

        let before = created_at + ttl - Duration::seconds(1);
        assert!(SecurityService::validate_session_at(&db, &token, before).await.is_ok());

        let after = created_at + ttl + Duration::seconds(1);
        assert!(matches!(
            SecurityService::validate_session_at(&db, &token, after).await,
            Err(AuthError::InvalidSession)
        ));

        // Le token a été effacé par la validation échouée
        let user = SecurityService::get_user_by_email(&db, "jane@example.com").await.unwrap().unwrap();
        assert!(user.session_token.is_none());
        assert!(user.session_expires_at.is_none());
        assert!(SecurityService::validate_session_at(&db, &token, before).await.is_err());
    }

    #[tokio::test]
    async fn test_new_login_replaces_previous_session() {
        let db = test_connection().await;
        let user = insert_salted_user(&db, "jane@example.com", "p@ss").await;

        let first = SecurityService::create_session(&db, user.clone(), Duration::hours(8), None).await.unwrap();
        let user = SecurityService::get_user_by_email(&db, "jane@example.com").await.unwrap().unwrap();
        let second = SecurityService::create_session(&db, user, Duration::hours(8), Some("10.0.0.1".into()))
            .await
            .unwrap();

        assert!(SecurityService::validate_session(&db, &first).await.is_err());
        let current = SecurityService::validate_session(&db, &second).await.unwrap();
        assert_eq!(current.last_login_ip.as_deref(), Some("10.0.0.1"));
        assert!(current.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let db = test_connection().await;
        let user = insert_salted_user(&db, "jane@example.com", "p@ss").await;
        let token = SecurityService::create_session(&db, user, Duration::hours(2), None).await.unwrap();

        assert!(SecurityService::logout(&db, &token).await.unwrap());
        assert!(!SecurityService::logout(&db, &token).await.unwrap());
        assert!(!SecurityService::logout(&db, "unknown").await.unwrap());
        assert!(SecurityService::validate_session(&db, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_password_invalidates_session() {
        let db = test_connection().await;
        let user = insert_user(&db, "old@example.com", "secret", None, true).await;
        let token = SecurityService::create_session(&db, user, Duration::hours(2), None).await.unwrap();

        assert!(SecurityService::reset_user_password(&db, "OLD@example.com", "n3w-pass").await.unwrap());
        assert!(SecurityService::validate_session(&db, &token).await.is_err());
        assert!(SecurityService::authenticate(&db, "old@example.com", "secret", true).await.is_err());
        assert!(SecurityService::authenticate(&db, "old@example.com", "n3w-pass", true).await.is_ok());

        assert!(!SecurityService::reset_user_password(&db, "ghost@example.com", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_user_removes_associations() {
        let db = test_connection().await;
        let user = insert_salted_user(&db, "jane@example.com", "p@ss").await;
        let division = divisions::ActiveModel {
            name: Set("Storage".to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        user_divisions::ActiveModel {
            user_id: Set(user.id),
            division_id: Set(division.id),
            contracted_at: Set(Utc::now()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        assert!(SecurityService::delete_user(&db, "jane@example.com").await.unwrap());
        assert!(SecurityService::get_user_by_email(&db, "jane@example.com").await.unwrap().is_none());
        assert!(user_divisions::Entity::find().all(&db).await.unwrap().is_empty());

        assert!(!SecurityService::delete_user(&db, "jane@example.com").await.unwrap());
    }
}
