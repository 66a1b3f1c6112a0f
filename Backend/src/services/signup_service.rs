/*
services/signup_service.rs
├─ start_signup()            ← TempSignup créé, email de vérification envoyé
├─ lookup_signup()           ← token valide et non expiré ?
├─ complete_registration()   ← TempSignup → User (Client, confirmé), TempSignup supprimé
├─ sweep_expired_signups()   ← nettoyage des inscriptions expirées
└─ admin : list_pending(), delete_signup(), resend_verification()
*/
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::SignupError;
use crate::models::dto::PendingSignup;
use crate::models::{temp_signups, users};
use crate::services::email_service::Mailer;
use crate::services::security_service::SecurityService;
use crate::services::user_import_service::allocate_display_id;
use crate::utils::{password, tokens};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Coordonnées saisies à la fin de l'inscription (toutes optionnelles)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationContact {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

pub struct SignupService;

impl SignupService {
    pub async fn start_signup(
        db: &DatabaseConnection,
        mailer: &dyn Mailer,
        config: &AppConfig,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<temp_signups::Model, SignupError> {
        Self::start_signup_at(db, mailer, config, first_name, last_name, email, Utc::now()).await
    }

    pub async fn start_signup_at(
        db: &DatabaseConnection,
        mailer: &dyn Mailer,
        config: &AppConfig,
        first_name: &str,
        last_name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<temp_signups::Model, SignupError> {
        let first_name = first_name.trim();
        let last_name = last_name.trim();
        let email = users::normalize_email(email);
        if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
            return Err(SignupError::MissingFields);
        }

        // 1. Email déjà utilisé par un compte ?
        if SecurityService::get_user_by_email(db, &email).await?.is_some() {
            warn!(email = %email, "📝 Signup rejected: account already exists");
            return Err(SignupError::EmailTaken);
        }

        let txn = db.begin().await?;

        // 2. Une seule inscription en cours par email
        let evicted = temp_signups::Entity::delete_many()
            .filter(temp_signups::Column::Email.eq(email.as_str()))
            .exec(&txn)
            .await?
            .rows_affected;
        if evicted > 0 {
            info!(email = %email, evicted, "📝 Previous pending signup replaced");
        }

        // 3. Réserver le display id + token
        let display_id = allocate_display_id(&txn, &HashSet::new())
            .await?
            .ok_or_else(|| DbErr::Custom("Could not allocate a unique user id".to_string()))?;

        let signup = temp_signups::ActiveModel {
            display_id: Set(display_id),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            email: Set(email.clone()),
            verification_token: Set(tokens::generate_verification_token()),
            created_at: Set(now),
            expires_at: Set(now + config.signup_ttl()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(email = %email, user_id = %signup.display_id, "📝 Signup started");

        // 4. Email (un échec d'envoi n'annule pas l'inscription)
        send_verification(mailer, config, &signup).await;

        Ok(signup)
    }

    pub async fn lookup_signup(
        db: &DatabaseConnection,
        token: &str,
    ) -> Result<temp_signups::Model, SignupError> {
        Self::lookup_signup_at(db, token, Utc::now()).await
    }

    pub async fn lookup_signup_at(
        db: &DatabaseConnection,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<temp_signups::Model, SignupError> {
        if token.trim().is_empty() {
            return Err(SignupError::InvalidToken);
        }

        temp_signups::Entity::find()
            .filter(temp_signups::Column::VerificationToken.eq(token))
            .one(db)
            .await?
            .filter(|signup| !signup.is_expired_at(now))
            .ok_or(SignupError::InvalidToken)
    }

    pub async fn complete_registration(
        db: &DatabaseConnection,
        mailer: &dyn Mailer,
        token: &str,
        plain_password: &str,
        contact: RegistrationContact,
    ) -> Result<users::Model, SignupError> {
        Self::complete_registration_at(db, mailer, token, plain_password, contact, Utc::now()).await
    }

    /// Crée le User avec le display id réservé puis supprime le TempSignup (une transaction)
    pub async fn complete_registration_at(
        db: &DatabaseConnection,
        mailer: &dyn Mailer,
        token: &str,
        plain_password: &str,
        contact: RegistrationContact,
        now: DateTime<Utc>,
    ) -> Result<users::Model, SignupError> {
        if plain_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(SignupError::WeakPassword(MIN_PASSWORD_LENGTH));
        }

        let signup = Self::lookup_signup_at(db, token, now).await?;

        let txn = db.begin().await?;

        // Compte créé entre-temps (import admin, autre inscription)
        if SecurityService::get_user_by_email(&txn, &signup.email).await?.is_some() {
            txn.rollback().await?;
            return Err(SignupError::EmailTaken);
        }

        let (hash, salt) = password::new_credential(plain_password);
        let user = users::ActiveModel {
            display_id: Set(Some(signup.display_id.clone())),
            email: Set(signup.email.clone()),
            password_hash: Set(hash),
            salt: Set(Some(salt)),
            role: Set(users::Role::Client.as_str().to_string()),
            first_name: Set(signup.first_name.clone()),
            last_name: Set(signup.last_name.clone()),
            is_confirmed: Set(true),
            phone: Set(clean(contact.phone)),
            address: Set(clean(contact.address)),
            city: Set(clean(contact.city)),
            state: Set(clean(contact.state)),
            zip_code: Set(clean(contact.zip_code)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        temp_signups::Entity::delete_by_id(signup.id).exec(&txn).await?;
        txn.commit().await?;

        info!(email = %user.email, user_id = %signup.display_id, "✅ Registration completed");

        if let Err(e) = mailer
            .send_welcome_email(&user.email, &user.first_name, &signup.display_id)
            .await
        {
            error!(email = %user.email, "❌ Welcome email failed: {}", e);
        }

        Ok(user)
    }

    /// Supprime les inscriptions dont expires_at <= now
    pub async fn sweep_expired_signups(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
        let deleted = temp_signups::Entity::delete_many()
            .filter(temp_signups::Column::ExpiresAt.lte(now))
            .exec(db)
            .await?
            .rows_affected;

        if deleted > 0 {
            info!("🧹 {} expired signup(s) removed", deleted);
        }
        Ok(deleted)
    }

    pub async fn list_pending(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Vec<PendingSignup>, DbErr> {
        let signups = temp_signups::Entity::find()
            .order_by_desc(temp_signups::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(signups
            .into_iter()
            .map(|s| PendingSignup {
                is_expired: s.is_expired_at(now),
                minutes_remaining: (s.expires_at - now).num_minutes().max(0),
                id: s.id,
                display_id: s.display_id,
                email: s.email,
                first_name: s.first_name,
                last_name: s.last_name,
                created_at: s.created_at,
                expires_at: s.expires_at,
            })
            .collect())
    }

    pub async fn delete_signup(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
        let deleted = temp_signups::Entity::delete_by_id(id).exec(db).await?.rows_affected;
        Ok(deleted > 0)
    }

    /// Renvoie le lien de vérification (inscriptions non expirées seulement)
    pub async fn resend_verification(
        db: &DatabaseConnection,
        mailer: &dyn Mailer,
        config: &AppConfig,
        id: i32,
        now: DateTime<Utc>,
    ) -> Result<temp_signups::Model, SignupError> {
        let signup = temp_signups::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|s| !s.is_expired_at(now))
            .ok_or(SignupError::InvalidToken)?;

        send_verification(mailer, config, &signup).await;
        Ok(signup)
    }
}

async fn send_verification(mailer: &dyn Mailer, config: &AppConfig, signup: &temp_signups::Model) {
    let link = config.verification_link(&signup.verification_token);
    if let Err(e) = mailer
        .send_verification_email(
            &signup.email,
            &signup.first_name,
            &signup.last_name,
            &signup.display_id,
            &link,
        )
        .await
    {
        error!(email = %signup.email, "❌ Verification email failed: {}", e);
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
