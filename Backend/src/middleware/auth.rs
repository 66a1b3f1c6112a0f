use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::error::{AppError, INVALID_SESSION_MESSAGE};
use crate::models::users;
use crate::services::security_service::SecurityService;

pub const SESSION_COOKIE: &str = "session_token";

/// Tokens candidats : header `Authorization: Bearer <token>` d'abord, puis cookie `session_token`
pub fn session_tokens(req: &HttpRequest) -> Vec<String> {
    let bearer = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    let cookie = req.cookie(SESSION_COOKIE).map(|c| c.value().trim().to_string());

    let mut tokens: Vec<String> = Vec::with_capacity(2);
    for token in [bearer, cookie].into_iter().flatten() {
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

pub fn extract_token(req: &HttpRequest) -> Option<String> {
    session_tokens(req).into_iter().next()
}

/// Utilisateur de la session courante, revalidé en base à chaque requête.
/// Extracteur pour les routes protégées.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user: users::Model,
    pub token: String,
}

impl FromRequest for SessionUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Tokens + connexion BD (extraits avant le future, la requête n'est pas 'static)
        let tokens = session_tokens(req);
        let db = req.app_data::<web::Data<DatabaseConnection>>().cloned();

        Box::pin(async move {
            let mut last_error = AppError::Unauthorized(INVALID_SESSION_MESSAGE.to_string());
            if tokens.is_empty() {
                return Err(last_error.into());
            }
            let db = db.ok_or_else(|| AppError::infrastructure("Session check", "database not configured"))?;

            // 2. Validation, premier token valide gagnant (une session expirée est effacée au passage)
            for token in tokens {
                match SecurityService::validate_session(db.get_ref(), &token).await {
                    Ok(user) => return Ok(SessionUser { user, token }),
                    Err(e) => last_error = AppError::from(e),
                }
            }

            Err(last_error.into())
        })
    }
}

/// Session valide ET rôle Admin en base (403 sinon)
#[derive(Debug, Clone)]
pub struct AdminUser(pub users::Model);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let session = SessionUser::from_request(req, payload);

        Box::pin(async move {
            let session = session.await?;
            if !session.user.is_admin() {
                warn!(email = %session.user.email, "⛔ Admin route refused");
                return Err(AppError::Forbidden("Administrator access required".to_string()).into());
            }
            Ok(AdminUser(session.user))
        })
    }
}
