use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::auth::{extract_token, SESSION_COOKIE};
use crate::middleware::SessionUser;
use crate::models::dto::UserProfile;
use crate::services::email_service::SharedMailer;
use crate::services::security_service::SecurityService;
use crate::services::signup_service::{RegistrationContact, SignupService};

// DTO pour la connexion
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

// Réponse après login (le token est aussi posé en cookie HttpOnly)
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct CompleteRegistrationRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[serde(flatten)]
    pub contact: RegistrationContact,
}

fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.session_cookie_secure)
        .max_age(CookieDuration::hours(config.session_ttl_hours))
        .finish()
}

/// POST /api/auth/login - Se connecter (PUBLIC)
#[post("/login")]
pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    if let Err(errors) = body.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    // 1. Vérifier email + mot de passe
    let user = SecurityService::authenticate(&db, &body.email, &body.password, config.allow_legacy_passwords).await?;

    // 2. Créer la session
    let ip = req.connection_info().realip_remote_addr().map(str::to_string);
    let token = SecurityService::create_session(&db, user.clone(), config.session_ttl(), ip).await?;

    // 3. Cookie + réponse
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token.clone(), &config))
        .json(LoginResponse {
            success: true,
            token,
            user: UserProfile::from(&user),
        }))
}

/// POST /api/auth/logout - Idempotent, efface toujours le cookie
#[post("/logout")]
pub async fn logout(req: HttpRequest, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    if let Some(token) = extract_token(&req) {
        SecurityService::logout(&db, &token).await?;
    }

    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();

    Ok(HttpResponse::Ok().cookie(removal).json(serde_json::json!({
        "success": true,
        "message": "Logged out"
    })))
}

/// GET /api/auth/me - Utilisateur de la session (PROTÉGÉE)
#[get("/me")]
pub async fn me(session: SessionUser) -> HttpResponse {
    HttpResponse::Ok().json(UserProfile::from(&session.user))
}

/// POST /api/auth/signup - Pré-inscription + email de vérification (PUBLIC)
#[post("/signup")]
pub async fn signup(
    body: web::Json<SignupRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    mailer: web::Data<SharedMailer>,
) -> Result<HttpResponse, AppError> {
    if let Err(errors) = body.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let pending = SignupService::start_signup(
        &db,
        mailer.get_ref().as_ref(),
        &config,
        &body.first_name,
        &body.last_name,
        &body.email,
    )
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": format!("Verification email sent to {}", pending.email),
        "expires_at": pending.expires_at
    })))
}

/// GET /api/auth/signup/{token} - Infos de l'inscription en attente (PUBLIC)
#[get("/signup/{token}")]
pub async fn signup_details(
    token: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let pending = SignupService::lookup_signup(&db, &token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "display_id": pending.display_id,
        "email": pending.email,
        "first_name": pending.first_name,
        "last_name": pending.last_name,
        "expires_at": pending.expires_at
    })))
}

/// POST /api/auth/complete-registration - Création du compte (PUBLIC)
#[post("/complete-registration")]
pub async fn complete_registration(
    body: web::Json<CompleteRegistrationRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<SharedMailer>,
) -> Result<HttpResponse, AppError> {
    if let Err(errors) = body.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    let body = body.into_inner();
    let user = SignupService::complete_registration(
        &db,
        mailer.get_ref().as_ref(),
        &body.token,
        &body.password,
        body.contact,
    )
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Account created",
        "user": UserProfile::from(&user)
    })))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(login)
            .service(logout)
            .service(me)
            .service(signup)
            .service(signup_details)
            .service(complete_registration),
    );
}
