use axum::extract::FromRef;
use tracing::warn;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_decoy_blocking, verify_password_blocking},
        repo_types::User,
    },
    db::RepoError,
    error::AppError,
    state::AppState,
    validation::{is_valid_email, normalize_email, required},
};

/// Creates a user. Duplicate emails fail with [`AppError::Conflict`].
pub async fn register(st: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let name = required(req.name, "name")?;
    let email = normalize_email(&required(req.email, "email")?);
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("password is required".into()))?;

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    // Fast path only; the insert below can still lose a race.
    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let hash = hash_password_blocking(password).await?;

    match st.users.create(&name, &email, &hash).await {
        Ok(user) => Ok(user),
        Err(RepoError::Conflict) => {
            warn!(email = %email, "email registered concurrently");
            Err(AppError::Conflict("User already exists".into()))
        }
        Err(RepoError::Other(e)) => Err(AppError::Internal(e.context("create user"))),
    }
}

/// Checks credentials and mints a token. Unknown email and wrong password fail identically.
pub async fn login(st: &AppState, req: LoginRequest) -> Result<LoginResponse, AppError> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let Some(user) = st.users.find_by_email(&email).await? else {
        verify_decoy_blocking(password).await;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = JwtKeys::from_ref(st).sign(user.id)?;

    Ok(LoginResponse {
        token,
        user: PublicUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    })
}
