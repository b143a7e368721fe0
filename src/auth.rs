//! Registration and login, grounded in `original_source/server.c`'s
//! `REGISTER`/`LOGIN` handlers (`db_add_user`, `db_validate_user`,
//! `db_get_user_role`).

use crate::error::ServerError;
use crate::store::{Role, Store};

pub struct LoginResult {
    pub user_id: i64,
    pub role: Role,
}

/// Registers a new user. `role` defaults to `Student` unless `admin` is
/// requested; requesting `admin` requires `code` to match the configured
/// admin secret (see DESIGN.md, Open Question 2 — env-overridable,
/// `network_programming` by default).
pub async fn register(
    store: &Store,
    admin_secret: &str,
    username: &str,
    password: &str,
    role: Role,
    code: &str,
) -> Result<i64, ServerError> {
    if role == Role::Admin && code != admin_secret {
        return Err(ServerError::InvalidAdminSecret);
    }
    store.add_user(username, password, role).await
}

/// Validates credentials stored verbatim as plaintext (Open Question 1 —
/// a known weakness, flagged rather than silently fixed: see DESIGN.md).
pub async fn login(store: &Store, username: &str, password: &str) -> Result<LoginResult, ServerError> {
    let user_id = store
        .validate_user(username, password)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;
    let role = store
        .get_role(username)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;
    Ok(LoginResult { user_id, role })
}
