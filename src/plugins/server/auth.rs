use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};

use crate::{prelude::*, state::AppState};

/// Session-authenticated caller, resolved through the identity adapter's
/// token store. Rejected before any business logic runs.
pub struct AuthUser(pub i64);

/// Session-authenticated caller who is also a configured admin.
pub struct AdminUser(pub i64);

/// Shared-secret auth for collaborator subsystems (order events, session
/// provisioning).
pub struct ServiceAuth;

fn bearer(parts: &Parts) -> Option<&str> {
  parts
    .headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self> {
    let token = bearer(parts).ok_or(Error::Unauthorized)?;
    let user_id = state.authenticate(token).ok_or(Error::Unauthorized)?;
    Ok(AuthUser(user_id))
  }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self> {
    let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
    if !state.is_admin(user_id) {
      return Err(Error::Forbidden);
    }
    Ok(AdminUser(user_id))
  }
}

impl FromRequestParts<Arc<AppState>> for ServiceAuth {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self> {
    let token = bearer(parts).ok_or(Error::Unauthorized)?;
    if token != state.service_token {
      return Err(Error::Unauthorized);
    }
    Ok(ServiceAuth)
  }
}
