use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("user not found")]
  UserNotFound,
  #[error("affiliate not found")]
  AffiliateNotFound,
  #[error("payout request not found")]
  PayoutNotFound,
  #[error("{field}: {message}")]
  Validation { field: &'static str, message: String },
  #[error("requested amount exceeds eligible balance")]
  Ineligible { eligible: i64 },
  #[error("no transition allowed from `{from}`")]
  InvalidTransition { from: &'static str },
  #[error("invalid arguments: {0}")]
  InvalidArgs(String),
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden")]
  Forbidden,
  #[error("internal error: {0}")]
  Internal(String),
  #[error(transparent)]
  Db(#[from] sea_orm::DbErr),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::UserNotFound
      | Error::AffiliateNotFound
      | Error::PayoutNotFound => StatusCode::NOT_FOUND,
      Error::Validation { .. }
      | Error::Ineligible { .. }
      | Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::InvalidTransition { .. } => StatusCode::CONFLICT,
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden => StatusCode::FORBIDDEN,
      Error::Internal(_) | Error::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match &self {
      // Internal detail stays in the logs, not the response
      Error::Db(err) => {
        tracing::error!("database error: {err}");
        json::json!({ "error": "internal error" })
      }
      Error::Internal(msg) => {
        tracing::error!("internal error: {msg}");
        json::json!({ "error": "internal error" })
      }
      // Eligibility failures carry the computed balance so the client
      // can correct the request
      Error::Ineligible { eligible } => json::json!({
        "error": self.to_string(),
        "meta": { "eligible": eligible },
      }),
      _ => json::json!({ "error": self.to_string() }),
    };

    (status, Json(body)).into_response()
  }
}
