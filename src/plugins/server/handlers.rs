use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::auth::{AdminUser, AuthUser, ServiceAuth};
use crate::{
  entity::{adjustment, affiliate, attribution, payout_request, user},
  prelude::*,
  state::AppState,
  sv::{
    attribution::OrderCompleted,
    payout::{PayoutForm, Submission},
    tier::RuleInput,
  },
  utils,
};

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "status": "ok" }))
}

pub async fn summary(
  State(app): State<Arc<AppState>>,
  AuthUser(user_id): AuthUser,
) -> Result<Json<crate::sv::affiliate::Summary>> {
  Ok(Json(app.sv().affiliate.summary(user_id).await?))
}

#[derive(Deserialize)]
pub struct HistoryParams {
  #[serde(default = "default_page")]
  page: u64,
  #[serde(default = "default_per_page")]
  per_page: u64,
}

fn default_page() -> u64 {
  1
}

fn default_per_page() -> u64 {
  20
}

pub async fn history(
  State(app): State<Arc<AppState>>,
  AuthUser(user_id): AuthUser,
  Query(params): Query<HistoryParams>,
) -> Result<Json<json::Value>> {
  let sv = app.sv();
  let affiliate =
    sv.affiliate.by_user(user_id).await?.ok_or(Error::AffiliateNotFound)?;

  let (items, total) = sv
    .attribution
    .history(affiliate.id, params.page, params.per_page)
    .await?;

  Ok(Json(json::json!({
    "items": items,
    "total": total,
    "page": params.page,
    "per_page": params.per_page,
  })))
}

pub async fn submit_payout(
  State(app): State<Arc<AppState>>,
  AuthUser(user_id): AuthUser,
  Json(form): Json<PayoutForm>,
) -> Result<(StatusCode, Json<payout_request::Model>)> {
  match app.sv().payout.submit(user_id, &form).await? {
    Submission::Created(request) => Ok((StatusCode::CREATED, Json(request))),
    Submission::Existing(request) => Ok((StatusCode::OK, Json(request))),
  }
}

#[derive(Deserialize)]
pub struct EnrollReq {
  code: String,
}

pub async fn enroll(
  State(app): State<Arc<AppState>>,
  AuthUser(user_id): AuthUser,
  Json(req): Json<EnrollReq>,
) -> Result<Json<affiliate::Model>> {
  Ok(Json(app.sv().affiliate.enroll(user_id, &req.code).await?))
}

#[derive(Deserialize)]
pub struct CaptureReq {
  code: Option<String>,
  url: Option<String>,
}

/// Accepts either a bare referral code or a landing URL to extract one
/// from.
pub async fn capture_referral(
  State(app): State<Arc<AppState>>,
  AuthUser(user_id): AuthUser,
  Json(req): Json<CaptureReq>,
) -> Result<Json<user::Model>> {
  let code = req
    .code
    .or_else(|| req.url.as_deref().and_then(utils::code_from_url))
    .ok_or(Error::Validation {
      field: "code",
      message: "no referral code in request".into(),
    })?;

  Ok(Json(app.sv().user.capture_referral(user_id, &code).await?))
}

#[derive(Deserialize)]
pub struct SessionReq {
  user_id: i64,
}

/// The identity collaborator exchanges its own authenticated user for a
/// session token to hand to the browser.
pub async fn create_session(
  State(app): State<Arc<AppState>>,
  _: ServiceAuth,
  Json(req): Json<SessionReq>,
) -> Result<Json<json::Value>> {
  app.sv().user.get_or_create(req.user_id).await?;
  let token = app.issue_session(req.user_id);
  Ok(Json(json::json!({ "token": token })))
}

pub async fn order_completed(
  State(app): State<Arc<AppState>>,
  _: ServiceAuth,
  Json(event): Json<OrderCompleted>,
) -> Result<Json<json::Value>> {
  let row = app.sv().attribution.record(&event).await?;
  Ok(Json(json::json!({
    "attributed": row.is_some(),
    "attribution": row,
  })))
}

#[derive(Deserialize)]
pub struct OrderReversed {
  affiliate_id: i32,
  order_id: String,
}

pub async fn order_reversed(
  State(app): State<Arc<AppState>>,
  _: ServiceAuth,
  Json(event): Json<OrderReversed>,
) -> Result<Json<json::Value>> {
  let row = app
    .sv()
    .attribution
    .reverse(event.affiliate_id, &event.order_id)
    .await?;
  Ok(Json(json::json!({
    "reversed": row.is_some(),
    "attribution": row,
  })))
}

pub async fn admin_affiliates(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
) -> Result<Json<Vec<affiliate::Model>>> {
  Ok(Json(app.sv().affiliate.all().await?))
}

#[derive(Deserialize)]
pub struct AttributionParams {
  affiliate_id: Option<i32>,
  format: Option<String>,
}

pub async fn admin_attributions(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Query(params): Query<AttributionParams>,
) -> Result<Response> {
  let rows = app.sv().attribution.list(params.affiliate_id).await?;

  if params.format.as_deref() == Some("csv") {
    return Ok(
      (
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        attributions_csv(&rows),
      )
        .into_response(),
    );
  }

  Ok(Json(rows).into_response())
}

#[derive(Deserialize)]
pub struct PayoutParams {
  status: Option<String>,
}

pub async fn admin_payouts(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Query(params): Query<PayoutParams>,
) -> Result<Json<Vec<payout_request::Model>>> {
  let status = match params.status.as_deref() {
    Some(raw) => Some(crate::entity::PayoutStatus::parse(raw)?),
    None => None,
  };
  Ok(Json(app.sv().payout.list(status).await?))
}

#[derive(Deserialize)]
pub struct ApproveReq {
  payout_ref: String,
  utr: Option<String>,
  note: Option<String>,
}

pub async fn approve_payout(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
  Json(req): Json<ApproveReq>,
) -> Result<Json<payout_request::Model>> {
  Ok(Json(
    app.sv().payout.approve(id, &req.payout_ref, req.utr, req.note).await?,
  ))
}

#[derive(Deserialize)]
pub struct PaidReq {
  utr: Option<String>,
}

pub async fn mark_payout_paid(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
  Json(req): Json<PaidReq>,
) -> Result<Json<payout_request::Model>> {
  Ok(Json(app.sv().payout.mark_paid(id, req.utr).await?))
}

#[derive(Deserialize)]
pub struct RejectReq {
  note: String,
}

pub async fn reject_payout(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
  Json(req): Json<RejectReq>,
) -> Result<Json<payout_request::Model>> {
  Ok(Json(app.sv().payout.reject(id, &req.note).await?))
}

pub async fn update_rules(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
  Json(rules): Json<Vec<RuleInput>>,
) -> Result<Json<Vec<crate::entity::commission_rule::Model>>> {
  Ok(Json(app.sv().affiliate.update_rules(id, &rules).await?))
}

#[derive(Deserialize)]
pub struct AdjustReq {
  #[serde(default)]
  sales_delta: i64,
  #[serde(default)]
  commission_delta: i64,
  note: String,
}

pub async fn adjust(
  State(app): State<Arc<AppState>>,
  AdminUser(admin_id): AdminUser,
  Path(id): Path<i32>,
  Json(req): Json<AdjustReq>,
) -> Result<Json<adjustment::Model>> {
  Ok(Json(
    app
      .sv()
      .payout
      .adjust(id, admin_id, req.sales_delta, req.commission_delta, &req.note)
      .await?,
  ))
}

#[derive(Deserialize)]
pub struct ActiveReq {
  active: bool,
}

pub async fn set_active(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
  Json(req): Json<ActiveReq>,
) -> Result<Json<affiliate::Model>> {
  Ok(Json(app.sv().affiliate.set_active(id, req.active).await?))
}

pub async fn reconcile(
  State(app): State<Arc<AppState>>,
  AdminUser(_): AdminUser,
  Path(id): Path<i32>,
) -> Result<Json<crate::sv::affiliate::ReconcileReport>> {
  Ok(Json(app.sv().affiliate.reconcile(id).await?))
}

fn attributions_csv(rows: &[attribution::Model]) -> String {
  let mut out = String::from(
    "id,order_id,affiliate_id,user_id,month_key,base_amount,percent,\
     commission_amount,status,completed_at\n",
  );
  for row in rows {
    out.push_str(&format!(
      "{},{},{},{},{},{},{},{},{},{}\n",
      row.id,
      csv_field(&row.order_id),
      row.affiliate_id,
      row.user_id,
      row.month_key,
      row.base_amount,
      row.percent,
      row.commission_amount,
      row.status.as_str(),
      row.completed_at,
    ));
  }
  out
}

fn csv_field(value: &str) -> String {
  if value.contains([',', '"', '\n']) {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_csv_field_quoting() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("a,b"), "\"a,b\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
  }
}
