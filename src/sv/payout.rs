use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  entity::{
    AttributionStatus, PayoutStatus, adjustment, affiliate, attribution,
    payout_request,
  },
  prelude::*,
  sv::{self, affiliate::sum_column},
};

lazy_static! {
  static ref IFSC_RE: Regex =
    Regex::new(r"^[A-Za-z]{4}[0-9A-Za-z]{7}$").unwrap();
  static ref AADHAAR_RE: Regex = Regex::new(r"^[0-9]{12}$").unwrap();
  static ref PAN_RE: Regex =
    Regex::new(r"^[A-Za-z]{5}[0-9]{4}[A-Za-z]$").unwrap();
  static ref UPI_RE: Regex =
    Regex::new(r"^[A-Za-z0-9._-]+@[A-Za-z]+$").unwrap();
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutForm {
  pub amount: i64,
  pub account_holder: String,
  pub bank_account: String,
  pub ifsc: String,
  pub bank_name: String,
  pub city: String,
  pub upi_id: Option<String>,
  pub pan: String,
  pub aadhaar: String,
}

/// Outcome of a submission: either a fresh request, or the existing
/// non-rejected request for the same (affiliate, month) — duplicates are
/// surfaced, not errored.
#[derive(Debug)]
pub enum Submission {
  Created(payout_request::Model),
  Existing(payout_request::Model),
}

impl Submission {
  pub fn into_inner(self) -> payout_request::Model {
    match self {
      Submission::Created(model) | Submission::Existing(model) => model,
    }
  }
}

pub struct Payout<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Payout<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Locked, not-yet-requested commission for the affiliate's current
  /// month. Non-rejected requests count against the balance.
  pub async fn eligible(&self, affiliate: &affiliate::Model) -> Result<i64> {
    let locked = sum_column(
      attribution::Entity::find()
        .filter(attribution::Column::AffiliateId.eq(affiliate.id))
        .filter(attribution::Column::MonthKey.eq(affiliate.month_key.clone()))
        .filter(attribution::Column::Status.eq(AttributionStatus::Locked)),
      attribution::Column::CommissionAmount,
      self.db,
    )
    .await?;

    let requested: Option<Option<i64>> = payout_request::Entity::find()
      .filter(payout_request::Column::AffiliateId.eq(affiliate.id))
      .filter(payout_request::Column::MonthKey.eq(affiliate.month_key.clone()))
      .filter(payout_request::Column::Status.ne(PayoutStatus::Rejected))
      .select_only()
      .column_as(
        sea_orm::sea_query::Expr::col(payout_request::Column::Amount).sum(),
        "total",
      )
      .into_tuple()
      .one(self.db)
      .await?;

    Ok(locked - requested.flatten().unwrap_or(0))
  }

  pub async fn submit(
    &self,
    user_id: i64,
    form: &PayoutForm,
  ) -> Result<Submission> {
    validate_form(form)?;

    let affiliate = sv::Affiliate::new(self.db)
      .by_user(user_id)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    if !affiliate.active {
      return Err(Error::Forbidden);
    }

    if let Some(existing) = self.open_request(&affiliate).await? {
      return Ok(Submission::Existing(existing));
    }

    let eligible = self.eligible(&affiliate).await?;
    if form.amount > eligible {
      return Err(Error::Ineligible { eligible });
    }

    let now = Utc::now().naive_utc();
    let txn = self.db.begin().await?;

    let inserted = payout_request::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate.id),
      user_id: Set(user_id),
      month_key: Set(affiliate.month_key.clone()),
      month_slot: Set(Some(affiliate.month_key.clone())),
      amount: Set(form.amount),
      status: Set(PayoutStatus::Requested),
      account_holder: Set(form.account_holder.clone()),
      bank_account: Set(form.bank_account.clone()),
      ifsc: Set(form.ifsc.clone()),
      bank_name: Set(form.bank_name.clone()),
      city: Set(form.city.clone()),
      upi_id: Set(form.upi_id.clone()),
      pan: Set(form.pan.clone()),
      aadhaar: Set(form.aadhaar.clone()),
      payout_ref: Set(None),
      utr: Set(None),
      admin_note: Set(None),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(&txn)
    .await;

    let request = match inserted {
      Ok(request) => request,
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        // Lost the (affiliate, month_slot) race: hand back the winner
        txn.rollback().await?;
        let existing = self
          .open_request(&affiliate)
          .await?
          .ok_or_else(|| Error::Internal("payout slot conflict".into()))?;
        return Ok(Submission::Existing(existing));
      }
      Err(err) => return Err(err.into()),
    };

    // Remember the settlement account on the affiliate record
    let fund_account = form
      .upi_id
      .clone()
      .unwrap_or_else(|| form.bank_account.clone());
    affiliate::ActiveModel {
      fund_account_id: Set(Some(fund_account)),
      ..affiliate.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "payout request {} submitted: affiliate {} month {} amount {}",
      request.id, request.affiliate_id, request.month_key, request.amount
    );

    Ok(Submission::Created(request))
  }

  pub async fn approve(
    &self,
    id: i32,
    payout_ref: &str,
    utr: Option<String>,
    note: Option<String>,
  ) -> Result<payout_request::Model> {
    let request = self.by_id(id).await?;
    require_status(&request, PayoutStatus::Requested)?;

    let approved = payout_request::ActiveModel {
      status: Set(PayoutStatus::Approved),
      payout_ref: Set(Some(payout_ref.into())),
      utr: Set(utr),
      admin_note: Set(note),
      updated_at: Set(Utc::now().naive_utc()),
      ..request.into()
    }
    .update(self.db)
    .await?;

    info!("payout request {id} approved (ref {payout_ref})");
    Ok(approved)
  }

  /// Settlement confirmed externally; record the UTR and close out.
  pub async fn mark_paid(
    &self,
    id: i32,
    utr: Option<String>,
  ) -> Result<payout_request::Model> {
    let request = self.by_id(id).await?;
    require_status(&request, PayoutStatus::Approved)?;

    let mut update = payout_request::ActiveModel {
      status: Set(PayoutStatus::Paid),
      updated_at: Set(Utc::now().naive_utc()),
      ..request.into()
    };
    if utr.is_some() {
      update.utr = Set(utr);
    }

    let paid = update.update(self.db).await?;
    info!("payout request {id} marked paid");
    Ok(paid)
  }

  /// Rejection clears the month slot, so the affiliate may submit a
  /// corrected request for the same period.
  pub async fn reject(
    &self,
    id: i32,
    note: &str,
  ) -> Result<payout_request::Model> {
    let request = self.by_id(id).await?;
    require_status(&request, PayoutStatus::Requested)?;

    let rejected = payout_request::ActiveModel {
      status: Set(PayoutStatus::Rejected),
      month_slot: Set(None),
      admin_note: Set(Some(note.into())),
      updated_at: Set(Utc::now().naive_utc()),
      ..request.into()
    }
    .update(self.db)
    .await?;

    info!("payout request {id} rejected: {note}");
    Ok(rejected)
  }

  /// Manual ledger correction against lifetime totals, with an audit row.
  pub async fn adjust(
    &self,
    affiliate_id: i32,
    admin_id: i64,
    sales_delta: i64,
    commission_delta: i64,
    note: &str,
  ) -> Result<adjustment::Model> {
    if note.trim().is_empty() {
      return Err(Error::Validation {
        field: "note",
        message: "audit note is required".into(),
      });
    }

    let txn = self.db.begin().await?;

    let affiliate = affiliate::Entity::find_by_id(affiliate_id)
      .one(&txn)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    let row = adjustment::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate_id),
      sales_delta: Set(sales_delta),
      commission_delta: Set(commission_delta),
      note: Set(note.into()),
      admin_id: Set(admin_id),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    affiliate::ActiveModel {
      lifetime_sales: Set(affiliate.lifetime_sales + sales_delta),
      lifetime_commission: Set(affiliate.lifetime_commission + commission_delta),
      ..affiliate.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "adjustment on affiliate {affiliate_id} by admin {admin_id}: \
       sales {sales_delta:+}, commission {commission_delta:+}"
    );

    Ok(row)
  }

  pub async fn by_id(&self, id: i32) -> Result<payout_request::Model> {
    payout_request::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PayoutNotFound)
  }

  pub async fn list(
    &self,
    status: Option<PayoutStatus>,
  ) -> Result<Vec<payout_request::Model>> {
    let mut query = payout_request::Entity::find()
      .order_by_desc(payout_request::Column::CreatedAt);
    if let Some(status) = status {
      query = query.filter(payout_request::Column::Status.eq(status));
    }
    Ok(query.all(self.db).await?)
  }

  async fn open_request(
    &self,
    affiliate: &affiliate::Model,
  ) -> Result<Option<payout_request::Model>> {
    Ok(
      payout_request::Entity::find()
        .filter(payout_request::Column::AffiliateId.eq(affiliate.id))
        .filter(
          payout_request::Column::MonthSlot.eq(affiliate.month_key.clone()),
        )
        .one(self.db)
        .await?,
    )
  }
}

fn require_status(
  request: &payout_request::Model,
  expected: PayoutStatus,
) -> Result<()> {
  if request.status == expected {
    Ok(())
  } else {
    Err(Error::InvalidTransition { from: request.status.as_str() })
  }
}

impl PayoutStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      PayoutStatus::Requested => "requested",
      PayoutStatus::Approved => "approved",
      PayoutStatus::Paid => "paid",
      PayoutStatus::Rejected => "rejected",
    }
  }

  pub fn parse(raw: &str) -> Result<Self> {
    match raw {
      "requested" => Ok(PayoutStatus::Requested),
      "approved" => Ok(PayoutStatus::Approved),
      "paid" => Ok(PayoutStatus::Paid),
      "rejected" => Ok(PayoutStatus::Rejected),
      _ => Err(Error::Validation {
        field: "status",
        message: format!("unknown status `{raw}`"),
      }),
    }
  }
}

fn validate_form(form: &PayoutForm) -> Result<()> {
  if form.amount <= 0 {
    return Err(Error::Validation {
      field: "amount",
      message: "must be positive".into(),
    });
  }

  for (field, value) in [
    ("account_holder", &form.account_holder),
    ("bank_account", &form.bank_account),
    ("bank_name", &form.bank_name),
    ("city", &form.city),
  ] {
    if value.trim().is_empty() {
      return Err(Error::Validation { field, message: "required".into() });
    }
  }

  if !AADHAAR_RE.is_match(&form.aadhaar) {
    return Err(Error::Validation {
      field: "aadhaar",
      message: "must be exactly 12 digits".into(),
    });
  }
  if !IFSC_RE.is_match(&form.ifsc) {
    return Err(Error::Validation {
      field: "ifsc",
      message: "must be 4 letters followed by 7 alphanumerics".into(),
    });
  }
  if !PAN_RE.is_match(&form.pan) {
    return Err(Error::Validation {
      field: "pan",
      message: "invalid PAN format".into(),
    });
  }
  if let Some(upi) = &form.upi_id {
    if !UPI_RE.is_match(upi) {
      return Err(Error::Validation {
        field: "upi_id",
        message: "expected local@handle".into(),
      });
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    self, attribution::OrderCompleted, test_utils::test_db, tier::RuleInput,
  };

  fn form(amount: i64) -> PayoutForm {
    PayoutForm {
      amount,
      account_holder: "Ravi Kumar".into(),
      bank_account: "001234567890".into(),
      ifsc: "HDFC0001234".into(),
      bank_name: "HDFC Bank".into(),
      city: "Pune".into(),
      upi_id: Some("ravi@okhdfc".into()),
      pan: "ABCDE1234F".into(),
      aadhaar: "123412341234".into(),
    }
  }

  /// Enroll an affiliate and give it `locked` commission to draw on.
  async fn seed_locked_commission(db: &DatabaseConnection) -> i32 {
    let sv = sv::Affiliate::new(db);
    let aff = sv.enroll(1, "RAVI10").await.unwrap();
    sv.update_rules(aff.id, &[RuleInput { min_monthly_sales: 0, percent: 10 }])
      .await
      .unwrap();

    let attribution = sv::Attribution::new(db);
    attribution
      .record(&OrderCompleted {
        order_id: "ord-1".into(),
        user_id: 2,
        base_amount: 10_000,
        referral_code: Some("RAVI10".into()),
        completed_at: Utc::now().naive_utc() - TimeDelta::minutes(1),
      })
      .await
      .unwrap();
    attribution.lock_due(Utc::now().naive_utc()).await.unwrap();

    aff.id
  }

  #[tokio::test]
  async fn test_submit_within_eligibility() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;

    let submission =
      Payout::new(&db).submit(1, &form(1000)).await.unwrap();

    let request = match submission {
      Submission::Created(request) => request,
      Submission::Existing(_) => panic!("expected a fresh request"),
    };
    assert_eq!(request.status, PayoutStatus::Requested);
    assert_eq!(request.amount, 1000);
    assert_eq!(request.month_slot, Some(request.month_key.clone()));
  }

  #[tokio::test]
  async fn test_eligibility_gate_reports_balance() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;

    // 10% of 10_000 locked = 1000 eligible
    let result = Payout::new(&db).submit(1, &form(1001)).await;
    assert!(matches!(result, Err(Error::Ineligible { eligible: 1000 })));
  }

  #[tokio::test]
  async fn test_open_commission_is_not_eligible() {
    let db = test_db::setup().await;
    let sv = sv::Affiliate::new(&db);
    let aff = sv.enroll(1, "RAVI10").await.unwrap();
    sv.update_rules(aff.id, &[RuleInput { min_monthly_sales: 0, percent: 10 }])
      .await
      .unwrap();

    // Accrued but never locked
    sv::Attribution::new(&db)
      .record(&OrderCompleted {
        order_id: "ord-1".into(),
        user_id: 2,
        base_amount: 10_000,
        referral_code: Some("RAVI10".into()),
        completed_at: Utc::now().naive_utc() - TimeDelta::minutes(1),
      })
      .await
      .unwrap();

    let result = Payout::new(&db).submit(1, &form(1)).await;
    assert!(matches!(result, Err(Error::Ineligible { eligible: 0 })));
  }

  #[tokio::test]
  async fn test_duplicate_month_returns_existing() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    let first = sv.submit(1, &form(500)).await.unwrap().into_inner();
    let second = sv.submit(1, &form(400)).await.unwrap();

    match second {
      Submission::Existing(request) => assert_eq!(request.id, first.id),
      Submission::Created(_) => panic!("expected the existing request"),
    }
    assert_eq!(
      payout_request::Entity::find().count(&db).await.unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn test_reject_frees_the_month_slot() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    let first = sv.submit(1, &form(500)).await.unwrap().into_inner();
    let rejected = sv.reject(first.id, "wrong account").await.unwrap();
    assert_eq!(rejected.status, PayoutStatus::Rejected);
    assert_eq!(rejected.month_slot, None);
    assert_eq!(rejected.admin_note.as_deref(), Some("wrong account"));

    // Slot free again; rejected amount no longer counts against balance
    let retry = sv.submit(1, &form(1000)).await.unwrap();
    assert!(matches!(retry, Submission::Created(_)));
  }

  #[tokio::test]
  async fn test_approve_then_paid() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    let request = sv.submit(1, &form(500)).await.unwrap().into_inner();

    let approved = sv
      .approve(request.id, "PO-2026-001", None, Some("ok".into()))
      .await
      .unwrap();
    assert_eq!(approved.status, PayoutStatus::Approved);
    assert_eq!(approved.payout_ref.as_deref(), Some("PO-2026-001"));

    let paid = sv
      .mark_paid(request.id, Some("UTR1234567".into()))
      .await
      .unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert_eq!(paid.utr.as_deref(), Some("UTR1234567"));
  }

  #[tokio::test]
  async fn test_terminal_states_are_immutable() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    let request = sv.submit(1, &form(500)).await.unwrap().into_inner();
    let rejected = sv.reject(request.id, "no").await.unwrap();

    assert!(matches!(
      sv.approve(rejected.id, "PO-1", None, None).await,
      Err(Error::InvalidTransition { from: "rejected" })
    ));
    assert!(matches!(
      sv.reject(rejected.id, "again").await,
      Err(Error::InvalidTransition { from: "rejected" })
    ));

    let request = sv.submit(1, &form(500)).await.unwrap().into_inner();
    sv.approve(request.id, "PO-2", None, None).await.unwrap();
    let paid = sv.mark_paid(request.id, None).await.unwrap();

    assert!(matches!(
      sv.reject(paid.id, "late").await,
      Err(Error::InvalidTransition { from: "paid" })
    ));
    assert!(matches!(
      sv.mark_paid(paid.id, None).await,
      Err(Error::InvalidTransition { from: "paid" })
    ));
  }

  #[tokio::test]
  async fn test_form_validation() {
    let db = test_db::setup().await;
    seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    let mut bad = form(100);
    bad.aadhaar = "12341234123".into(); // 11 digits
    assert!(matches!(
      sv.submit(1, &bad).await,
      Err(Error::Validation { field: "aadhaar", .. })
    ));

    let mut bad = form(100);
    bad.ifsc = "HD0001234".into();
    assert!(matches!(
      sv.submit(1, &bad).await,
      Err(Error::Validation { field: "ifsc", .. })
    ));

    let mut bad = form(100);
    bad.upi_id = Some("not-an-upi".into());
    assert!(matches!(
      sv.submit(1, &bad).await,
      Err(Error::Validation { field: "upi_id", .. })
    ));

    let mut bad = form(100);
    bad.bank_name = "  ".into();
    assert!(matches!(
      sv.submit(1, &bad).await,
      Err(Error::Validation { field: "bank_name", .. })
    ));
  }

  #[tokio::test]
  async fn test_inactive_affiliate_cannot_request() {
    let db = test_db::setup().await;
    let id = seed_locked_commission(&db).await;
    sv::Affiliate::new(&db).set_active(id, false).await.unwrap();

    let result = Payout::new(&db).submit(1, &form(100)).await;
    assert!(matches!(result, Err(Error::Forbidden)));
  }

  #[tokio::test]
  async fn test_adjust_updates_lifetime_totals() {
    let db = test_db::setup().await;
    let id = seed_locked_commission(&db).await;
    let sv = Payout::new(&db);

    sv.adjust(id, 99, 0, -250, "chargeback correction").await.unwrap();

    let aff = sv::Affiliate::new(&db).by_id(id).await.unwrap();
    assert_eq!(aff.lifetime_commission, 750);

    // Reconcile agrees with the adjusted ledger
    let report = sv::Affiliate::new(&db).reconcile(id).await.unwrap();
    assert!(report.drift.is_empty());

    assert!(sv.adjust(id, 99, 0, 10, "  ").await.is_err());
  }
}
