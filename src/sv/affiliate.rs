use sea_orm::sea_query::Expr;
use serde::Serialize;

use crate::{
  entity::{
    AttributionStatus, adjustment, affiliate, attribution, commission_rule,
    payout_request,
  },
  prelude::*,
  sv::{self, tier::RuleInput},
  utils,
};

pub struct Affiliate<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Serialize)]
pub struct Summary {
  pub code: String,
  pub active: bool,
  pub month_key: String,
  pub month_sales: i64,
  pub month_orders: i32,
  pub month_commission_accrued: i64,
  pub lifetime_sales: i64,
  pub lifetime_commission: i64,
  pub rules: Vec<commission_rule::Model>,
  pub recent_payouts: Vec<payout_request::Model>,
}

#[derive(Debug, Serialize)]
pub struct Drift {
  pub field: &'static str,
  pub stored: i64,
  pub computed: i64,
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
  pub affiliate_id: i32,
  pub drift: Vec<Drift>,
}

impl<'a> Affiliate<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Enroll a user as an affiliate under the given referral code.
  /// Re-enrollment returns the existing record.
  pub async fn enroll(
    &self,
    user_id: i64,
    code: &str,
  ) -> Result<affiliate::Model> {
    validate_code(code)?;

    sv::User::new(self.db).get_or_create(user_id).await?;

    if let Some(existing) = self.by_user(user_id).await? {
      return Ok(existing);
    }

    let now = Utc::now().naive_utc();
    let inserted = affiliate::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      code: Set(code.into()),
      active: Set(true),
      month_key: Set(utils::month_key(now)),
      month_sales: Set(0),
      month_orders: Set(0),
      month_commission_accrued: Set(0),
      lifetime_sales: Set(0),
      lifetime_commission: Set(0),
      fund_account_id: Set(None),
      created_at: Set(now),
    }
    .insert(self.db)
    .await;

    match inserted {
      Ok(affiliate) => {
        info!("enrolled affiliate `{code}` for user {user_id}");
        Ok(affiliate)
      }
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        // Either the code is taken, or a concurrent enrollment for the
        // same user won the race; the user index decides which.
        if let Some(existing) = self.by_user(user_id).await? {
          return Ok(existing);
        }
        Err(Error::Validation {
          field: "code",
          message: format!("referral code `{code}` is already taken"),
        })
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn by_id(&self, id: i32) -> Result<affiliate::Model> {
    affiliate::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::AffiliateNotFound)
  }

  pub async fn by_user(
    &self,
    user_id: i64,
  ) -> Result<Option<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .filter(affiliate::Column::UserId.eq(user_id))
        .one(self.db)
        .await?,
    )
  }

  pub async fn by_code_active(
    &self,
    code: &str,
  ) -> Result<Option<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .filter(affiliate::Column::Code.eq(code))
        .filter(affiliate::Column::Active.eq(true))
        .one(self.db)
        .await?,
    )
  }

  pub async fn all(&self) -> Result<Vec<affiliate::Model>> {
    Ok(
      affiliate::Entity::find()
        .order_by_asc(affiliate::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  /// Affiliates are never hard-deleted, only deactivated.
  pub async fn set_active(
    &self,
    id: i32,
    active: bool,
  ) -> Result<affiliate::Model> {
    let affiliate = self.by_id(id).await?;

    Ok(
      affiliate::ActiveModel { active: Set(active), ..affiliate.into() }
        .update(self.db)
        .await?,
    )
  }

  pub async fn rules(
    &self,
    affiliate_id: i32,
  ) -> Result<Vec<commission_rule::Model>> {
    Ok(
      commission_rule::Entity::find()
        .filter(commission_rule::Column::AffiliateId.eq(affiliate_id))
        .order_by_asc(commission_rule::Column::MinMonthlySales)
        .all(self.db)
        .await?,
    )
  }

  /// Replace an affiliate's rate table wholesale.
  pub async fn update_rules(
    &self,
    affiliate_id: i32,
    rules: &[RuleInput],
  ) -> Result<Vec<commission_rule::Model>> {
    let sorted = sv::tier::validate_rules(rules)?;
    self.by_id(affiliate_id).await?;

    let txn = self.db.begin().await?;

    commission_rule::Entity::delete_many()
      .filter(commission_rule::Column::AffiliateId.eq(affiliate_id))
      .exec(&txn)
      .await?;

    if !sorted.is_empty() {
      let models = sorted.iter().map(|rule| commission_rule::ActiveModel {
        id: NotSet,
        affiliate_id: Set(affiliate_id),
        min_monthly_sales: Set(rule.min_monthly_sales),
        percent: Set(rule.percent),
      });
      commission_rule::Entity::insert_many(models).exec(&txn).await?;
    }

    txn.commit().await?;

    self.rules(affiliate_id).await
  }

  pub async fn summary(&self, user_id: i64) -> Result<Summary> {
    let affiliate =
      self.by_user(user_id).await?.ok_or(Error::AffiliateNotFound)?;

    let rules = self.rules(affiliate.id).await?;

    let recent_payouts = payout_request::Entity::find()
      .filter(payout_request::Column::AffiliateId.eq(affiliate.id))
      .order_by_desc(payout_request::Column::CreatedAt)
      .limit(5)
      .all(self.db)
      .await?;

    Ok(Summary {
      code: affiliate.code,
      active: affiliate.active,
      month_key: affiliate.month_key,
      month_sales: affiliate.month_sales,
      month_orders: affiliate.month_orders,
      month_commission_accrued: affiliate.month_commission_accrued,
      lifetime_sales: affiliate.lifetime_sales,
      lifetime_commission: affiliate.lifetime_commission,
      rules,
      recent_payouts,
    })
  }

  /// Recompute the denormalized counters from the ledger and adjustment
  /// audit rows, rewrite them, and report any drift. This is the audit
  /// safety net for the ledger-plus-counters duplication.
  pub async fn reconcile(&self, affiliate_id: i32) -> Result<ReconcileReport> {
    let txn = self.db.begin().await?;

    let affiliate = affiliate::Entity::find_by_id(affiliate_id)
      .one(&txn)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    let month_filter = attribution::Entity::find()
      .filter(attribution::Column::AffiliateId.eq(affiliate_id))
      .filter(attribution::Column::MonthKey.eq(affiliate.month_key.clone()))
      .filter(attribution::Column::Status.ne(AttributionStatus::Reversed));

    let month_sales =
      sum_column(month_filter.clone(), attribution::Column::BaseAmount, &txn)
        .await?;
    let month_accrued = sum_column(
      month_filter.clone(),
      attribution::Column::CommissionAmount,
      &txn,
    )
    .await?;
    let month_orders = month_filter.count(&txn).await? as i64;

    let ledger_sales = sum_column(
      attribution::Entity::find()
        .filter(attribution::Column::AffiliateId.eq(affiliate_id))
        .filter(attribution::Column::Status.ne(AttributionStatus::Reversed)),
      attribution::Column::BaseAmount,
      &txn,
    )
    .await?;

    let locked_commission = sum_column(
      attribution::Entity::find()
        .filter(attribution::Column::AffiliateId.eq(affiliate_id))
        .filter(attribution::Column::Status.eq(AttributionStatus::Locked)),
      attribution::Column::CommissionAmount,
      &txn,
    )
    .await?;

    let adjustment_rows = adjustment::Entity::find()
      .filter(adjustment::Column::AffiliateId.eq(affiliate_id))
      .all(&txn)
      .await?;
    let adjusted_sales: i64 =
      adjustment_rows.iter().map(|adj| adj.sales_delta).sum();
    let adjusted_commission: i64 =
      adjustment_rows.iter().map(|adj| adj.commission_delta).sum();

    let lifetime_sales = ledger_sales + adjusted_sales;
    let lifetime_commission = locked_commission + adjusted_commission;

    let mut drift = Vec::new();
    let mut check = |field, stored, computed| {
      if stored != computed {
        drift.push(Drift { field, stored, computed });
      }
    };
    check("month_sales", affiliate.month_sales, month_sales);
    check("month_orders", affiliate.month_orders as i64, month_orders);
    check(
      "month_commission_accrued",
      affiliate.month_commission_accrued,
      month_accrued,
    );
    check("lifetime_sales", affiliate.lifetime_sales, lifetime_sales);
    check(
      "lifetime_commission",
      affiliate.lifetime_commission,
      lifetime_commission,
    );

    if !drift.is_empty() {
      warn!(
        "counter drift on affiliate {affiliate_id}: {} field(s) repaired",
        drift.len()
      );

      affiliate::ActiveModel {
        month_sales: Set(month_sales),
        month_orders: Set(month_orders as i32),
        month_commission_accrued: Set(month_accrued),
        lifetime_sales: Set(lifetime_sales),
        lifetime_commission: Set(lifetime_commission),
        ..affiliate.into()
      }
      .update(&txn)
      .await?;
    }

    txn.commit().await?;

    Ok(ReconcileReport { affiliate_id, drift })
  }
}

pub(crate) async fn sum_column<C: ConnectionTrait>(
  query: sea_orm::Select<attribution::Entity>,
  column: attribution::Column,
  conn: &C,
) -> Result<i64> {
  let total: Option<Option<i64>> = query
    .select_only()
    .column_as(Expr::col(column).sum(), "total")
    .into_tuple()
    .one(conn)
    .await?;

  Ok(total.flatten().unwrap_or(0))
}

fn validate_code(code: &str) -> Result<()> {
  let ok = (3..=32).contains(&code.len())
    && code
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

  if ok {
    Ok(())
  } else {
    Err(Error::Validation {
      field: "code",
      message: "3-32 alphanumeric characters, `-` or `_`".into(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_enroll_is_idempotent_per_user() {
    let db = test_db::setup().await;

    let first = Affiliate::new(&db).enroll(1, "RAVI10").await.unwrap();
    let again = Affiliate::new(&db).enroll(1, "OTHER").await.unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(again.code, "RAVI10");
  }

  #[tokio::test]
  async fn test_enroll_rejects_taken_code() {
    let db = test_db::setup().await;

    Affiliate::new(&db).enroll(1, "RAVI10").await.unwrap();
    let result = Affiliate::new(&db).enroll(2, "RAVI10").await;

    assert!(matches!(
      result,
      Err(Error::Validation { field: "code", .. })
    ));
  }

  #[tokio::test]
  async fn test_enroll_rejects_bad_code() {
    let db = test_db::setup().await;

    assert!(Affiliate::new(&db).enroll(1, "a").await.is_err());
    assert!(Affiliate::new(&db).enroll(1, "has space").await.is_err());
  }

  #[tokio::test]
  async fn test_update_rules_replaces_table() {
    let db = test_db::setup().await;
    let sv = Affiliate::new(&db);

    let aff = sv.enroll(1, "RAVI10").await.unwrap();
    sv.update_rules(aff.id, &[
      RuleInput { min_monthly_sales: 0, percent: 5 },
      RuleInput { min_monthly_sales: 50_000, percent: 7 },
    ])
    .await
    .unwrap();

    let replaced = sv
      .update_rules(aff.id, &[RuleInput { min_monthly_sales: 0, percent: 8 }])
      .await
      .unwrap();

    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].percent, 8);
  }

  #[tokio::test]
  async fn test_update_rules_rejects_duplicates() {
    let db = test_db::setup().await;
    let sv = Affiliate::new(&db);

    let aff = sv.enroll(1, "RAVI10").await.unwrap();
    let result = sv
      .update_rules(aff.id, &[
        RuleInput { min_monthly_sales: 0, percent: 5 },
        RuleInput { min_monthly_sales: 0, percent: 7 },
      ])
      .await;

    assert!(result.is_err());
    assert!(sv.rules(aff.id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_summary_shape() {
    let db = test_db::setup().await;
    let sv = Affiliate::new(&db);

    let aff = sv.enroll(7, "LINK42").await.unwrap();
    sv.update_rules(aff.id, &[RuleInput { min_monthly_sales: 0, percent: 5 }])
      .await
      .unwrap();

    let summary = sv.summary(7).await.unwrap();
    assert_eq!(summary.code, "LINK42");
    assert_eq!(summary.rules.len(), 1);
    assert_eq!(summary.month_sales, 0);
    assert!(summary.recent_payouts.is_empty());
  }

  #[tokio::test]
  async fn test_reconcile_repairs_corrupt_counter() {
    let db = test_db::setup().await;
    let sv = Affiliate::new(&db);

    let aff = sv.enroll(1, "RAVI10").await.unwrap();

    // Corrupt a counter out from under the ledger
    affiliate::ActiveModel {
      lifetime_sales: Set(9_999),
      ..aff.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    let report = sv.reconcile(aff.id).await.unwrap();
    assert_eq!(report.drift.len(), 1);
    assert_eq!(report.drift[0].field, "lifetime_sales");
    assert_eq!(report.drift[0].stored, 9_999);
    assert_eq!(report.drift[0].computed, 0);

    let repaired = sv.by_id(aff.id).await.unwrap();
    assert_eq!(repaired.lifetime_sales, 0);

    // Second pass reports nothing
    let report = sv.reconcile(aff.id).await.unwrap();
    assert!(report.drift.is_empty());
  }
}
