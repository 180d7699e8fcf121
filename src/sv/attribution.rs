use serde::{Deserialize, Serialize};

use crate::{
  entity::{AttributionStatus, affiliate, attribution, commission_rule},
  prelude::*,
  sv::{self, affiliate::sum_column, tier},
  utils,
};

/// Order-completion event from the order subsystem. `referral_code` is
/// what Referral Capture resolved for the order, when it resolved one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderCompleted {
  pub order_id: String,
  pub user_id: i64,
  pub base_amount: i64,
  pub referral_code: Option<String>,
  pub completed_at: DateTime,
}

pub struct Attribution<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Attribution<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Attribute a completed order to its referring affiliate.
  ///
  /// Returns `Ok(None)` when the order carries no usable referral: no
  /// code, unknown or inactive affiliate, or self-referral. Duplicate
  /// deliveries of the same (affiliate, order) resolve to the existing
  /// ledger row without touching the counters again.
  pub async fn record(
    &self,
    event: &OrderCompleted,
  ) -> Result<Option<attribution::Model>> {
    if event.base_amount <= 0 {
      return Err(Error::InvalidArgs(
        "Order base amount must be positive".into(),
      ));
    }

    let code = match self.referral_code_for(event).await? {
      Some(code) => code,
      None => return Ok(None),
    };

    let affiliate =
      match sv::Affiliate::new(self.db).by_code_active(&code).await? {
        Some(affiliate) => affiliate,
        None => {
          debug!(
            "order {}: code `{code}` has no active affiliate, skipping",
            event.order_id
          );
          return Ok(None);
        }
      };

    if affiliate.user_id == event.user_id {
      debug!("order {}: self-referral, skipping", event.order_id);
      return Ok(None);
    }

    // Ledger rows reference the placing user
    sv::User::new(self.db).get_or_create(event.user_id).await?;

    let event_month = utils::month_key(event.completed_at);
    let now = Utc::now().naive_utc();

    let txn = self.db.begin().await?;

    let affiliate = affiliate::Entity::find_by_id(affiliate.id)
      .one(&txn)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    // Period rollover: a newer month opens a fresh bucket
    let (month_key, month_sales, month_orders, month_accrued) =
      if event_month > affiliate.month_key {
        (event_month.clone(), 0, 0, 0)
      } else {
        (
          affiliate.month_key.clone(),
          affiliate.month_sales,
          affiliate.month_orders,
          affiliate.month_commission_accrued,
        )
      };

    // Late delivery for an already-closed period: record the row and
    // lifetime sales, but never mutate a past month's bucket.
    let late = event_month < month_key;

    let trailing_sales = if late {
      sum_column(
        attribution::Entity::find()
          .filter(attribution::Column::AffiliateId.eq(affiliate.id))
          .filter(attribution::Column::MonthKey.eq(event_month.clone()))
          .filter(attribution::Column::Status.ne(AttributionStatus::Reversed)),
        attribution::Column::BaseAmount,
        &txn,
      )
      .await?
    } else {
      month_sales
    };

    let rules = commission_rule::Entity::find()
      .filter(commission_rule::Column::AffiliateId.eq(affiliate.id))
      .order_by_asc(commission_rule::Column::MinMonthlySales)
      .all(&txn)
      .await?;

    // Tier is evaluated on trailing volume, excluding this order
    let percent = tier::resolve_percent(&rules, trailing_sales);
    let commission = tier::commission_for(event.base_amount, percent);

    let inserted = attribution::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate.id),
      order_id: Set(event.order_id.clone()),
      user_id: Set(event.user_id),
      month_key: Set(event_month.clone()),
      base_amount: Set(event.base_amount),
      percent: Set(percent),
      commission_amount: Set(commission),
      status: Set(AttributionStatus::Open),
      completed_at: Set(event.completed_at),
      created_at: Set(now),
      locked_at: Set(None),
      reversed_at: Set(None),
    }
    .insert(&txn)
    .await;

    let row = match inserted {
      Ok(row) => row,
      Err(err)
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
      {
        // At-least-once delivery: someone already attributed this order.
        // The constraint is the serialization point; treat as success.
        txn.rollback().await?;
        let existing = self.by_order(affiliate.id, &event.order_id).await?;
        info!(
          "order {} already attributed to affiliate {}, no-op",
          event.order_id, affiliate.id
        );
        return Ok(existing);
      }
      Err(err) => return Err(err.into()),
    };

    // Counters move in the same transaction as the ledger insert
    let update = if late {
      affiliate::ActiveModel {
        lifetime_sales: Set(affiliate.lifetime_sales + event.base_amount),
        ..affiliate.into()
      }
    } else {
      affiliate::ActiveModel {
        month_key: Set(month_key),
        month_sales: Set(month_sales + event.base_amount),
        month_orders: Set(month_orders + 1),
        month_commission_accrued: Set(month_accrued + commission),
        lifetime_sales: Set(affiliate.lifetime_sales + event.base_amount),
        ..affiliate.into()
      }
    };
    update.update(&txn).await?;

    txn.commit().await?;

    info!(
      "attributed order {} to affiliate {}: {}% of {} = {}",
      event.order_id, row.affiliate_id, percent, event.base_amount, commission
    );

    Ok(Some(row))
  }

  /// Retire a ledger row after order cancellation or an approved return.
  ///
  /// Idempotent: an already-reversed row (or one that never existed) is a
  /// no-op. Counter symmetry: lifetime sales always back out; locked
  /// commission backs out of the lifetime total; the month bucket is only
  /// touched while the row's period is still the affiliate's current one.
  pub async fn reverse(
    &self,
    affiliate_id: i32,
    order_id: &str,
  ) -> Result<Option<attribution::Model>> {
    let txn = self.db.begin().await?;

    let row = attribution::Entity::find()
      .filter(attribution::Column::AffiliateId.eq(affiliate_id))
      .filter(attribution::Column::OrderId.eq(order_id))
      .one(&txn)
      .await?;

    let row = match row {
      Some(row) => row,
      None => {
        debug!("reversal for unattributed order {order_id}, skipping");
        return Ok(None);
      }
    };

    if row.status == AttributionStatus::Reversed {
      return Ok(Some(row));
    }

    let affiliate = affiliate::Entity::find_by_id(affiliate_id)
      .one(&txn)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    let was_locked = row.status == AttributionStatus::Locked;
    let same_month = row.month_key == affiliate.month_key;
    let now = Utc::now().naive_utc();

    let base = row.base_amount;
    let commission = row.commission_amount;

    let reversed = attribution::ActiveModel {
      status: Set(AttributionStatus::Reversed),
      reversed_at: Set(Some(now)),
      ..row.into()
    }
    .update(&txn)
    .await?;

    let mut update = affiliate::ActiveModel {
      lifetime_sales: Set(affiliate.lifetime_sales - base),
      ..affiliate.clone().into()
    };
    if was_locked {
      update.lifetime_commission =
        Set(affiliate.lifetime_commission - commission);
    }
    if same_month {
      update.month_sales = Set(affiliate.month_sales - base);
      update.month_orders = Set(affiliate.month_orders - 1);
      update.month_commission_accrued =
        Set(affiliate.month_commission_accrued - commission);
    }
    update.update(&txn).await?;

    txn.commit().await?;

    info!(
      "reversed order {order_id} for affiliate {affiliate_id} (was {})",
      if was_locked { "locked" } else { "open" }
    );

    Ok(Some(reversed))
  }

  /// Promote `open` rows whose return window has elapsed to `locked`,
  /// crediting lifetime commission. Only locked rows count toward payout
  /// eligibility.
  pub async fn lock_due(&self, cutoff: DateTime) -> Result<u64> {
    let due = attribution::Entity::find()
      .filter(attribution::Column::Status.eq(AttributionStatus::Open))
      .filter(attribution::Column::CompletedAt.lte(cutoff))
      .all(self.db)
      .await?;

    let mut locked = 0u64;
    for row in due {
      let txn = self.db.begin().await?;

      // Refetch: the row may have been reversed since the scan
      let Some(row) =
        attribution::Entity::find_by_id(row.id).one(&txn).await?
      else {
        continue;
      };
      if row.status != AttributionStatus::Open {
        continue;
      }

      let affiliate = affiliate::Entity::find_by_id(row.affiliate_id)
        .one(&txn)
        .await?
        .ok_or(Error::AffiliateNotFound)?;

      let commission = row.commission_amount;
      let now = Utc::now().naive_utc();

      attribution::ActiveModel {
        status: Set(AttributionStatus::Locked),
        locked_at: Set(Some(now)),
        ..row.into()
      }
      .update(&txn)
      .await?;

      affiliate::ActiveModel {
        lifetime_commission: Set(affiliate.lifetime_commission + commission),
        ..affiliate.into()
      }
      .update(&txn)
      .await?;

      txn.commit().await?;
      locked += 1;
    }

    if locked > 0 {
      info!("lock sweep promoted {locked} attribution(s)");
    }

    Ok(locked)
  }

  pub async fn by_order(
    &self,
    affiliate_id: i32,
    order_id: &str,
  ) -> Result<Option<attribution::Model>> {
    Ok(
      attribution::Entity::find()
        .filter(attribution::Column::AffiliateId.eq(affiliate_id))
        .filter(attribution::Column::OrderId.eq(order_id))
        .one(self.db)
        .await?,
    )
  }

  /// Paginated ledger history, newest first. Pages are 1-based.
  pub async fn history(
    &self,
    affiliate_id: i32,
    page: u64,
    per_page: u64,
  ) -> Result<(Vec<attribution::Model>, u64)> {
    let per_page = per_page.clamp(1, 100);

    let paginator = attribution::Entity::find()
      .filter(attribution::Column::AffiliateId.eq(affiliate_id))
      .order_by_desc(attribution::Column::CreatedAt)
      .paginate(self.db, per_page);

    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((items, total))
  }

  pub async fn list(
    &self,
    affiliate_id: Option<i32>,
  ) -> Result<Vec<attribution::Model>> {
    let mut query = attribution::Entity::find()
      .order_by_desc(attribution::Column::CompletedAt);
    if let Some(id) = affiliate_id {
      query = query.filter(attribution::Column::AffiliateId.eq(id));
    }
    Ok(query.all(self.db).await?)
  }

  async fn referral_code_for(
    &self,
    event: &OrderCompleted,
  ) -> Result<Option<String>> {
    if let Some(code) = &event.referral_code {
      return Ok(Some(code.clone()));
    }

    // Fall back to the code Referral Capture stored for the visitor
    let user = sv::User::new(self.db).by_id(event.user_id).await?;
    Ok(user.and_then(|user| user.referred_by_code))
  }
}
