use crate::{
  entity::{affiliate, user},
  prelude::*,
};

/// Adapter for the external identity subsystem plus the Referral Capture
/// persistence: user rows exist so ledger rows have something to reference,
/// and `referred_by_code` holds the code captured from an inbound link.
pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get_or_create(&self, user_id: i64) -> Result<user::Model> {
    if let Some(user) = user::Entity::find_by_id(user_id).one(self.db).await? {
      return Ok(user);
    }

    let now = Utc::now().naive_utc();
    let user = user::ActiveModel {
      user_id: Set(user_id),
      reg_date: Set(now),
      referred_by_code: Set(None),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, user_id: i64) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(user_id).one(self.db).await?)
  }

  /// Persist a captured referral code against a visitor. The code must
  /// belong to an active affiliate, and self-referral is refused.
  pub async fn capture_referral(
    &self,
    user_id: i64,
    code: &str,
  ) -> Result<user::Model> {
    let affiliate = affiliate::Entity::find()
      .filter(affiliate::Column::Code.eq(code))
      .filter(affiliate::Column::Active.eq(true))
      .one(self.db)
      .await?
      .ok_or(Error::AffiliateNotFound)?;

    if affiliate.user_id == user_id {
      return Err(Error::InvalidArgs(
        "Cannot use your own referral code".into(),
      ));
    }

    let user = self.get_or_create(user_id).await?;

    let updated = user::ActiveModel {
      referred_by_code: Set(Some(affiliate.code)),
      ..user.into()
    }
    .update(self.db)
    .await?;

    Ok(updated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{self, test_utils::test_db};

  #[tokio::test]
  async fn test_get_or_create_is_idempotent() {
    let db = test_db::setup().await;

    let a = User::new(&db).get_or_create(42).await.unwrap();
    let b = User::new(&db).get_or_create(42).await.unwrap();
    assert_eq!(a.user_id, b.user_id);
    assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_capture_referral() {
    let db = test_db::setup().await;

    sv::Affiliate::new(&db).enroll(1, "RAVI10").await.unwrap();

    let visitor = User::new(&db).capture_referral(2, "RAVI10").await.unwrap();
    assert_eq!(visitor.referred_by_code.as_deref(), Some("RAVI10"));
  }

  #[tokio::test]
  async fn test_capture_refuses_self_referral() {
    let db = test_db::setup().await;

    sv::Affiliate::new(&db).enroll(1, "RAVI10").await.unwrap();

    let result = User::new(&db).capture_referral(1, "RAVI10").await;
    assert!(matches!(result, Err(Error::InvalidArgs(_))));
  }

  #[tokio::test]
  async fn test_capture_unknown_code() {
    let db = test_db::setup().await;

    let result = User::new(&db).capture_referral(2, "NOPE").await;
    assert!(matches!(result, Err(Error::AffiliateNotFound)));
  }

  #[tokio::test]
  async fn test_capture_inactive_affiliate() {
    let db = test_db::setup().await;

    let aff = sv::Affiliate::new(&db).enroll(1, "RAVI10").await.unwrap();
    sv::Affiliate::new(&db).set_active(aff.id, false).await.unwrap();

    let result = User::new(&db).capture_referral(2, "RAVI10").await;
    assert!(matches!(result, Err(Error::AffiliateNotFound)));
  }
}
