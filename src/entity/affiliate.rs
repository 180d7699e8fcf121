use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{attribution, commission_rule, payout_request, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliates")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub code: String,
  pub active: bool,
  /// Current period bucket, `YYYY-MM`. Rewritten in place at rollover.
  pub month_key: String,
  pub month_sales: i64,
  pub month_orders: i32,
  pub month_commission_accrued: i64,
  pub lifetime_sales: i64,
  pub lifetime_commission: i64,
  pub fund_account_id: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::UserId"
  )]
  User,
  #[sea_orm(has_many = "commission_rule::Entity")]
  Rules,
  #[sea_orm(has_many = "attribution::Entity")]
  Attributions,
  #[sea_orm(has_many = "payout_request::Entity")]
  PayoutRequests,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<commission_rule::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Rules.def()
  }
}

impl Related<attribution::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Attributions.def()
  }
}

impl Related<payout_request::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::PayoutRequests.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
