use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{affiliate, user};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum AttributionStatus {
  /// Accrued but still inside the return window.
  #[sea_orm(string_value = "open")]
  #[default]
  Open,
  /// Return window elapsed; counts toward payout eligibility.
  #[sea_orm(string_value = "locked")]
  Locked,
  /// Order cancelled or returned. Terminal.
  #[sea_orm(string_value = "reversed")]
  Reversed,
}

impl AttributionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      AttributionStatus::Open => "open",
      AttributionStatus::Locked => "locked",
      AttributionStatus::Reversed => "reversed",
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attributions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_id: i32,
  pub order_id: String,
  pub user_id: i64,
  pub month_key: String,
  pub base_amount: i64,
  /// Tier percent snapshotted at attribution time, never recomputed.
  pub percent: i32,
  pub commission_amount: i64,
  pub status: AttributionStatus,
  pub completed_at: DateTime,
  pub created_at: DateTime,
  pub locked_at: Option<DateTime>,
  pub reversed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "affiliate::Entity",
    from = "Column::AffiliateId",
    to = "affiliate::Column::Id"
  )]
  Affiliate,
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::UserId"
  )]
  User,
}

impl Related<affiliate::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Affiliate.def()
  }
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
