use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{affiliate, user};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PayoutStatus {
  #[sea_orm(string_value = "requested")]
  #[default]
  Requested,
  #[sea_orm(string_value = "approved")]
  Approved,
  /// Terminal.
  #[sea_orm(string_value = "paid")]
  Paid,
  /// Terminal; frees the (affiliate, month) slot.
  #[sea_orm(string_value = "rejected")]
  Rejected,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payout_requests")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub affiliate_id: i32,
  pub user_id: i64,
  pub month_key: String,
  /// Mirror of month_key while the request is non-rejected; NULL after
  /// rejection so the (affiliate_id, month_slot) unique index frees up.
  pub month_slot: Option<String>,
  pub amount: i64,
  pub status: PayoutStatus,
  pub account_holder: String,
  pub bank_account: String,
  pub ifsc: String,
  pub bank_name: String,
  pub city: String,
  pub upi_id: Option<String>,
  pub pan: String,
  pub aadhaar: String,
  pub payout_ref: Option<String>,
  pub utr: Option<String>,
  pub admin_note: Option<String>,
  pub created_at: DateTime,
  pub updated_at: DateTime,
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
