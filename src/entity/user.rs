use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{affiliate, attribution};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub user_id: i64,
  pub reg_date: DateTime,
  /// Referral code captured against this visitor by the storefront,
  /// used as fallback attribution when an order event carries none.
  pub referred_by_code: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_one = "affiliate::Entity")]
  Affiliate,
  #[sea_orm(has_many = "attribution::Entity")]
  Attributions,
}

impl Related<affiliate::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Affiliate.def()
  }
}

impl Related<attribution::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Attributions.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
