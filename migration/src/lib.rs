pub use sea_orm_migration::prelude::*;

mod m20260826_000001_create_users;
mod m20260826_000002_create_affiliates;
mod m20260826_000003_create_commission_rules;
mod m20260826_000004_create_attributions;
mod m20260826_000005_create_payout_requests;
mod m20260826_000006_create_adjustments;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260826_000001_create_users::Migration),
      Box::new(m20260826_000002_create_affiliates::Migration),
      Box::new(m20260826_000003_create_commission_rules::Migration),
      Box::new(m20260826_000004_create_attributions::Migration),
      Box::new(m20260826_000005_create_payout_requests::Migration),
      Box::new(m20260826_000006_create_adjustments::Migration),
    ]
  }
}
