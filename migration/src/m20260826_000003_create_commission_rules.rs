use sea_orm_migration::prelude::*;

use super::m20260826_000002_create_affiliates::Affiliates;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CommissionRules::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(CommissionRules::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(CommissionRules::AffiliateId)
              .integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(CommissionRules::MinMonthlySales)
              .big_integer()
              .not_null(),
          )
          .col(ColumnDef::new(CommissionRules::Percent).integer().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_commission_rules_affiliate")
              .from(CommissionRules::Table, CommissionRules::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // No duplicate thresholds within one affiliate's rate table
    manager
      .create_index(
        Index::create()
          .name("idx_commission_rules_threshold")
          .table(CommissionRules::Table)
          .col(CommissionRules::AffiliateId)
          .col(CommissionRules::MinMonthlySales)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CommissionRules::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum CommissionRules {
  Table,
  Id,
  AffiliateId,
  MinMonthlySales,
  Percent,
}
