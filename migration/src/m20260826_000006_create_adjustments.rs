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
          .table(Adjustments::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Adjustments::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Adjustments::AffiliateId).integer().not_null())
          .col(
            ColumnDef::new(Adjustments::SalesDelta)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Adjustments::CommissionDelta)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Adjustments::Note).string().not_null())
          .col(ColumnDef::new(Adjustments::AdminId).big_integer().not_null())
          .col(ColumnDef::new(Adjustments::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_adjustments_affiliate")
              .from(Adjustments::Table, Adjustments::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_adjustments_affiliate")
          .table(Adjustments::Table)
          .col(Adjustments::AffiliateId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Adjustments::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Adjustments {
  Table,
  Id,
  AffiliateId,
  SalesDelta,
  CommissionDelta,
  Note,
  AdminId,
  CreatedAt,
}
