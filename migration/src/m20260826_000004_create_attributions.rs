use sea_orm_migration::prelude::*;

use super::{
  m20260826_000001_create_users::Users,
  m20260826_000002_create_affiliates::Affiliates,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Attributions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Attributions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Attributions::AffiliateId).integer().not_null())
          .col(ColumnDef::new(Attributions::OrderId).string().not_null())
          .col(ColumnDef::new(Attributions::UserId).big_integer().not_null())
          .col(ColumnDef::new(Attributions::MonthKey).string().not_null())
          .col(
            ColumnDef::new(Attributions::BaseAmount).big_integer().not_null(),
          )
          .col(ColumnDef::new(Attributions::Percent).integer().not_null())
          .col(
            ColumnDef::new(Attributions::CommissionAmount)
              .big_integer()
              .not_null(),
          )
          .col(
            ColumnDef::new(Attributions::Status)
              .string()
              .not_null()
              .default("open"),
          )
          .col(ColumnDef::new(Attributions::CompletedAt).date_time().not_null())
          .col(ColumnDef::new(Attributions::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Attributions::LockedAt).date_time().null())
          .col(ColumnDef::new(Attributions::ReversedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_attributions_affiliate")
              .from(Attributions::Table, Attributions::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_attributions_user")
              .from(Attributions::Table, Attributions::UserId)
              .to(Users::Table, Users::UserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // Idempotency constraint: one ledger row per (affiliate, order).
    // Duplicate event deliveries race to this index, not to app locks.
    manager
      .create_index(
        Index::create()
          .name("idx_attributions_affiliate_order")
          .table(Attributions::Table)
          .col(Attributions::AffiliateId)
          .col(Attributions::OrderId)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_attributions_month_status")
          .table(Attributions::Table)
          .col(Attributions::AffiliateId)
          .col(Attributions::MonthKey)
          .col(Attributions::Status)
          .to_owned(),
      )
      .await?;

    // Lock sweep scans open rows by completion time
    manager
      .create_index(
        Index::create()
          .name("idx_attributions_status_completed")
          .table(Attributions::Table)
          .col(Attributions::Status)
          .col(Attributions::CompletedAt)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Attributions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Attributions {
  Table,
  Id,
  AffiliateId,
  OrderId,
  UserId,
  MonthKey,
  BaseAmount,
  Percent,
  CommissionAmount,
  Status,
  CompletedAt,
  CreatedAt,
  LockedAt,
  ReversedAt,
}
