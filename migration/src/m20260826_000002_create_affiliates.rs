use sea_orm_migration::prelude::*;

use super::m20260826_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Affiliates::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Affiliates::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Affiliates::UserId).big_integer().not_null())
          .col(ColumnDef::new(Affiliates::Code).string().not_null())
          .col(
            ColumnDef::new(Affiliates::Active)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(Affiliates::MonthKey).string().not_null())
          .col(
            ColumnDef::new(Affiliates::MonthSales)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::MonthOrders)
              .integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::MonthCommissionAccrued)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::LifetimeSales)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::LifetimeCommission)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Affiliates::FundAccountId).string().null())
          .col(ColumnDef::new(Affiliates::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliates_user")
              .from(Affiliates::Table, Affiliates::UserId)
              .to(Users::Table, Users::UserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliates_user")
          .table(Affiliates::Table)
          .col(Affiliates::UserId)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliates_code")
          .table(Affiliates::Table)
          .col(Affiliates::Code)
          .unique()
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Affiliates::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Affiliates {
  Table,
  Id,
  UserId,
  Code,
  Active,
  MonthKey,
  MonthSales,
  MonthOrders,
  MonthCommissionAccrued,
  LifetimeSales,
  LifetimeCommission,
  FundAccountId,
  CreatedAt,
}
